//! Vigil - dev-script supervisor with error explanation
//!
//! This library provides the core functionality for the `vigil` CLI tool:
//! child-process supervision, restart-on-change, error output detection, and
//! two-tier error explanation (remote Gemini with an offline pattern-matcher
//! fallback).

pub mod backends;
pub mod cli;
pub mod config;
pub mod detector;
pub mod event;
pub mod patterns;
pub mod prompt;
pub mod render;
pub mod router;
pub mod supervisor;
pub mod watcher;

// Re-export commonly used types
pub use backends::{Backend, BackendError, BackendKind, Explanation};
pub use config::{Config, Mode};
pub use detector::{ErrorDetector, ErrorEvent, StreamKind};
pub use router::Router;
pub use supervisor::{Supervisor, Target};
