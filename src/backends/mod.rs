//! Explanation backend abstraction.
//!
//! A backend takes raw error text and produces a plain-text explanation. Two
//! strategies exist: the offline pattern matcher (fast, deterministic) and
//! the remote Gemini-style API (slower, can fail). The router picks between
//! them and handles fallback.

pub mod gemini;
pub mod pattern;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which strategy produced an explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Offline pattern-table matcher.
    Pattern,
    /// Remote Gemini-style generation endpoint.
    Gemini,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Pattern => write!(f, "pattern"),
            BackendKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// The textual result of explaining an error. Transient: rendered to the
/// terminal and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    /// Strategy that produced the body, so fallback can be reported.
    pub source: BackendKind,
    /// Plain text with any backend markup stripped.
    pub body: String,
}

/// Interface shared by both explanation strategies.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Explain raw error text. The pattern backend is total; the remote
    /// backend fails with a [`BackendError`] the router can classify.
    async fn explain(&self, error_text: &str) -> Result<Explanation>;
}

/// Failure taxonomy for the remote backend. Messages are short and never
/// include credentials, so the router can log them verbatim.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("API key missing or rejected")]
    AuthFailed,

    #[error("rate limited by the explanation service")]
    RateLimited,

    #[error("explanation service unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out after {millis} ms")]
    TimedOut { millis: u64 },

    #[error("empty or malformed response from the explanation service")]
    EmptyResponse,
}
