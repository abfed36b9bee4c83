//! Error detection for supervised process output.
//!
//! The detector is a stateless line classifier: it decides whether a chunk of
//! freshly produced output looks error-bearing, without trying to parse any
//! particular stack-trace grammar. This keeps it working across runtimes and
//! logging formats at the cost of occasional false positives (a benign log
//! line containing "failed" will match); the interactive prompt and the
//! debounce window bound the blast radius of those.

use regex::Regex;
use std::fmt;
use std::time::Instant;

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// A detected error occurrence: raw text (possibly accumulated over several
/// chunks), when it was detected, and which stream produced it.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub text: String,
    pub detected_at: Instant,
    pub stream: StreamKind,
}

impl ErrorEvent {
    pub fn new(text: String, stream: StreamKind) -> Self {
        Self {
            text,
            detected_at: Instant::now(),
            stream,
        }
    }
}

/// Stateless classifier over output chunks.
///
/// Matches a fixed disjunction of case-insensitive error signals. Applied
/// identically to stdout and stderr since applications log structured errors
/// to either stream.
pub struct ErrorDetector {
    signals: Regex,
}

const SIGNAL_PATTERN: &str = r"(?i)(error:|[A-Za-z]*Error\b|warning:|failed|exception|traceback|fatal|panic|crash|unhandled\s*(promise\s*)?rejection)";

impl ErrorDetector {
    pub fn new() -> Self {
        Self {
            // Fixed pattern, compiled once per detector.
            signals: Regex::new(SIGNAL_PATTERN).expect("error signal pattern is valid"),
        }
    }

    /// True if the chunk contains at least one error signal.
    pub fn is_error_output(&self, chunk: &str) -> bool {
        self.signals.is_match(chunk)
    }
}

impl Default for ErrorDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_error_colon() {
        let d = ErrorDetector::new();
        assert!(d.is_error_output("Error: something broke"));
        assert!(d.is_error_output("error: cannot open file"));
    }

    #[test]
    fn test_detects_named_error_kinds() {
        let d = ErrorDetector::new();
        assert!(d.is_error_output("TypeError: Cannot read properties of null"));
        assert!(d.is_error_output("ReferenceError: foo is not defined"));
        assert!(d.is_error_output("SyntaxError: Unexpected token"));
    }

    #[test]
    fn test_detects_generic_signals() {
        let d = ErrorDetector::new();
        assert!(d.is_error_output("request FAILED with status 500"));
        assert!(d.is_error_output("Unhandled exception in thread"));
        assert!(d.is_error_output("Traceback (most recent call last):"));
        assert!(d.is_error_output("FATAL: database is on fire"));
        assert!(d.is_error_output("the worker crashed"));
        assert!(d.is_error_output("UnhandledPromiseRejection: oops"));
    }

    #[test]
    fn test_detects_warning_signal() {
        // Deliberately broad: "warning:" counts as a signal.
        let d = ErrorDetector::new();
        assert!(d.is_error_output("warning: deprecated API"));
    }

    #[test]
    fn test_ignores_ordinary_output() {
        let d = ErrorDetector::new();
        assert!(!d.is_error_output("server listening on port 3000"));
        assert!(!d.is_error_output("GET /health 200 1ms"));
        assert!(!d.is_error_output(""));
    }

    #[test]
    fn test_case_insensitive() {
        let d = ErrorDetector::new();
        assert!(d.is_error_output("ERROR: caps lock engaged"));
        assert!(d.is_error_output("Fatal flaw detected"));
    }

    #[test]
    fn test_applies_to_multiline_chunks() {
        let d = ErrorDetector::new();
        let chunk = "starting up\nloading config\nError: bad config\n";
        assert!(d.is_error_output(chunk));
    }

    #[test]
    fn test_error_event_records_stream() {
        let ev = ErrorEvent::new("boom".to_string(), StreamKind::Stderr);
        assert_eq!(ev.stream, StreamKind::Stderr);
        assert_eq!(ev.text, "boom");
    }

    #[test]
    fn test_stream_kind_display() {
        assert_eq!(StreamKind::Stdout.to_string(), "stdout");
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }
}
