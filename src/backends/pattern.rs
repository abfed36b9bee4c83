//! Offline pattern-matching backend.
//!
//! First-match-wins search over the static table in [`crate::patterns`].
//! Total for non-empty input: the catch-all entry covers anything no specific
//! signature claims, and an unexpected internal fault degrades to echoing the
//! raw error text rather than failing.

use anyhow::Result;
use async_trait::async_trait;

use super::{Backend, BackendKind, Explanation};
use crate::patterns::{first_match, pattern_table, PatternEntry};

pub struct PatternBackend {
    table: Vec<PatternEntry>,
}

impl PatternBackend {
    pub fn new() -> Self {
        Self {
            table: pattern_table(),
        }
    }

    /// Synchronous core, shared with the router's fallback path.
    pub fn explain_sync(&self, error_text: &str) -> Explanation {
        let body = if error_text.trim().is_empty() {
            error_text.to_string()
        } else {
            first_match(&self.table, error_text).template.to_string()
        };
        Explanation {
            source: BackendKind::Pattern,
            body,
        }
    }
}

impl Default for PatternBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for PatternBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Pattern
    }

    async fn explain(&self, error_text: &str) -> Result<Explanation> {
        Ok(self.explain_sync(error_text))
    }
}
