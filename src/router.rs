//! Explanation routing: pick a backend per configuration, fall back to the
//! offline matcher when the remote tier fails.
//!
//! The caller never sees a remote-backend error. In `normal` mode no network
//! call is ever attempted; in `gemini` mode a failure of any flavor is logged
//! as a one-line warning and the same error text is rerun through the pattern
//! backend, so the result is exactly what the pattern backend alone would
//! have produced.

use anyhow::Result;
use colored::Colorize;

use crate::backends::gemini::GeminiBackend;
use crate::backends::pattern::PatternBackend;
use crate::backends::{Backend, BackendError, Explanation};
use crate::config::{Config, Mode};

pub struct Router {
    mode: Mode,
    pattern: PatternBackend,
    gemini: Option<GeminiBackend>,
}

impl Router {
    pub fn new(config: &Config) -> Self {
        let gemini = match config.mode {
            Mode::Gemini => Some(GeminiBackend::new(
                config.gemini.api_key.clone().unwrap_or_default(),
                config.gemini.endpoint.clone(),
                config.timeout(),
            )),
            Mode::Normal => None,
        };
        Self {
            mode: config.mode,
            pattern: PatternBackend::new(),
            gemini,
        }
    }

    /// Produce an explanation for raw error text. Total: backend failures are
    /// absorbed by the fallback policy.
    pub async fn explain(&self, error_text: &str) -> Result<Explanation> {
        match self.mode {
            Mode::Normal => Ok(self.pattern.explain_sync(error_text)),
            Mode::Gemini => match self.gemini_tier(error_text).await {
                Ok(explanation) => Ok(explanation),
                Err(reason) => {
                    eprintln!(
                        "{} {} {}",
                        "?".yellow(),
                        "remote explanation failed:".yellow(),
                        reason.dimmed()
                    );
                    Ok(self.pattern.explain_sync(error_text))
                }
            },
        }
    }

    /// Run the remote tier, reducing its failure to a short loggable reason.
    async fn gemini_tier(&self, error_text: &str) -> std::result::Result<Explanation, String> {
        let Some(gemini) = &self.gemini else {
            return Err("remote backend not configured".to_string());
        };
        gemini.explain(error_text).await.map_err(|err| {
            let reason = match err.downcast_ref::<BackendError>() {
                Some(backend_err) => backend_err.to_string(),
                None => "request failed".to_string(),
            };
            format!("{} backend: {reason}", gemini.kind())
        })
    }
}
