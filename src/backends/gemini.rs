//! Remote explanation backend over a Gemini-style generateContent endpoint.
//!
//! Sends a fixed instruction plus a truncated excerpt of the error text in a
//! single authenticated HTTPS POST, extracts generated text from the fixed
//! JSON path in the response, and strips markdown before returning plain
//! text. Failures map onto the small [`BackendError`] taxonomy so the router
//! can log a concise reason without leaking the key.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Backend, BackendError, BackendKind, Explanation};

/// Default generation endpoint when the config does not override it.
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// Instruction prepended to every request.
const INSTRUCTION: &str = "You are helping a developer understand why their program crashed. \
Explain the following error in plain language: what it means, the most likely cause, and one \
concrete fix to try first. Be brief and practical. Reply in plain text without markdown.";

/// Bounds on the excerpt sent to the remote service.
const MAX_EXCERPT_LINES: usize = 30;
const MAX_EXCERPT_CHARS: usize = 2000;

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn new(api_key: String, endpoint: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout,
        }
    }

    fn build_prompt(error_text: &str) -> String {
        format!("{INSTRUCTION}\n\n{}", truncate_excerpt(error_text))
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    async fn explain(&self, error_text: &str) -> Result<Explanation> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::AuthFailed.into());
        }

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::build_prompt(error_text),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16()).into());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|_| BackendError::EmptyResponse)?;

        let text = extract_generated_text(&body).ok_or(BackendError::EmptyResponse)?;

        Ok(Explanation {
            source: BackendKind::Gemini,
            body: strip_markup(&text),
        })
    }
}

/// Map a reqwest transport error onto the taxonomy.
fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::TimedOut {
            millis: timeout.as_millis() as u64,
        }
    } else if err.is_connect() {
        BackendError::Network("connection failed".to_string())
    } else {
        BackendError::Network("request failed".to_string())
    }
}

/// Map an HTTP status onto the taxonomy.
fn classify_status(status: u16) -> BackendError {
    match status {
        400 | 401 | 403 => BackendError::AuthFailed,
        429 => BackendError::RateLimited,
        _ => BackendError::Unavailable { status },
    }
}

/// Generated text lives at `candidates[0].content.parts[0].text`; any other
/// shape counts as an empty response.
fn extract_generated_text(body: &serde_json::Value) -> Option<String> {
    let text = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Bound the excerpt by line count, then by total characters (on a char
/// boundary), to control payload size.
fn truncate_excerpt(error_text: &str) -> String {
    let mut excerpt: String = error_text
        .lines()
        .take(MAX_EXCERPT_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    if excerpt.chars().count() > MAX_EXCERPT_CHARS {
        excerpt = excerpt.chars().take(MAX_EXCERPT_CHARS).collect();
    }
    excerpt
}

/// Strip common markdown so the result renders as plain terminal text:
/// code fences, headings, emphasis, inline code, and links.
fn strip_markup(text: &str) -> String {
    // [label](url) -> label
    let link_re = regex::Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("link regex is valid");
    let mut out = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            continue;
        }
        let line = trimmed.trim_start_matches('#').trim_start();
        let mut cleaned = line.replace("**", "");
        cleaned = cleaned.replace('`', "");
        cleaned = link_re.replace_all(&cleaned, "$1").into_owned();
        out.push(cleaned);
    }
    out.join("\n").trim().to_string()
}

// API types

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_generated_text_happy_path() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "  it broke because X  " }] }
            }]
        });
        assert_eq!(extract_generated_text(&body).as_deref(), Some("it broke because X"));
    }

    #[test]
    fn test_extract_generated_text_rejects_other_shapes() {
        assert!(extract_generated_text(&json!({})).is_none());
        assert!(extract_generated_text(&json!({ "candidates": [] })).is_none());
        assert!(extract_generated_text(&json!({
            "candidates": [{ "content": { "parts": [{ "text": "   " }] } }]
        }))
        .is_none());
        assert!(extract_generated_text(&json!({
            "candidates": [{ "content": { "parts": [] } }]
        }))
        .is_none());
    }

    #[test]
    fn test_truncate_excerpt_bounds_lines() {
        let long = (0..100).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let excerpt = truncate_excerpt(&long);
        assert_eq!(excerpt.lines().count(), MAX_EXCERPT_LINES);
    }

    #[test]
    fn test_truncate_excerpt_bounds_chars() {
        let long = "x".repeat(10_000);
        let excerpt = truncate_excerpt(&long);
        assert_eq!(excerpt.chars().count(), MAX_EXCERPT_CHARS);
    }

    #[test]
    fn test_truncate_excerpt_short_input_untouched() {
        assert_eq!(truncate_excerpt("short error"), "short error");
    }

    #[test]
    fn test_strip_markup_removes_fences_and_emphasis() {
        let input = "## What happened\nThe **null** value came from `config.get`.\n```js\nlet x;\n```\nSee [docs](https://example.com) for more.";
        let cleaned = strip_markup(input);
        assert!(!cleaned.contains("```"));
        assert!(!cleaned.contains("**"));
        assert!(!cleaned.contains('`'));
        assert!(!cleaned.contains("##"));
        assert!(cleaned.contains("What happened"));
        assert!(cleaned.contains("See docs for more."));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(classify_status(401), BackendError::AuthFailed));
        assert!(matches!(classify_status(403), BackendError::AuthFailed));
        assert!(matches!(classify_status(429), BackendError::RateLimited));
        assert!(matches!(
            classify_status(503),
            BackendError::Unavailable { status: 503 }
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let backend = GeminiBackend::new(String::new(), None, Duration::from_millis(10));
        let err = backend.explain("boom").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::AuthFailed)
        ));
    }

    #[test]
    fn test_build_prompt_contains_instruction_and_error() {
        let prompt = GeminiBackend::build_prompt("TypeError: boom");
        assert!(prompt.contains("plain language"));
        assert!(prompt.contains("TypeError: boom"));
    }
}
