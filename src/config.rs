//! Configuration for a supervised session.
//!
//! A JSON document, loaded once at startup and read-only afterwards. A
//! project-local `vigil.json` takes precedence over the per-user config file.
//! A malformed file or an unrecognized `mode` is a setup defect and fails
//! startup; a missing file just means built-in defaults.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local config file name.
pub const LOCAL_CONFIG_FILE: &str = "vigil.json";

/// Explanation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Offline pattern matching only.
    #[default]
    Normal,
    /// Remote Gemini backend with offline fallback.
    Gemini,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Gemini => write!(f, "gemini"),
        }
    }
}

/// Remote backend settings.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

/// Root configuration. Immutable for the session once loaded.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub mode: Mode,
    pub gemini: GeminiConfig,
    pub auto_restart: bool,
    pub ignore_patterns: Vec<String>,
    /// Remote request timeout in milliseconds.
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            gemini: GeminiConfig::default(),
            auto_restart: true,
            ignore_patterns: Vec::new(),
            timeout: 10_000,
        }
    }
}

impl Config {
    /// Load configuration. An explicitly named file must exist and parse; a
    /// discovered file must parse; no file at all means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        match Self::discover_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse one config file, failing loudly on unreadable or invalid input.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Find an existing config file: `./vigil.json`, then the per-user path.
    pub fn discover_path() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|p| p.exists())
    }

    /// Per-user config file (`~/.config/vigil/config.json` on Linux).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vigil").join("config.json"))
    }

    /// Remote request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

/// Starter config written by `--init`.
pub fn generate_default_config() -> String {
    let config = Config {
        mode: Mode::Normal,
        gemini: GeminiConfig {
            api_key: Some(String::new()),
            endpoint: None,
        },
        auto_restart: true,
        ignore_patterns: vec!["*.log".to_string(), "tmp/**".to_string()],
        timeout: 10_000,
    };
    let mut out = serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string());
    out.push('\n');
    out
}

/// Write the starter config, refusing to clobber an existing file.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("config file already exists: {}", path.display());
    }
    std::fs::write(path, generate_default_config())
        .with_context(|| format!("failed to write config file: {}", path.display()))?;
    Ok(())
}
