//! Command-line interface definitions for the `vigil` tool.

use clap::Parser;
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::Mode;

/// Supervise a dev script: restart on change, explain errors
#[derive(Parser, Debug)]
#[command(
    name = "vigil",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VIGIL_GIT_SHA"), ")"),
    about,
    long_about = None
)]
#[command(
    after_help = "EXAMPLES:\n    vigil server.js\n    vigil --runtime python3 app.py --port 8080\n    vigil --mode gemini server.js\n    vigil --init"
)]
pub struct Cli {
    /// Script to run and supervise
    pub script: Option<PathBuf>,

    /// Arguments passed through to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Runtime executable used to launch the script
    #[arg(long, short = 'r', default_value = "node", value_name = "BIN")]
    pub runtime: String,

    /// Path to a config file (default: ./vigil.json, then user config dir)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Explanation mode (overrides config)
    #[arg(long, short = 'm', value_enum, value_name = "MODE")]
    pub mode: Option<Mode>,

    /// Disable restart-on-file-change
    #[arg(long)]
    pub no_restart: bool,

    /// Remote explanation timeout in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Glob pattern to ignore in the file watch (repeatable)
    #[arg(long, short = 'i', value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Explain errors without prompting
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Quiet mode - only show child output and explanations, no status lines
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Write a starter config file and exit
    #[arg(long)]
    pub init: bool,

    /// Generate shell completions
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,
}
