use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use std::io;
use std::path::PathBuf;

use vigil::cli::Cli;
use vigil::config::{self, Config};
use vigil::supervisor::{Supervisor, Target};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "vigil", &mut io::stdout());
        return Ok(());
    }

    if cli.init {
        let path = PathBuf::from(config::LOCAL_CONFIG_FILE);
        config::write_default_config(&path)?;
        println!("{} wrote {}", "✓".green().bold(), path.display());
        return Ok(());
    }

    let Some(script) = cli.script else {
        bail!("no script given; try `vigil server.js` or `vigil --help`");
    };
    if !script.exists() {
        bail!("script not found: {}", script.display());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if cli.no_restart {
        config.auto_restart = false;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }
    config.ignore_patterns.extend(cli.ignore);

    let target = Target {
        runtime: cli.runtime,
        script,
        args: cli.args,
    };

    let mut supervisor = Supervisor::new(config, target, cli.yes, cli.quiet);
    supervisor.run().await
}
