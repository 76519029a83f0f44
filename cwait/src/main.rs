//! cwait - wait for a remote entity to converge on a state
//!
//! Polls a command that prints the entity document until the state matches,
//! an abort pattern fires, or the retry budget runs out.

#![forbid(unsafe_code)]

mod commands;
mod probe;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::watch::WatchArgs;
use cwait_common::{LogConfig, WaitConfig, init_logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cwait")]
#[command(author, version, about = "Wait for a remote entity to reach a state")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to <config dir>/cwait/config.toml)
    #[arg(long, global = true, env = "CWAIT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a command until the entity it prints reaches a state
    Watch(WatchArgs),

    /// Show the resolved configuration
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config =
        WaitConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;

    let mut log_config = LogConfig::from_env(&config.log_level.value).with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if cli.json_logs {
        log_config = log_config.with_json();
    }
    init_logging(&log_config)?;

    match cli.command {
        Commands::Watch(args) => {
            let code = commands::watch::run(args, &config).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Config { json } => commands::config::run(&config, json)?,
    }
    Ok(())
}
