//! CLI for the MBK Mingle backup agent.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_backup, run_config};

/// Top-level CLI for the MBK Mingle backup agent.
#[derive(Debug, Parser)]
#[command(name = "mbk")]
#[command(about = "MBK: concurrent backup of a Mingle project", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Back up card pages, attachments and murmurs. The destination is wiped first.
    Backup {
        /// Config file to use instead of ~/.config/mbk/config.toml.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Backup root, overriding `destination` from the config.
        #[arg(long, value_name = "PATH")]
        destination: Option<PathBuf>,
        /// Directory for backup_details.log and error_log.txt (default ~/.local/state/mbk).
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Show the config file in use, creating a default one if missing.
    Config {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        match cli.command {
            CliCommand::Backup {
                config,
                destination,
                log_dir,
            } => run_backup(config.as_deref(), destination, log_dir),
            CliCommand::Config { config } => run_config(config.as_deref()),
        }
    }
}
