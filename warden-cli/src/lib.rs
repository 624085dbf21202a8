//! # warden-cli
//!
//! Short-lived client for the warden daemon. It never talks to the daemon
//! directly: commands go through the on-disk queue and status is read from the
//! PID file and queue directory.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Dispatch a parsed command line to its handler.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Cmd(args) => commands::cmd::execute(args, &cli.config, &writer).await,
        Commands::Queue(args) => commands::queue::execute(args, &cli.config, &writer).await,
        Commands::Rules(args) => commands::rules::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Status(args) => commands::status::execute(args, &cli.config, &writer).await,
    }
}
