//! Command-line interface for the handover engine.
//!
//! Every subcommand opens the SQLite store named by `--db` (or the layered
//! configuration), performs one service operation and prints its result as
//! pretty JSON.
#![forbid(unsafe_code)]

use std::ffi::OsString;
use std::io::Write;

use clap::Parser;

mod commands;
mod config;
mod error;

pub use error::CliError;

use commands::Command;
use config::StoreArgs;

/// Run the handover CLI with the current process arguments, writing results
/// to stdout.
///
/// # Errors
///
/// Returns [`CliError`] when arguments, configuration, the store or the
/// requested operation fail.
pub fn run() -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_with(std::env::args_os(), &mut stdout)
}

/// Run the handover CLI with explicit arguments, writing results to
/// `writer`.
///
/// # Errors
///
/// Returns [`CliError`] when arguments, configuration, the store or the
/// requested operation fail.
pub fn run_with<I, T>(args: I, writer: &mut dyn Write) -> Result<(), CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(CliError::ArgumentParsing)?;
    let service = cli.store.into_config()?.open()?;
    commands::execute(&service, cli.command, writer)
}

#[derive(Debug, Parser)]
#[command(
    name = "handover",
    about = "Match riders to fleet vehicles and track the handover",
    version
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    #[command(subcommand)]
    command: Command,
}

#[cfg(test)]
mod tests;
