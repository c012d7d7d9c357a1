//! rifup - bring network interfaces up or down.
//!
//! Entry point: parses options, initializes logging, and runs one
//! invocation of the engine.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use rifup::Cli;

/// Initializes the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match rifup::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
