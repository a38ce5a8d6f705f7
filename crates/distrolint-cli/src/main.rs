//! distrolint CLI - Command-line validator for WSL distribution archives
//! and manifests.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status when validation ran and found errors.
const EXIT_POLICY_FAILED: u8 = 1;

/// Exit status when the input could not be read.
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);

    let result = match &cli.command {
        cli::Commands::Check(args) => commands::check::execute(args, &*formatter),
        cli::Commands::Manifest(args) => {
            commands::manifest::execute(args, &*formatter, cli.json)
        }
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_POLICY_FAILED),
        Err(err) => {
            formatter.format_error(&err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
