//! # intentforge CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use intentforge_cli::conflicts::{run_conflicts, ConflictsArgs};
use intentforge_cli::describe::{run_describe, DescribeArgs};
use intentforge_cli::validate::{run_validate, ValidateArgs};
use intentforge_cli::EXIT_ERROR;

/// IntentForge policy tooling.
///
/// Validates transactions against policy files, reports contradictory
/// policies and prints policy descriptions.
#[derive(Parser, Debug)]
#[command(name = "intentforge", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a transaction against a policy file.
    Validate(ValidateArgs),

    /// Report conflicts between the policies in a file.
    Conflicts(ConflictsArgs),

    /// Describe every policy in a file.
    Describe(DescribeArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Conflicts(args) => run_conflicts(&args),
        Commands::Describe(args) => run_describe(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
