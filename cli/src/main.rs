#![deny(missing_docs)]

//! # API Doc CLI
//!
//! Command Line Interface for the documentation contract engine.
//!
//! Supported Commands:
//! - `check-docs`: cross-checks documented responses against documented resources.
//! - `check-links`: resolves links and heading anchors across the documentation.
//! - `check-service`: runs documented requests against a live service (feature `client`).
//!
//! Exit status: 0 on success, 1 when findings fail the run, 2 on operational
//! errors such as finding no markdown files.

use clap::{ArgAction, Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::error::CliResult;
use crate::report::OutputFormat;

mod check_docs;
mod check_links;
#[cfg(feature = "client")]
mod check_service;
mod discovery;
mod error;
mod report;
#[cfg(feature = "client")]
mod transport;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Documentation contract checker")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Treat warnings as failures.
    #[clap(long, global = true)]
    strict: bool,

    /// Output format.
    #[clap(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cross-check documented responses against documented resources.
    CheckDocs(check_docs::CheckDocsArgs),
    /// Resolve links and anchors across the documentation.
    CheckLinks(check_links::CheckLinksArgs),
    /// Run documented requests against a live service.
    #[cfg(feature = "client")]
    CheckService(check_service::CheckServiceArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> CliResult<ExitCode> {
    let summary = match &cli.command {
        Commands::CheckDocs(args) => check_docs::execute(args, cli.format)?,
        Commands::CheckLinks(args) => check_links::execute(args, cli.format)?,
        #[cfg(feature = "client")]
        Commands::CheckService(args) => {
            // Injecting the ureq transport
            let transport = transport::UreqTransport::new(
                std::time::Duration::from_secs(args.timeout_secs),
                std::time::Duration::from_millis(args.delay_ms),
            );
            check_service::execute(args, &transport, cli.format)?
        }
    };

    if summary.is_failure(cli.strict) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
