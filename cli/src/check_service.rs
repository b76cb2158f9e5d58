#![deny(missing_docs)]

//! # Check Service Command
//!
//! Runs every documented method (once per scenario) against a live service
//! and validates the responses.

use crate::discovery::SourceArgs;
use crate::error::CliResult;
use crate::report::{render, OutputFormat};
use apidoc_core::{
    CancelFlag, RunOptions, ScenarioSet, Summary, TestRunner, Transport, ValidationOptions,
};
use std::path::PathBuf;

/// Arguments for the check-service command.
#[derive(clap::Args, Debug, Clone)]
pub struct CheckServiceArgs {
    /// Documentation to load.
    #[clap(flatten)]
    pub sources: SourceArgs,

    /// Base URL relative request targets are appended to.
    #[clap(long, env = "APIDOC_SERVICE_ROOT")]
    pub service_root: Option<String>,

    /// Bearer token sent as `Authorization: Bearer <token>`.
    #[clap(long, env = "APIDOC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Scenario file (YAML or JSON) keyed by method name.
    #[clap(long)]
    pub scenarios: Option<PathBuf>,

    /// Only run these methods (repeatable).
    #[clap(long = "method")]
    pub methods: Vec<String>,

    /// Concurrent invocations. Captures between scenarios need 1.
    #[clap(long, default_value_t = 1)]
    pub workers: usize,

    /// Pause between consecutive calls, in milliseconds.
    #[clap(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Per-call timeout, in seconds.
    #[clap(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Compare reason phrases case-insensitively and accept responses without one.
    #[clap(long)]
    pub tolerate_reason_phrase: bool,
}

/// Executes the live run through `transport`.
pub fn execute(
    args: &CheckServiceArgs,
    transport: &dyn Transport,
    format: OutputFormat,
) -> CliResult<Summary> {
    let (set, load_issues) = args.sources.load()?;
    let scenarios = match &args.scenarios {
        Some(path) => ScenarioSet::load(path)?,
        None => ScenarioSet::default(),
    };

    let options = RunOptions {
        workers: args.workers.max(1),
        bearer_token: args.token.clone(),
        service_root: args.service_root.clone(),
        methods: args.methods.clone(),
        validation: ValidationOptions {
            tolerate_reason_phrase: args.tolerate_reason_phrase,
            ..ValidationOptions::default()
        },
    };
    let runner = TestRunner::new(&set, transport, options);
    let report = runner.run_all(&scenarios, &CancelFlag::new());

    let mut summary = report.summary.clone();
    summary.record_issues(&load_issues);

    let mut notes = load_issues;
    notes.extend(report.notes.iter().cloned());
    print!(
        "{}",
        render(format, "check-service", &notes, &report.results, &summary)?
    );
    Ok(summary)
}
