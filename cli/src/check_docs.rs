#![deny(missing_docs)]

//! # Check Docs Command
//!
//! Loads the documentation, reports extraction and merge findings, then
//! cross-checks every documented response against its declared resource.

use crate::discovery::SourceArgs;
use crate::error::CliResult;
use crate::report::{render, OutputFormat};
use apidoc_core::{validate_documented_examples, Severity, Summary, ValidationOptions};

/// Severity choice for command line flags.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityArg {
    /// Informational only.
    Info,
    /// Non-fatal unless `--strict`.
    Warning,
    /// Always fails.
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

/// Arguments for the check-docs command.
#[derive(clap::Args, Debug, Clone)]
pub struct CheckDocsArgs {
    /// Documentation to load.
    #[clap(flatten)]
    pub sources: SourceArgs,

    /// Severity of response properties the resource does not document.
    #[clap(long, value_enum, default_value = "warning")]
    pub undocumented: SeverityArg,
}

/// Executes the documentation cross-check.
pub fn execute(args: &CheckDocsArgs, format: OutputFormat) -> CliResult<Summary> {
    let (set, mut issues) = args.sources.load()?;
    let options = ValidationOptions {
        undocumented_property_severity: args.undocumented.into(),
        ..ValidationOptions::default()
    };
    issues.extend(validate_documented_examples(&set, &options));

    let mut summary = Summary::default();
    summary.record_issues(&issues);
    for method in set.methods() {
        let file = set.file_of(method).map(|f| f.display_name.as_str());
        let failed = issues.iter().any(|i| {
            i.is_error()
                && i.location
                    .as_ref()
                    .is_some_and(|l| Some(l.file.as_str()) == file && l.line == Some(method.line))
        });
        if failed {
            summary.failed += 1;
        } else {
            summary.passed += 1;
        }
    }

    print!("{}", render(format, "check-docs", &issues, &[], &summary)?);
    Ok(summary)
}
