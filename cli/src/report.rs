#![deny(missing_docs)]

//! # Report Rendering
//!
//! Text output is one line per finding followed by a summary line; JSON output
//! is a single document. Only results go to stdout, logs go to stderr.

use crate::error::CliResult;
use apidoc_core::{InvocationResult, Summary, ValidationError};
use serde::Serialize;

/// Output format.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON document.
    Json,
}

#[derive(Serialize)]
struct InvocationRow<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<&'a str>,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    issues: &'a [ValidationError],
}

#[derive(Serialize)]
struct JsonReport<'a> {
    command: &'a str,
    issues: &'a [ValidationError],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    invocations: Vec<InvocationRow<'a>>,
    summary: &'a Summary,
}

/// Renders a report to a string.
pub fn render(
    format: OutputFormat,
    command: &str,
    issues: &[ValidationError],
    invocations: &[InvocationResult],
    summary: &Summary,
) -> CliResult<String> {
    match format {
        OutputFormat::Text => Ok(render_text(issues, invocations, summary)),
        OutputFormat::Json => {
            let report = JsonReport {
                command,
                issues,
                invocations: invocations
                    .iter()
                    .map(|r| InvocationRow {
                        method: &r.method,
                        scenario: r.scenario.as_deref(),
                        passed: r.passed(),
                        status: r.response.as_ref().map(|resp| resp.status),
                        issues: &r.issues,
                    })
                    .collect(),
                summary,
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
    }
}

fn render_text(issues: &[ValidationError], invocations: &[InvocationResult], summary: &Summary) -> String {
    let mut out = String::new();
    for issue in issues {
        out.push_str(&issue.to_string());
        out.push('\n');
    }
    for result in invocations {
        let verdict = if result.passed() { "PASS" } else { "FAIL" };
        let status = result
            .response
            .as_ref()
            .map(|r| format!(" ({})", r.status_text()))
            .unwrap_or_default();
        out.push_str(&format!("{} {}{}\n", verdict, result.label(), status));
        for issue in &result.issues {
            out.push_str("  ");
            out.push_str(&issue.to_string());
            out.push('\n');
        }
    }
    out.push_str(&summary.to_string());
    out.push('\n');
    out
}
