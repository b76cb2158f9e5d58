#![deny(missing_docs)]

//! # API Doc Core
//!
//! Turns markdown API documentation into an executable contract: extracts the
//! documented surface, merges fragments scattered across files, and verifies
//! live or documented responses against it.

/// Shared error types.
pub mod error;

/// Severities, issue kinds and run summaries.
pub mod issues;

/// Policy-driven merge engine.
pub mod merge;

/// Resource and annotation model.
pub mod schema;

/// Block classification and truncation heuristics.
pub mod heuristics;

/// HTTP message model.
pub mod http;

/// Markdown extraction and the merged document set.
pub mod document;

/// Response validation.
pub mod validation;

/// Scenario configuration and placeholder substitution.
pub mod scenario;

/// Live scenario test runner.
pub mod runner;

/// Cross-file link checker.
pub mod links;

pub use document::{DocumentSet, FileId, MethodDefinition, SourceFile, SourceText};
pub use error::{AppError, AppResult};
pub use http::{HeaderMap, HttpRequest, HttpResponse, JsonBody};
pub use issues::{IssueKind, Severity, SourceLocation, Summary, ValidationError};
pub use links::check_links;
pub use merge::{merge, merge_strict, MergePolicy, Mergeable, Merged};
pub use runner::{
    CancelFlag, InvocationResult, RunOptions, RunReport, TestRunner, Transport, TransportError,
};
pub use scenario::{ScenarioDefinition, ScenarioSet, ScenarioValue};
pub use schema::{Annotation, Property, PropertyType, ResourceDefinition, ResourceLookup};
pub use validation::{validate_documented_examples, validate_response, ValidationOptions};
