#![deny(missing_docs)]

//! # Validation Issues
//!
//! The result vocabulary shared by every checker: severities, machine-readable
//! kinds, locations and the aggregate [`Summary`] that decides pass or fail.

use serde::Serialize;
use std::fmt;

/// How serious a finding is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational note, never fails a run.
    Info,
    /// Non-fatal divergence unless the caller runs in strict mode.
    Warning,
    /// Always fails the run.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Machine-readable classification of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    /// A documented block could not be interpreted and was skipped.
    StructuralParseWarning,
    /// Two fragments of one entity disagree on an equal-or-null field.
    MergeConflict,
    /// Status code or reason differs from the documented response.
    StatusMismatch,
    /// A required response header is absent.
    MissingHeader,
    /// A required response header carries an incompatible value.
    HeaderMismatch,
    /// A documented property is missing from a body.
    MissingProperty,
    /// A body carries a property the documentation does not mention.
    UndocumentedProperty,
    /// A value kind differs from the documented property type.
    TypeMismatch,
    /// A body declared as JSON does not parse.
    InvalidJson,
    /// No resource schema is associated with the method.
    NoSchema,
    /// A declared resource type is not defined anywhere in the set.
    UnknownResource,
    /// A link target cannot be resolved.
    UnresolvedReference,
    /// An absolute URL looks malformed.
    SuspiciousUrl,
    /// The transport failed to deliver a request.
    TransportFailure,
    /// A request placeholder has no value.
    UnresolvedScenarioPlaceholder,
    /// Two methods share one display name.
    DuplicateMethod,
    /// A response example has no preceding request.
    OrphanResponse,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where in the documentation a finding originates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    /// Display name of the source file.
    pub file: String,
    /// One-based line number, when known.
    pub line: Option<usize>,
}

impl SourceLocation {
    /// Location pointing at a whole file.
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
        }
    }

    /// Location pointing at a line of a file.
    pub fn line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// A single finding. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Severity of the finding.
    pub severity: Severity,
    /// Machine-readable kind.
    pub kind: IssueKind,
    /// Human-readable explanation.
    pub message: String,
    /// Optional source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl ValidationError {
    /// Creates a finding with an explicit severity.
    pub fn new(severity: Severity, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Error-severity finding.
    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    /// Warning-severity finding.
    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    /// Info-severity finding.
    pub fn info(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, message)
    }

    /// Attaches a location.
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// True for Error severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} {} {}: {}", self.severity, self.kind, loc, self.message),
            None => write!(f, "{} {}: {}", self.severity, self.kind, self.message),
        }
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Number of Error findings.
    pub errors: usize,
    /// Number of Warning findings.
    pub warnings: usize,
    /// Number of Info findings.
    pub infos: usize,
    /// Invocations (or checked units) with no Error.
    pub passed: usize,
    /// Invocations (or checked units) with at least one Error.
    pub failed: usize,
    /// Invocations never started because the run was cancelled.
    pub skipped: usize,
    /// Whether the run stopped early.
    pub cancelled: bool,
}

impl Summary {
    /// Adds the findings of one checked unit and counts it as passed or failed.
    pub fn record_unit(&mut self, issues: &[ValidationError]) {
        self.record_issues(issues);
        if issues.iter().any(ValidationError::is_error) {
            self.failed += 1;
        } else {
            self.passed += 1;
        }
    }

    /// Adds findings without counting a unit.
    pub fn record_issues(&mut self, issues: &[ValidationError]) {
        for issue in issues {
            match issue.severity {
                Severity::Error => self.errors += 1,
                Severity::Warning => self.warnings += 1,
                Severity::Info => self.infos += 1,
            }
        }
    }

    /// Any Error fails; Warnings fail only in strict mode; Info never fails.
    pub fn is_failure(&self, strict: bool) -> bool {
        self.errors > 0 || (strict && self.warnings > 0)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped ({} errors, {} warnings, {} notes)",
            self.passed, self.failed, self.skipped, self.errors, self.warnings, self.infos
        )?;
        if self.cancelled {
            f.write_str(" [cancelled]")?;
        }
        Ok(())
    }
}
