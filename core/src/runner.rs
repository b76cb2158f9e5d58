#![deny(missing_docs)]

//! # Scenario Test Runner
//!
//! Instantiates documented requests with scenario parameters, sends them
//! through a [`Transport`] and validates what comes back.
//!
//! Each method runs once per declared scenario, or once without substitutions
//! when none are declared. Failures are scoped to one invocation. With a
//! single worker invocations run in document order and each response body is
//! captured for later scenarios to reference; with more workers invocations run
//! on a bounded `rayon` pool and captures are unavailable.

use crate::document::{DocumentSet, MethodDefinition};
use crate::http::{HttpRequest, HttpResponse, JsonBody};
use crate::issues::{IssueKind, SourceLocation, Summary, ValidationError};
use crate::scenario::{instantiate, Bindings, CaptureStore, ScenarioDefinition, ScenarioSet};
use crate::validation::{validate_response, ValidationOptions};
use derive_more::{Display, From};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Failure to deliver a request or receive a response.
#[derive(Debug, Display, From)]
pub enum TransportError {
    /// The call did not finish in time.
    #[from(ignore)]
    #[display("timed out: {_0}")]
    Timeout(String),

    /// DNS, TLS or connection-level failure.
    #[from(ignore)]
    #[display("connection failed: {_0}")]
    Connection(String),

    /// Anything else.
    #[display("{_0}")]
    Other(String),
}

impl std::error::Error for TransportError {}

/// Sends one request and returns the response, whatever its status.
pub trait Transport: Send + Sync {
    /// Performs the call. Non-2xx statuses are responses, not errors.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Cooperative cancellation, checked between invocations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag; invocations not yet started are skipped.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`CancelFlag::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Worker pool size. `1` keeps document order and enables captures.
    pub workers: usize,
    /// Bearer credential injected into requests lacking `Authorization`.
    pub bearer_token: Option<String>,
    /// Base URL that relative request targets are appended to.
    pub service_root: Option<String>,
    /// Only run these methods; empty runs all.
    pub methods: Vec<String>,
    /// Response validation settings.
    pub validation: ValidationOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            bearer_token: None,
            service_root: None,
            methods: Vec::new(),
            validation: ValidationOptions::default(),
        }
    }
}

/// Outcome of one method/scenario invocation.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    /// Method display name.
    pub method: String,
    /// Scenario name, when one was applied.
    pub scenario: Option<String>,
    /// Findings, located at the method's request block.
    pub issues: Vec<ValidationError>,
    /// The response received, when the call went through.
    pub response: Option<HttpResponse>,
}

impl InvocationResult {
    /// No Error among the findings.
    pub fn passed(&self) -> bool {
        !self.issues.iter().any(ValidationError::is_error)
    }

    /// `method` or `method [scenario]`.
    pub fn label(&self) -> String {
        match &self.scenario {
            Some(s) => format!("{} [{}]", self.method, s),
            None => self.method.clone(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Completed invocations in invocation-list order.
    pub results: Vec<InvocationResult>,
    /// Findings not tied to an invocation (e.g. scenarios for unknown methods).
    pub notes: Vec<ValidationError>,
    /// Aggregate counts, including skipped work.
    pub summary: Summary,
}

/// Runs documented methods against a live service.
pub struct TestRunner<'a> {
    set: &'a DocumentSet,
    transport: &'a dyn Transport,
    options: RunOptions,
}

impl<'a> TestRunner<'a> {
    /// Creates a runner over a loaded document set.
    pub fn new(set: &'a DocumentSet, transport: &'a dyn Transport, options: RunOptions) -> Self {
        Self {
            set,
            transport,
            options,
        }
    }

    /// Runs one method, optionally under a scenario.
    pub fn run(
        &self,
        method: &MethodDefinition,
        scenario: Option<&ScenarioDefinition>,
        captures: &CaptureStore,
    ) -> InvocationResult {
        let location = SourceLocation::line(
            self.set
                .file_of(method)
                .map(|f| f.display_name.clone())
                .unwrap_or_default(),
            method.line,
        );
        let mut result = InvocationResult {
            method: method.name.clone(),
            scenario: scenario.map(|s| s.name.clone()),
            issues: Vec::new(),
            response: None,
        };
        debug!(invocation = %result.label(), "invocation started");

        let issues = match self.execute(method, scenario, captures) {
            Ok((response, issues)) => {
                result.response = Some(response);
                issues
            }
            Err(issues) => issues,
        };
        result.issues = issues.into_iter().map(|i| i.at(location.clone())).collect();

        info!(
            invocation = %result.label(),
            passed = result.passed(),
            issues = result.issues.len(),
            "invocation finished"
        );
        result
    }

    fn execute(
        &self,
        method: &MethodDefinition,
        scenario: Option<&ScenarioDefinition>,
        captures: &CaptureStore,
    ) -> Result<(HttpResponse, Vec<ValidationError>), Vec<ValidationError>> {
        let documented = HttpRequest::parse(&method.request).map_err(|e| {
            vec![ValidationError::error(
                IssueKind::StructuralParseWarning,
                format!("documented request cannot be sent: {}", e),
            )]
        })?;

        let mut request = instantiate(&documented, &Bindings::new(scenario, captures))
            .map_err(|problems| {
                problems
                    .into_iter()
                    .map(|p| ValidationError::error(IssueKind::UnresolvedScenarioPlaceholder, p))
                    .collect::<Vec<_>>()
            })?;

        request.target = self
            .resolve_target(&request.target)
            .map_err(|reason| vec![ValidationError::error(IssueKind::TransportFailure, reason)])?;

        if let Some(token) = &self.options.bearer_token {
            if !request.headers.contains("authorization") {
                request
                    .headers
                    .set("Authorization", format!("Bearer {}", token));
            }
        }

        let actual = self.transport.send(&request).map_err(|e| {
            warn!(method = %method.name, error = %e, "transport failure");
            vec![ValidationError::error(
                IssueKind::TransportFailure,
                format!("{} {} failed: {}", request.method, request.target, e),
            )]
        })?;

        let mut issues = Vec::new();
        let expected = match method.expected_response.as_deref().map(HttpResponse::parse) {
            Some(Ok(expected)) => Some(expected),
            Some(Err(e)) => {
                issues.push(ValidationError::warning(
                    IssueKind::StructuralParseWarning,
                    format!("documented response does not parse; status not compared: {}", e),
                ));
                None
            }
            None => None,
        };

        issues.extend(validate_response(
            method,
            self.set.schema_for(method),
            &actual,
            expected.as_ref(),
            self.set,
            &self.options.validation,
        ));
        Ok((actual, issues))
    }

    /// Joins relative targets onto the service root and checks the result.
    fn resolve_target(&self, target: &str) -> Result<String, String> {
        let absolute = target.starts_with("http://") || target.starts_with("https://");
        let full = match (&self.options.service_root, absolute) {
            (_, true) => target.to_string(),
            (Some(root), false) => format!(
                "{}/{}",
                root.trim_end_matches('/'),
                target.trim_start_matches('/')
            ),
            (None, false) => {
                return Err(format!(
                    "relative request target '{}' needs a service root",
                    target
                ))
            }
        };
        Url::parse(&full)
            .map(|_| full.clone())
            .map_err(|e| format!("invalid request URL '{}': {}", full, e))
    }

    /// Method/scenario pairs in document order.
    fn invocations<'s>(
        &'s self,
        scenarios: &'s ScenarioSet,
    ) -> Vec<(&'s MethodDefinition, Option<&'s ScenarioDefinition>)> {
        let mut out = Vec::new();
        for method in self.set.methods() {
            if !self.options.methods.is_empty() && !self.options.methods.contains(&method.name) {
                continue;
            }
            let declared = scenarios.scenarios_for(&method.name);
            if declared.is_empty() {
                out.push((method, None));
            } else {
                out.extend(declared.iter().map(|s| (method, Some(s))));
            }
        }
        out
    }

    /// Runs every selected method under every scenario.
    pub fn run_all(&self, scenarios: &ScenarioSet, cancel: &CancelFlag) -> RunReport {
        let mut report = RunReport::default();
        for name in scenarios.methods() {
            if self.set.method(name).is_none() {
                report.notes.push(ValidationError::warning(
                    IssueKind::StructuralParseWarning,
                    format!("scenarios reference method '{}', which is not documented", name),
                ));
            }
        }

        let invocations = self.invocations(scenarios);
        let total = invocations.len();
        info!(invocations = total, workers = self.options.workers, "run started");

        let completed = if self.options.workers <= 1 {
            self.run_sequential(&invocations, cancel)
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.workers)
                .build()
            {
                Ok(pool) => pool.install(|| {
                    let empty = CaptureStore::new();
                    invocations
                        .par_iter()
                        .filter_map(|(method, scenario)| {
                            (!cancel.is_cancelled()).then(|| self.run(method, *scenario, &empty))
                        })
                        .collect::<Vec<_>>()
                }),
                Err(e) => {
                    warn!(error = %e, "worker pool unavailable; running sequentially");
                    self.run_sequential(&invocations, cancel)
                }
            }
        };

        report.summary.record_issues(&report.notes);
        for result in &completed {
            report.summary.record_unit(&result.issues);
        }
        report.summary.skipped = total - completed.len();
        report.summary.cancelled = cancel.is_cancelled();
        if report.summary.cancelled {
            warn!(skipped = report.summary.skipped, "run cancelled");
        }
        report.results = completed;
        info!(summary = %report.summary, "run finished");
        report
    }

    fn run_sequential(
        &self,
        invocations: &[(&MethodDefinition, Option<&ScenarioDefinition>)],
        cancel: &CancelFlag,
    ) -> Vec<InvocationResult> {
        let mut captures = CaptureStore::new();
        let mut out = Vec::with_capacity(invocations.len());
        for (method, scenario) in invocations {
            if cancel.is_cancelled() {
                break;
            }
            let result = self.run(method, *scenario, &captures);
            if let Some(JsonBody::Parsed(body)) = result.response.as_ref().map(HttpResponse::json) {
                captures.insert(method.name.clone(), body.clone());
            }
            out.push(result);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceText;
    use crate::issues::Severity;
    use std::path::Path;
    use std::sync::Mutex;

    const DOCS: &str = r#"# user

<!-- { "blockType": "resource", "@odata.type": "test.user" } -->
```json
{ "id": "1", "displayName": "Ada" }
```

<!-- { "blockType": "request", "name": "create-user" } -->
```http
POST /users
```

<!-- { "blockType": "response", "@odata.type": "test.user" } -->
```http
HTTP/1.1 201 Created
```

<!-- { "blockType": "request", "name": "get-user" } -->
```http
GET /users/{id}
```

<!-- { "blockType": "response", "@odata.type": "test.user" } -->
```http
HTTP/1.1 200 OK
Content-Type: application/json
```
"#;

    const SCENARIOS: &str = r#"
get-user:
  - name: existing
    parameters:
      id: { capture: create-user, pointer: /id }
  - name: broken
    parameters:
      id: "boom"
"#;

    struct Stub {
        seen: Mutex<Vec<String>>,
    }

    impl Stub {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Stub {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{} {} {:?}", request.method, request.target, request.headers.get("authorization")));
            if request.target.ends_with("/boom") {
                return Err(TransportError::Connection("reset by peer".into()));
            }
            let status = if request.method == "POST" { (201, "Created") } else { (200, "OK") };
            Ok(HttpResponse::new(status.0, status.1)
                .with_header("Content-Type", "application/json")
                .with_body(r#"{"id":"u-7","displayName":"Ada"}"#))
        }
    }

    fn docs() -> DocumentSet {
        DocumentSet::from_sources(Path::new("docs"), vec![SourceText::new("user.md", DOCS)])
            .unwrap()
            .0
    }

    fn options() -> RunOptions {
        RunOptions {
            service_root: Some("https://api.example.com/v1/".into()),
            bearer_token: Some("secret".into()),
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_two_scenarios_scored_independently() {
        let set = docs();
        let stub = Stub::new();
        let scenarios = ScenarioSet::from_yaml(SCENARIOS).unwrap();
        let runner = TestRunner::new(&set, &stub, options());

        let report = runner.run_all(&scenarios, &CancelFlag::new());
        let labels: Vec<String> = report.results.iter().map(InvocationResult::label).collect();
        assert_eq!(labels, vec!["create-user", "get-user [existing]", "get-user [broken]"]);

        assert!(report.results[0].passed());
        assert!(report.results[1].passed());
        let broken = &report.results[2];
        assert!(!broken.passed());
        assert_eq!(broken.issues.len(), 1);
        assert_eq!(broken.issues[0].kind, IssueKind::TransportFailure);
        assert_eq!(broken.issues[0].location, Some(SourceLocation::line("user.md", 19)));

        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.summary.failed, 1);
        assert!(report.summary.is_failure(false));

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0], "POST https://api.example.com/v1/users Some(\"Bearer secret\")");
        assert_eq!(seen[1], "GET https://api.example.com/v1/users/u-7 Some(\"Bearer secret\")");
    }

    #[test]
    fn test_status_compared_with_documented_response() {
        let set = docs();
        let stub = Stub::new();
        let runner = TestRunner::new(&set, &stub, options());
        let method = set.method("create-user").unwrap();
        let result = runner.run(method, None, &CaptureStore::new());
        assert!(result.passed());
        assert_eq!(result.response.unwrap().status, 201);
    }

    #[test]
    fn test_unresolved_placeholder_fails_fast() {
        let set = docs();
        let stub = Stub::new();
        let runner = TestRunner::new(&set, &stub, options());
        let method = set.method("get-user").unwrap();

        let result = runner.run(method, None, &CaptureStore::new());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, IssueKind::UnresolvedScenarioPlaceholder);
        assert_eq!(result.issues[0].severity, Severity::Error);
        assert!(result.response.is_none());
        assert!(stub.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_relative_target_without_root() {
        let set = docs();
        let stub = Stub::new();
        let runner = TestRunner::new(&set, &stub, RunOptions::default());
        let result = runner.run(set.method("create-user").unwrap(), None, &CaptureStore::new());
        assert_eq!(result.issues[0].kind, IssueKind::TransportFailure);
    }

    #[test]
    fn test_cancelled_run_reports_skipped() {
        let set = docs();
        let stub = Stub::new();
        let runner = TestRunner::new(&set, &stub, options());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = runner.run_all(&ScenarioSet::default(), &cancel);
        assert!(report.results.is_empty());
        assert_eq!(report.summary.skipped, 2);
        assert!(report.summary.cancelled);
    }

    #[test]
    fn test_parallel_run_keeps_invocation_order() {
        let set = docs();
        let stub = Stub::new();
        let scenarios = ScenarioSet::from_yaml("get-user:\n  - name: a\n    parameters: { id: x }\n  - name: b\n    parameters: { id: y }\n").unwrap();
        let runner = TestRunner::new(
            &set,
            &stub,
            RunOptions {
                workers: 3,
                ..options()
            },
        );
        let report = runner.run_all(&scenarios, &CancelFlag::new());
        let labels: Vec<String> = report.results.iter().map(InvocationResult::label).collect();
        assert_eq!(labels, vec!["create-user", "get-user [a]", "get-user [b]"]);
        assert_eq!(report.summary.passed, 3);
    }

    #[test]
    fn test_unknown_scenario_method_is_noted() {
        let set = docs();
        let stub = Stub::new();
        let runner = TestRunner::new(&set, &stub, options());
        let scenarios = ScenarioSet::from_yaml("delete-user:\n  - name: a\n").unwrap();
        let report = runner.run_all(&scenarios, &CancelFlag::new());
        assert_eq!(report.notes.len(), 1);
        assert_eq!(report.summary.warnings, 1);
    }
}
