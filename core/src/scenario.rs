#![deny(missing_docs)]

//! # Scenarios
//!
//! Named parameter sets that instantiate documented requests for live runs,
//! loaded from a YAML (or JSON) file keyed by method name:
//!
//! ```yaml
//! get-user:
//!   - name: existing user
//!     parameters:
//!       user-id: "42"
//!       tenant: { capture: create-tenant, pointer: /id }
//! ```
//!
//! Placeholders are written `{name}` or `{name=default}` in the request
//! target, header values and body.

use crate::error::{AppError, AppResult};
use crate::http::HttpRequest;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Parsed response bodies of earlier invocations, keyed by method name.
pub type CaptureStore = HashMap<String, Value>;

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioValue {
    /// A field of an earlier method's response.
    Capture {
        /// Method whose response is read.
        capture: String,
        /// JSON pointer into that response body.
        pointer: String,
    },
    /// A literal string, number or boolean.
    Literal(Value),
}

/// A named set of substitutions for one method.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDefinition {
    /// Scenario name, unique per method.
    pub name: String,
    /// Target method display name.
    pub method: String,
    /// Parameter name to value.
    pub parameters: IndexMap<String, ScenarioValue>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioEntry {
    name: String,
    #[serde(default)]
    parameters: IndexMap<String, ScenarioValue>,
}

/// Every scenario, grouped by method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioSet {
    by_method: IndexMap<String, Vec<ScenarioDefinition>>,
}

impl ScenarioSet {
    /// Parses scenario configuration text (YAML or JSON).
    pub fn from_yaml(text: &str) -> AppResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: IndexMap<String, Vec<ScenarioEntry>> = serde_yaml::from_str(text)?;
        let mut by_method = IndexMap::with_capacity(raw.len());
        for (method, entries) in raw {
            let mut scenarios: Vec<ScenarioDefinition> = Vec::with_capacity(entries.len());
            for entry in entries {
                let name = entry.name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::General(format!(
                        "scenario for method '{}' has an empty name",
                        method
                    )));
                }
                if scenarios.iter().any(|s| s.name == name) {
                    return Err(AppError::General(format!(
                        "duplicate scenario '{}' for method '{}'",
                        name, method
                    )));
                }
                scenarios.push(ScenarioDefinition {
                    name,
                    method: method.clone(),
                    parameters: entry.parameters,
                });
            }
            by_method.insert(method, scenarios);
        }
        Ok(Self { by_method })
    }

    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = fs::read_to_string(path)?;
        let set = Self::from_yaml(&text)?;
        debug!(path = %path.display(), methods = set.by_method.len(), "scenarios loaded");
        Ok(set)
    }

    /// Scenarios declared for `method`, in file order.
    pub fn scenarios_for(&self, method: &str) -> &[ScenarioDefinition] {
        self.by_method.get(method).map(Vec::as_slice).unwrap_or_default()
    }

    /// Method names the file mentions.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.by_method.keys().map(String::as_str)
    }

    /// Total number of scenarios.
    pub fn len(&self) -> usize {
        self.by_method.values().map(Vec::len).sum()
    }

    /// True when no scenario is declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Values available to placeholders during one invocation.
pub struct Bindings<'a> {
    scenario: Option<&'a ScenarioDefinition>,
    captures: &'a CaptureStore,
}

impl<'a> Bindings<'a> {
    /// Binds a scenario (or none) and the capture store.
    pub fn new(scenario: Option<&'a ScenarioDefinition>, captures: &'a CaptureStore) -> Self {
        Self { scenario, captures }
    }

    /// Resolves a placeholder: scenario parameter, then the inline default.
    pub fn resolve(&self, name: &str, default: Option<&str>) -> Result<String, String> {
        let parameter = self.scenario.and_then(|s| s.parameters.get(name));
        match parameter {
            Some(ScenarioValue::Literal(value)) => Ok(literal_text(value)),
            Some(ScenarioValue::Capture { capture, pointer }) => {
                let Some(body) = self.captures.get(capture) else {
                    return Err(format!(
                        "placeholder '{}' captures from '{}', which has not produced a response",
                        name, capture
                    ));
                };
                body.pointer(pointer).map(literal_text).ok_or_else(|| {
                    format!(
                        "placeholder '{}': pointer '{}' not found in the response of '{}'",
                        name, pointer, capture
                    )
                })
            }
            None => default.map(str::to_string).ok_or_else(|| {
                format!("placeholder '{}' has no scenario value and no default", name)
            }),
        }
    }
}

fn literal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)(?:=([^{}]*))?\}").expect("Invalid regex"))
}

/// Replaces placeholders in `text`. Unresolved ones stay verbatim and their
/// reasons are appended to `problems` (once each).
pub fn substitute(text: &str, bindings: &Bindings<'_>, problems: &mut Vec<String>) -> String {
    placeholder_re()
        .replace_all(text, |caps: &Captures| {
            let default = caps.get(2).map(|m| m.as_str());
            match bindings.resolve(&caps[1], default) {
                Ok(value) => value,
                Err(problem) => {
                    if !problems.contains(&problem) {
                        problems.push(problem);
                    }
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Instantiates a documented request. Fails with every unresolved placeholder.
pub fn instantiate(request: &HttpRequest, bindings: &Bindings<'_>) -> Result<HttpRequest, Vec<String>> {
    let mut problems = Vec::new();
    let target = substitute(&request.target, bindings, &mut problems);
    let mut headers = request.headers.clone();
    headers.map_values(|v| substitute(v, bindings, &mut problems));
    let body = substitute(&request.body, bindings, &mut problems);
    if !problems.is_empty() {
        return Err(problems);
    }

    let mut out = HttpRequest::new(request.method.clone(), target).with_body(body);
    out.version = request.version.clone();
    out.headers = headers;
    Ok(out)
}
