#![deny(missing_docs)]

//! # Response Validator
//!
//! Compares an HTTP response against a method's documented expectations:
//! status line, required headers, then a recursive structural walk of the JSON
//! body against the resource schema.
//!
//! Severity rules:
//! - a documented property missing from the body is an Error, or a Warning
//!   when the property is truncatable or the method's example is truncated;
//! - a body property the documentation does not mention uses the configured
//!   severity (Warning by default);
//! - a value of the wrong JSON kind is an Error.

use crate::document::{DocumentSet, MethodDefinition};
use crate::http::{is_json_media_type, media_type, HttpRequest, HttpResponse, JsonBody};
use crate::issues::{IssueKind, Severity, SourceLocation, ValidationError};
use crate::schema::infer::is_control_key;
use crate::schema::{kind_name, PropertyType, ResourceDefinition, ResourceLookup, ScalarKind};
use serde_json::{Map, Value};
use tracing::debug;

/// Tunables for response validation.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Severity of a body property missing from the documentation.
    pub undocumented_property_severity: Severity,
    /// Header names that must be present on a response carrying a body.
    pub required_headers: Vec<String>,
    /// Fold case in reason phrases and skip the comparison when the actual
    /// response carries none. Off by default: a documented reason must match
    /// exactly.
    pub tolerate_reason_phrase: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            undocumented_property_severity: Severity::Warning,
            required_headers: vec!["content-type".to_string()],
            tolerate_reason_phrase: false,
        }
    }
}

/// Validates `actual` against the method's documentation.
///
/// `schema` is the method's resolved response resource, `expected` its
/// documented response when one should be compared. Returned findings carry no
/// location; callers attach one.
pub fn validate_response(
    method: &MethodDefinition,
    schema: Option<&ResourceDefinition>,
    actual: &HttpResponse,
    expected: Option<&HttpResponse>,
    lookup: &dyn ResourceLookup,
    options: &ValidationOptions,
) -> Vec<ValidationError> {
    let mut out = Vec::new();

    if let Some(expected) = expected {
        check_status(actual, expected, options, &mut out);
    }
    check_headers(actual, expected, options, &mut out);

    if method.expect_error {
        return out;
    }

    let body = actual.json();
    if let JsonBody::Invalid(reason) = body {
        out.push(ValidationError::error(
            IssueKind::InvalidJson,
            format!("response body is not valid JSON: {}", reason),
        ));
        return out;
    }

    let Some(schema) = schema else {
        match method.response_type.as_deref() {
            Some(name) => out.push(ValidationError::warning(
                IssueKind::UnknownResource,
                format!("response type '{}' is not defined in the documentation", name),
            )),
            None => out.push(ValidationError::info(
                IssueKind::NoSchema,
                format!("method '{}' declares no response resource; body not checked", method.name),
            )),
        }
        return out;
    };

    let walker = Walker {
        lookup,
        options,
        truncated: method.truncated,
    };
    match body {
        JsonBody::Parsed(value) if method.is_collection => {
            let items = match value {
                Value::Array(items) => Some(items),
                Value::Object(map) => map.get("value").and_then(Value::as_array),
                _ => None,
            };
            match items {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        walker.element(schema, item, &format!("$.value[{}]", i), &mut out);
                    }
                }
                None => out.push(ValidationError::error(
                    IssueKind::TypeMismatch,
                    format!(
                        "$: expected a collection of {}, found {}",
                        schema.name,
                        kind_name(value)
                    ),
                )),
            }
        }
        JsonBody::Parsed(value) => walker.element(schema, value, "$", &mut out),
        JsonBody::Empty | JsonBody::NotJson | JsonBody::Invalid(_) => {
            out.push(ValidationError::error(
                IssueKind::TypeMismatch,
                format!("$: expected a JSON {} body, found none", schema.name),
            ));
        }
    }
    out
}

fn check_status(
    actual: &HttpResponse,
    expected: &HttpResponse,
    options: &ValidationOptions,
    out: &mut Vec<ValidationError>,
) {
    let reason_differs = if expected.reason.is_empty() {
        false
    } else if options.tolerate_reason_phrase {
        !actual.reason.is_empty() && !actual.reason.eq_ignore_ascii_case(&expected.reason)
    } else {
        actual.reason != expected.reason
    };
    if actual.status != expected.status || reason_differs {
        out.push(ValidationError::error(
            IssueKind::StatusMismatch,
            format!(
                "expected status {}, got {}",
                expected.status_text(),
                actual.status_text()
            ),
        ));
    }
}

fn check_headers(
    actual: &HttpResponse,
    expected: Option<&HttpResponse>,
    options: &ValidationOptions,
    out: &mut Vec<ValidationError>,
) {
    for name in &options.required_headers {
        let documented = expected.and_then(|e| e.headers.get(name));
        let required = documented.is_some() || (expected.is_none() && !actual.body.trim().is_empty());
        if !required {
            continue;
        }
        let Some(value) = actual.headers.get(name) else {
            out.push(ValidationError::warning(
                IssueKind::MissingHeader,
                format!("response is missing the '{}' header", name),
            ));
            continue;
        };
        let Some(documented) = documented else {
            continue;
        };
        let compatible = if name.eq_ignore_ascii_case("content-type") {
            media_type(value) == media_type(documented)
                || (is_json_media_type(value) && is_json_media_type(documented))
        } else {
            value.trim().eq_ignore_ascii_case(documented.trim())
        };
        if !compatible {
            out.push(ValidationError::error(
                IssueKind::HeaderMismatch,
                format!(
                    "header '{}' is '{}', documented as '{}'",
                    name, value, documented
                ),
            ));
        }
    }
}

struct Walker<'a> {
    lookup: &'a dyn ResourceLookup,
    options: &'a ValidationOptions,
    truncated: bool,
}

impl Walker<'_> {
    fn element(&self, def: &ResourceDefinition, value: &Value, path: &str, out: &mut Vec<ValidationError>) {
        match value {
            Value::Object(map) => self.object(def, map, path, out),
            other => out.push(ValidationError::error(
                IssueKind::TypeMismatch,
                format!("{}: expected {} object, found {}", path, def.name, kind_name(other)),
            )),
        }
    }

    fn object(
        &self,
        def: &ResourceDefinition,
        map: &Map<String, Value>,
        path: &str,
        out: &mut Vec<ValidationError>,
    ) {
        for (name, property) in &def.properties {
            let child = format!("{}.{}", path, name);
            match map.get(name) {
                Some(value) => self.value(&property.ty, property.is_nullable(), value, &child, out),
                None if property.is_truncatable() || self.truncated => {
                    out.push(ValidationError::warning(
                        IssueKind::MissingProperty,
                        format!("{}: documented property is absent (truncatable)", child),
                    ))
                }
                None => out.push(ValidationError::error(
                    IssueKind::MissingProperty,
                    format!("{}: documented property of {} is absent", child, def.name),
                )),
            }
        }

        for key in map.keys() {
            if is_control_key(key) || def.properties.contains_key(key) {
                continue;
            }
            out.push(ValidationError::new(
                self.options.undocumented_property_severity,
                IssueKind::UndocumentedProperty,
                format!("{}.{}: property is not documented on {}", path, key, def.name),
            ));
        }
    }

    fn value(
        &self,
        ty: &PropertyType,
        nullable: bool,
        value: &Value,
        path: &str,
        out: &mut Vec<ValidationError>,
    ) {
        if value.is_null() {
            if !nullable && !ty.is_unknown() {
                out.push(ValidationError::warning(
                    IssueKind::TypeMismatch,
                    format!("{}: null for a property not documented as nullable", path),
                ));
            }
            return;
        }

        match ty {
            PropertyType::Scalar(kind) => {
                let ok = match kind {
                    ScalarKind::Unknown => true,
                    ScalarKind::String => value.is_string(),
                    ScalarKind::Int64 => value.is_i64() || value.is_u64(),
                    ScalarKind::Double => value.is_number(),
                    ScalarKind::Boolean => value.is_boolean(),
                };
                if !ok {
                    out.push(mismatch(path, ty, value));
                }
            }
            PropertyType::Resource(name) => {
                let Value::Object(map) = value else {
                    out.push(mismatch(path, ty, value));
                    return;
                };
                match self.lookup.resource(name) {
                    Some(def) => self.object(def, map, path, out),
                    None => out.push(ValidationError::warning(
                        IssueKind::UnknownResource,
                        format!("{}: resource '{}' is not defined; not checked", path, name),
                    )),
                }
            }
            PropertyType::Collection(inner) => {
                let Value::Array(items) = value else {
                    out.push(mismatch(path, ty, value));
                    return;
                };
                for (i, item) in items.iter().enumerate() {
                    self.value(inner, nullable, item, &format!("{}[{}]", path, i), out);
                }
            }
        }
    }
}

fn mismatch(path: &str, ty: &PropertyType, value: &Value) -> ValidationError {
    ValidationError::error(
        IssueKind::TypeMismatch,
        format!("{}: expected {}, found {}", path, ty, kind_name(value)),
    )
}

/// Cross-checks every method's documented response against its schema.
///
/// No network is involved; the documented example plays the actual response.
/// Header requirements are skipped since there is nothing to compare against.
pub fn validate_documented_examples(
    set: &DocumentSet,
    options: &ValidationOptions,
) -> Vec<ValidationError> {
    let options = ValidationOptions {
        required_headers: Vec::new(),
        ..options.clone()
    };
    let mut out = Vec::new();

    for method in set.methods() {
        let file = set
            .file_of(method)
            .map(|f| f.display_name.clone())
            .unwrap_or_default();
        let location = SourceLocation::line(file, method.line);

        if let Err(e) = HttpRequest::parse(&method.request) {
            out.push(
                ValidationError::warning(
                    IssueKind::StructuralParseWarning,
                    format!("request of '{}' does not parse: {}", method.name, e),
                )
                .at(location.clone()),
            );
        }

        let Some(text) = method.expected_response.as_deref() else {
            debug!(method = %method.name, "no documented response");
            continue;
        };
        let response = match HttpResponse::parse(text) {
            Ok(r) => r,
            Err(e) => {
                out.push(
                    ValidationError::warning(
                        IssueKind::StructuralParseWarning,
                        format!("response of '{}' does not parse: {}", method.name, e),
                    )
                    .at(location),
                );
                continue;
            }
        };

        let issues = validate_response(
            method,
            set.schema_for(method),
            &response,
            None,
            set,
            &options,
        );
        out.extend(issues.into_iter().map(|i| i.at(location.clone())));
    }
    out
}
