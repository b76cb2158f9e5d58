#![deny(missing_docs)]

//! # Structural Inference
//!
//! Turns a documented JSON example into resource definitions by scanning keys
//! and value kinds. No schema language is required from the author.

use crate::error::{AppError, AppResult};
use crate::heuristics::looks_truncated;
use crate::schema::resource::{Property, PropertyType, ResourceDefinition, ScalarKind};
use serde_json::{Map, Value};

/// Author-provided hints from the block's metadata comment.
#[derive(Debug, Clone, Default)]
pub struct InferenceHints {
    /// Properties real responses may omit.
    pub optional_properties: Vec<String>,
    /// Properties documented as nullable even when the example has a value.
    pub nullable_properties: Vec<String>,
    /// Key property name.
    pub key_property: Option<String>,
    /// Resource description.
    pub description: Option<String>,
}

/// Infers the named resource from an example, plus every nested resource it
/// implies.
///
/// The root definition comes first. Nested objects carrying `@odata.type`
/// become fragments of that type; other nested objects become child resources
/// named `<parent>.<property>`. Arrays of objects yield one fragment per
/// element, to be folded later by the merge engine.
pub fn infer_resources(
    name: &str,
    example: &Value,
    hints: &InferenceHints,
) -> AppResult<Vec<ResourceDefinition>> {
    let mut out = Vec::new();
    match example {
        Value::Object(map) => infer_object(name, map, Some(hints), &mut out),
        Value::Array(items) if items.iter().any(Value::is_object) => {
            for map in items.iter().filter_map(Value::as_object) {
                infer_object(name, map, Some(hints), &mut out);
            }
        }
        other => {
            return Err(AppError::General(format!(
                "resource example for '{}' must be a JSON object, found {}",
                name,
                kind_name(other)
            )))
        }
    }
    Ok(out)
}

fn infer_object(
    name: &str,
    map: &Map<String, Value>,
    hints: Option<&InferenceHints>,
    out: &mut Vec<ResourceDefinition>,
) {
    let slot = out.len();
    out.push(ResourceDefinition::new(name));

    let mut def = ResourceDefinition::new(name);
    if let Some(h) = hints {
        def.key_property = h.key_property.clone();
        def.description = h.description.clone();
    }

    for (key, value) in map {
        if is_control_key(key) {
            continue;
        }
        let mut property = Property::new(key.clone(), infer_type(name, key, value, out));
        if value.is_null() || hints.is_some_and(|h| h.nullable_properties.contains(key)) {
            property.nullable = Some(true);
        }
        if looks_truncated(value) || hints.is_some_and(|h| h.optional_properties.contains(key)) {
            property.truncatable = Some(true);
        }
        def.insert(property);
    }

    if let Some(h) = hints {
        for optional in &h.optional_properties {
            if !def.properties.contains_key(optional) {
                def.insert(Property::new(optional.clone(), PropertyType::unknown()).truncatable());
            }
        }
    }

    out[slot] = def;
}

fn infer_type(
    parent: &str,
    key: &str,
    value: &Value,
    out: &mut Vec<ResourceDefinition>,
) -> PropertyType {
    match value {
        Value::Null => PropertyType::unknown(),
        Value::Bool(_) => PropertyType::Scalar(ScalarKind::Boolean),
        Value::Number(n) if n.is_f64() => PropertyType::Scalar(ScalarKind::Double),
        Value::Number(_) => PropertyType::Scalar(ScalarKind::Int64),
        Value::String(_) => PropertyType::Scalar(ScalarKind::String),
        Value::Object(map) => {
            let child = match map.get("@odata.type").and_then(Value::as_str) {
                Some(declared) => declared.trim_start_matches('#').to_string(),
                None => format!("{}.{}", parent, key),
            };
            infer_object(&child, map, None, out);
            PropertyType::Resource(child)
        }
        Value::Array(items) => {
            let mut element = PropertyType::unknown();
            for item in items.iter().filter(|i| !i.is_null()) {
                let ty = infer_type(parent, key, item, out);
                if element.is_unknown() {
                    element = ty;
                }
            }
            PropertyType::Collection(Box::new(element))
        }
    }
}

/// Instance annotations (`@odata.context`, `name@odata.type`) are not properties.
pub(crate) fn is_control_key(key: &str) -> bool {
    key.starts_with('@') || key.contains("@odata.")
}

/// Short human name of a JSON value kind.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_kinds() {
        let example = json!({
            "@odata.context": "https://graph/$metadata#users/$entity",
            "id": "1",
            "age": 42,
            "score": 1.5,
            "active": true,
            "manager": null
        });
        let defs = infer_resources("user", &example, &InferenceHints::default()).unwrap();
        assert_eq!(defs.len(), 1);
        let user = &defs[0];
        assert!(user.property("@odata.context").is_none());
        assert_eq!(user.property("id").unwrap().ty.to_string(), "Edm.String");
        assert_eq!(user.property("age").unwrap().ty.to_string(), "Edm.Int64");
        assert_eq!(user.property("score").unwrap().ty.to_string(), "Edm.Double");
        assert_eq!(user.property("active").unwrap().ty.to_string(), "Edm.Boolean");
        let manager = user.property("manager").unwrap();
        assert!(manager.ty.is_unknown());
        assert!(manager.is_nullable());
    }

    #[test]
    fn test_nested_objects_and_collections() {
        let example = json!({
            "id": "1",
            "address": { "city": "Oslo" },
            "photo": { "@odata.type": "#microsoft.graph.photo", "width": 10 },
            "emails": [ { "address": "a@b.c" }, { "name": "A" } ],
            "tags": [],
            "scores": [null, 3]
        });
        let defs = infer_resources("user", &example, &InferenceHints::default()).unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["user", "user.address", "microsoft.graph.photo", "user.emails", "user.emails"]
        );

        let user = &defs[0];
        assert_eq!(user.property("address").unwrap().ty.to_string(), "user.address");
        assert_eq!(user.property("photo").unwrap().ty.to_string(), "microsoft.graph.photo");
        assert_eq!(
            user.property("emails").unwrap().ty.to_string(),
            "Collection(user.emails)"
        );
        assert!(user.property("tags").unwrap().ty.is_unknown());
        assert_eq!(
            user.property("scores").unwrap().ty.to_string(),
            "Collection(Edm.Int64)"
        );
    }

    #[test]
    fn test_hints_apply() {
        let hints = InferenceHints {
            optional_properties: vec!["tags".into(), "photo".into()],
            nullable_properties: vec!["name".into()],
            key_property: Some("id".into()),
            description: None,
        };
        let example = json!({ "id": "1", "name": "x", "tags": ["a"], "note": "Long text..." });
        let defs = infer_resources("item", &example, &hints).unwrap();
        let item = &defs[0];
        assert_eq!(item.key_property.as_deref(), Some("id"));
        assert!(item.property("tags").unwrap().is_truncatable());
        assert!(item.property("name").unwrap().is_nullable());
        assert!(item.property("note").unwrap().is_truncatable());
        let photo = item.property("photo").unwrap();
        assert!(photo.is_truncatable());
        assert!(photo.ty.is_unknown());
        assert!(!item.property("id").unwrap().is_truncatable());
    }

    #[test]
    fn test_scalar_example_rejected() {
        let err = infer_resources("x", &json!("text"), &InferenceHints::default()).unwrap_err();
        assert!(err.to_string().contains("found string"));
    }
}
