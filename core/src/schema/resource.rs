#![deny(missing_docs)]

//! # Resource Definitions
//!
//! Structured shape of a documented resource type and the merge tables that
//! fold fragments of one resource found in different files.

use crate::merge::{merge_keyed, FieldValue, MergePolicy, MergeTable, Mergeable};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Scalar value kinds recognised in documented payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarKind {
    /// JSON string.
    String,
    /// Integral JSON number.
    Int64,
    /// Fractional JSON number.
    Double,
    /// JSON boolean.
    Boolean,
    /// Not yet known (inferred from `null` or an empty array).
    Unknown,
}

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyType {
    /// A scalar value.
    Scalar(ScalarKind),
    /// An object conforming to the named resource.
    Resource(String),
    /// An array whose elements share one type.
    Collection(Box<PropertyType>),
}

impl PropertyType {
    /// Unknown scalar; acts as null during merges.
    pub fn unknown() -> Self {
        PropertyType::Scalar(ScalarKind::Unknown)
    }

    /// True if the type, or a collection's element type, is still unknown.
    pub fn is_unknown(&self) -> bool {
        match self {
            PropertyType::Scalar(kind) => *kind == ScalarKind::Unknown,
            PropertyType::Resource(_) => false,
            PropertyType::Collection(inner) => inner.is_unknown(),
        }
    }

    /// Named resource referenced by this type, looking through collections.
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            PropertyType::Resource(name) => Some(name),
            PropertyType::Collection(inner) => inner.resource_name(),
            PropertyType::Scalar(_) => None,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Scalar(kind) => write!(f, "Edm.{:?}", kind),
            PropertyType::Resource(name) => f.write_str(name),
            PropertyType::Collection(inner) => write!(f, "Collection({})", inner),
        }
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(PropertyType::Collection(Box::new(inner.parse()?)));
        }
        let scalar = match s {
            "Edm.String" => Some(ScalarKind::String),
            "Edm.Int64" | "Edm.Int32" | "Edm.Int16" | "Edm.Byte" => Some(ScalarKind::Int64),
            "Edm.Double" | "Edm.Single" | "Edm.Decimal" => Some(ScalarKind::Double),
            "Edm.Boolean" => Some(ScalarKind::Boolean),
            "Edm.Unknown" => Some(ScalarKind::Unknown),
            _ => None,
        };
        match scalar {
            Some(kind) => Ok(PropertyType::Scalar(kind)),
            None if s.is_empty() => Err("empty type name".to_string()),
            None => Ok(PropertyType::Resource(s.trim_start_matches('#').to_string())),
        }
    }
}

/// A named property of a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    /// Property name as it appears in JSON.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: PropertyType,
    /// Whether `null` is a documented value.
    pub nullable: Option<bool>,
    /// Whether real responses may omit or shorten the value.
    pub truncatable: Option<bool>,
    /// Optional prose.
    pub description: Option<String>,
}

impl Property {
    /// A property with only a name and a type.
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: None,
            truncatable: None,
            description: None,
        }
    }

    /// Marks the property as truncatable.
    pub fn truncatable(mut self) -> Self {
        self.truncatable = Some(true);
        self
    }

    /// Marks the property as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    /// True when responses may omit the property.
    pub fn is_truncatable(&self) -> bool {
        self.truncatable.unwrap_or(false)
    }

    /// True when `null` is acceptable.
    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(false)
    }
}

impl Mergeable for Property {
    const ENTITY: &'static str = "property";

    fn identifier(&self) -> &str {
        &self.name
    }

    fn merge_table() -> &'static MergeTable<Self> {
        static TABLE: OnceLock<MergeTable<Property>> = OnceLock::new();
        TABLE.get_or_init(|| {
            MergeTable::<Self>::new()
                .field("shape", MergePolicy::PreferGreaterValue, get_shape, set_shape)
                .field("type", MergePolicy::EqualOrNull, get_type, set_type)
                .field(
                    "nullable",
                    MergePolicy::PreferGreaterValue,
                    |p| FieldValue::flag(p.nullable),
                    |p, v| p.nullable = v.into_flag(),
                )
                .field(
                    "truncatable",
                    MergePolicy::PreferGreaterValue,
                    |p| FieldValue::flag(p.truncatable),
                    |p, v| p.truncatable = v.into_flag(),
                )
                .field(
                    "description",
                    MergePolicy::EqualOrNull,
                    |p| FieldValue::text(p.description.as_deref()),
                    |p, v| p.description = v.into_text(),
                )
        })
    }
}

// Collection nesting of a still-unknown type; deeper shapes are more specific.
fn get_shape(p: &Property) -> FieldValue {
    if !p.ty.is_unknown() {
        return FieldValue::Null;
    }
    let mut depth = 0;
    let mut ty = &p.ty;
    while let PropertyType::Collection(inner) = ty {
        depth += 1;
        ty = inner;
    }
    FieldValue::Int(depth)
}

fn set_shape(p: &mut Property, value: FieldValue) {
    let Some(depth) = value.into_int() else {
        return;
    };
    if p.ty.is_unknown() {
        p.ty = (0..depth).fold(PropertyType::unknown(), |ty, _| {
            PropertyType::Collection(Box::new(ty))
        });
    }
}

fn get_type(p: &Property) -> FieldValue {
    if p.ty.is_unknown() {
        FieldValue::Null
    } else {
        FieldValue::Text(p.ty.to_string())
    }
}

// A null resolution keeps the unknown shape chosen by the "shape" rule.
fn set_type(p: &mut Property, value: FieldValue) {
    if let Some(ty) = value.into_text().and_then(|t| t.parse().ok()) {
        p.ty = ty;
    }
}

/// A documented resource type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDefinition {
    /// Resource type name, e.g. `microsoft.graph.user`.
    pub name: String,
    /// Optional prose.
    pub description: Option<String>,
    /// Name of the key property, when documented.
    pub key_property: Option<String>,
    /// Properties in first-documented order.
    pub properties: IndexMap<String, Property>,
    /// Display names of the files that contributed to this definition.
    pub sources: Vec<String>,
}

impl ResourceDefinition {
    /// An empty definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            key_property: None,
            properties: IndexMap::new(),
            sources: Vec::new(),
        }
    }

    /// Builder-style property insertion.
    pub fn with_property(mut self, property: Property) -> Self {
        self.insert(property);
        self
    }

    /// Inserts or replaces a property.
    pub fn insert(&mut self, property: Property) {
        self.properties.insert(property.name.clone(), property);
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }
}

impl Mergeable for ResourceDefinition {
    const ENTITY: &'static str = "resource";

    fn identifier(&self) -> &str {
        &self.name
    }

    fn merge_table() -> &'static MergeTable<Self> {
        static TABLE: OnceLock<MergeTable<ResourceDefinition>> = OnceLock::new();
        TABLE.get_or_init(|| {
            MergeTable::<Self>::new()
                .field(
                    "description",
                    MergePolicy::EqualOrNull,
                    |r| FieldValue::text(r.description.as_deref()),
                    |r, v| r.description = v.into_text(),
                )
                .field(
                    "keyProperty",
                    MergePolicy::EqualOrNull,
                    |r| FieldValue::text(r.key_property.as_deref()),
                    |r, v| r.key_property = v.into_text(),
                )
                .children("properties", |r, fragments, ctx| {
                    r.properties = merge_keyed(fragments.iter().map(|f| &f.properties), ctx);
                })
                .ignore("sources", |r| r.sources.clear())
        })
    }
}

/// Read access to canonical resource definitions by name.
pub trait ResourceLookup {
    /// Finds a resource by type name.
    fn resource(&self, name: &str) -> Option<&ResourceDefinition>;
}

impl ResourceLookup for HashMap<String, ResourceDefinition> {
    fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.get(name)
    }
}

impl ResourceLookup for IndexMap<String, ResourceDefinition> {
    fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;

    fn string() -> PropertyType {
        PropertyType::Scalar(ScalarKind::String)
    }

    #[test]
    fn test_type_display_parse() {
        let ty = PropertyType::Collection(Box::new(PropertyType::Resource(
            "microsoft.graph.email".into(),
        )));
        assert_eq!(ty.to_string(), "Collection(microsoft.graph.email)");
        assert_eq!(ty.to_string().parse::<PropertyType>().unwrap(), ty);
        assert_eq!("Edm.Int32".parse::<PropertyType>().unwrap().to_string(), "Edm.Int64");
        assert_eq!(
            "#microsoft.graph.user".parse::<PropertyType>().unwrap(),
            PropertyType::Resource("microsoft.graph.user".into())
        );
    }

    #[test]
    fn test_unknown_type_yields_to_known() {
        let a = ResourceDefinition::new("user")
            .with_property(Property::new("manager", PropertyType::unknown()).nullable());
        let b = ResourceDefinition::new("user").with_property(Property::new("manager", string()));

        for order in [vec![a.clone(), b.clone()], vec![b.clone(), a.clone()]] {
            let merged = merge(&order).unwrap();
            assert!(merged.conflicts.is_empty());
            let manager = merged.value.property("manager").unwrap();
            assert_eq!(manager.ty, string());
            assert!(manager.is_nullable());
        }
    }

    #[test]
    fn test_unknown_shapes_merge_in_any_order() {
        let scalar = ResourceDefinition::new("user")
            .with_property(Property::new("tags", PropertyType::unknown()).nullable());
        let empty_list = ResourceDefinition::new("user").with_property(Property::new(
            "tags",
            PropertyType::Collection(Box::new(PropertyType::unknown())),
        ));
        let known = ResourceDefinition::new("user").with_property(Property::new(
            "tags",
            PropertyType::Collection(Box::new(string())),
        ));

        let ab = merge(&[scalar.clone(), empty_list.clone()]).unwrap();
        let ba = merge(&[empty_list.clone(), scalar.clone()]).unwrap();
        assert_eq!(ab.value, ba.value);
        let tags = ab.value.property("tags").unwrap();
        assert_eq!(tags.ty, PropertyType::Collection(Box::new(PropertyType::unknown())));
        assert!(tags.is_nullable());

        for order in [
            vec![scalar.clone(), empty_list.clone(), known.clone()],
            vec![known.clone(), scalar.clone(), empty_list.clone()],
            vec![empty_list, known, scalar],
        ] {
            let merged = merge(&order).unwrap();
            assert!(merged.conflicts.is_empty());
            assert_eq!(
                merged.value.property("tags").unwrap().ty,
                PropertyType::Collection(Box::new(string()))
            );
        }
    }

    #[test]
    fn test_property_union_and_type_conflict() {
        let a = ResourceDefinition::new("user")
            .with_property(Property::new("id", string()))
            .with_property(Property::new("age", PropertyType::Scalar(ScalarKind::Int64)));
        let b = ResourceDefinition::new("user")
            .with_property(Property::new("age", string()))
            .with_property(Property::new("mail", string()).truncatable());

        let merged = merge(&[a, b]).unwrap();
        let names: Vec<&str> = merged.value.properties.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id", "age", "mail"]);
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.conflicts[0].path, "user.age");
        assert_eq!(merged.conflicts[0].field, "type");
        assert_eq!(
            merged.value.property("age").unwrap().ty,
            PropertyType::Scalar(ScalarKind::Int64)
        );
        assert!(merged.value.property("mail").unwrap().is_truncatable());
    }

    #[test]
    fn test_sources_are_not_merged() {
        let mut a = ResourceDefinition::new("user");
        a.sources.push("a.md".into());
        let merged = merge(&[a]).unwrap();
        assert!(merged.value.sources.is_empty());
    }
}
