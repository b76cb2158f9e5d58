#![deny(missing_docs)]

//! # Metadata Annotations
//!
//! Vocabulary annotation fragments (`Org.OData.Capabilities.V1.*` style terms)
//! documented next to resources. Fragments sharing a term are merged.

use crate::error::AppResult;
use crate::merge::{merge_keyed, FieldValue, MergePolicy, MergeTable, Mergeable};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One property/value entry of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationRecord {
    /// Record identifier (the annotated property).
    pub property: String,
    /// Value assigned by the record.
    pub value: Option<String>,
    /// Declared position, used to order merged records.
    pub order: Option<i64>,
}

impl Mergeable for AnnotationRecord {
    const ENTITY: &'static str = "record";

    fn identifier(&self) -> &str {
        &self.property
    }

    fn sort_key(&self) -> Option<(i64, String)> {
        Some((self.order.unwrap_or(i64::MAX), self.property.clone()))
    }

    fn merge_table() -> &'static MergeTable<Self> {
        static TABLE: OnceLock<MergeTable<AnnotationRecord>> = OnceLock::new();
        TABLE.get_or_init(|| {
            MergeTable::<Self>::new()
                .field(
                    "value",
                    MergePolicy::EqualOrNull,
                    |r| FieldValue::text(r.value.as_deref()),
                    |r, v| r.value = v.into_text(),
                )
                .field(
                    "order",
                    MergePolicy::PreferGreaterValue,
                    |r| FieldValue::int(r.order),
                    |r, v| r.order = v.into_int(),
                )
        })
    }
}

/// An annotation keyed by its term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// Term identifier.
    pub term: String,
    /// Annotated target (entity set, type, property path).
    pub target: Option<String>,
    /// Optional prose.
    pub description: Option<String>,
    /// Whether the capability is mandatory.
    pub required: Option<bool>,
    /// Earliest service version the annotation applies to.
    pub min_version: Option<i64>,
    /// Records keyed by property, in merged order.
    pub records: IndexMap<String, AnnotationRecord>,
    /// Display names of the contributing files.
    pub sources: Vec<String>,
}

impl Mergeable for Annotation {
    const ENTITY: &'static str = "annotation";

    fn identifier(&self) -> &str {
        &self.term
    }

    fn merge_table() -> &'static MergeTable<Self> {
        static TABLE: OnceLock<MergeTable<Annotation>> = OnceLock::new();
        TABLE.get_or_init(|| {
            MergeTable::<Self>::new()
                .field(
                    "target",
                    MergePolicy::EqualOrNull,
                    |a| FieldValue::text(a.target.as_deref()),
                    |a, v| a.target = v.into_text(),
                )
                .field(
                    "description",
                    MergePolicy::EqualOrNull,
                    |a| FieldValue::text(a.description.as_deref()),
                    |a, v| a.description = v.into_text(),
                )
                .field(
                    "required",
                    MergePolicy::PreferGreaterValue,
                    |a| FieldValue::flag(a.required),
                    |a, v| a.required = v.into_flag(),
                )
                .field(
                    "minVersion",
                    MergePolicy::PreferGreaterValue,
                    |a| FieldValue::int(a.min_version),
                    |a, v| a.min_version = v.into_int(),
                )
                .children("records", |a, fragments, ctx| {
                    a.records = merge_keyed(fragments.iter().map(|f| &f.records), ctx);
                })
                .ignore("sources", |a| a.sources.clear())
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationFragment {
    term: String,
    target: Option<String>,
    description: Option<String>,
    required: Option<bool>,
    min_version: Option<i64>,
    #[serde(default)]
    records: Vec<RecordFragment>,
}

#[derive(Deserialize)]
struct RecordFragment {
    property: String,
    value: Option<serde_json::Value>,
    order: Option<i64>,
}

/// Parses an annotation fragment from a documented JSON block.
///
/// Record values may be any JSON scalar; they are kept as text. Duplicate
/// record properties within one fragment keep the last occurrence.
pub fn parse_annotation(json: &str) -> AppResult<Annotation> {
    let fragment: AnnotationFragment = serde_json::from_str(json)?;
    let records = fragment
        .records
        .into_iter()
        .map(|r| {
            let value = r.value.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
            (
                r.property.clone(),
                AnnotationRecord {
                    property: r.property,
                    value,
                    order: r.order,
                },
            )
        })
        .collect();

    Ok(Annotation {
        term: fragment.term,
        target: fragment.target,
        description: fragment.description,
        required: fragment.required,
        min_version: fragment.min_version,
        records,
        sources: Vec::new(),
    })
}
