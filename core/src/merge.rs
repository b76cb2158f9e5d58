#![deny(missing_docs)]

//! # Merge Engine
//!
//! Reconciles several partial definitions of one logical entity into a single
//! canonical value.
//!
//! Every mergeable entity type declares a [`MergeTable`]: an ordered list of
//! field rules, each pairing a plain accessor with a [`MergePolicy`]. The table
//! is built once (behind a `OnceLock`) and the same generic [`merge`] routine
//! walks it for resources, properties, annotation fragments and records alike.
//!
//! Merging is pure. Conflicts are collected and returned to the caller; the
//! value from the first fragment is kept so the run can continue.

use crate::error::{AppError, AppResult};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// Declared rule for resolving one field across fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The field is computed elsewhere and excluded from the merged value.
    Ignore,
    /// All non-null values must agree; a null never beats a non-null.
    EqualOrNull,
    /// The greatest value wins (booleans: `true` beats `false`).
    PreferGreaterValue,
    /// A keyed child collection: children are matched by identifier and merged recursively.
    MergeByIdentifier,
}

/// A field value lifted out of an entity for policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent / unknown.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer (lengths, versions, ordinals).
    Int(i64),
    /// Text (descriptions, type names, targets).
    Text(String),
}

impl FieldValue {
    /// Lifts an optional string.
    pub fn text(value: Option<&str>) -> Self {
        value.map_or(FieldValue::Null, |s| FieldValue::Text(s.to_string()))
    }

    /// Lifts an optional flag.
    pub fn flag(value: Option<bool>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Bool)
    }

    /// Lifts an optional integer.
    pub fn int(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Int)
    }

    /// Lowers back into an optional string.
    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Lowers back into an optional flag.
    pub fn into_flag(self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Lowers back into an optional integer.
    pub fn into_int(self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(i),
            _ => None,
        }
    }

    /// True when the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Total order used by `PreferGreaterValue`. Values of different kinds
    /// never outrank each other.
    fn rank(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Less,
            (_, FieldValue::Null) => Ordering::Greater,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// How a rule reads and writes its field.
pub enum Accessor<T> {
    /// A scalar field exposed through `get`/`set`.
    Value {
        /// Reads the field.
        get: fn(&T) -> FieldValue,
        /// Writes the resolved value back.
        set: fn(&mut T, FieldValue),
    },
    /// A derived field cleared in the merged output.
    Reset(fn(&mut T)),
    /// A keyed child collection merged by [`merge_keyed`].
    Children(fn(&mut T, &[&T], &mut MergeContext)),
}

/// A single row of a merge table.
pub struct FieldRule<T> {
    /// Field name used in conflict reports.
    pub name: &'static str,
    /// Declared policy.
    pub policy: MergePolicy,
    /// Accessor used to apply the policy.
    pub accessor: Accessor<T>,
}

/// Per-entity table mapping field accessors to merge policies.
pub struct MergeTable<T> {
    rules: Vec<FieldRule<T>>,
}

impl<T> Default for MergeTable<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> MergeTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scalar field governed by `policy`.
    pub fn field(
        mut self,
        name: &'static str,
        policy: MergePolicy,
        get: fn(&T) -> FieldValue,
        set: fn(&mut T, FieldValue),
    ) -> Self {
        self.rules.push(FieldRule {
            name,
            policy,
            accessor: Accessor::Value { get, set },
        });
        self
    }

    /// Adds an ignored (derived) field.
    pub fn ignore(mut self, name: &'static str, reset: fn(&mut T)) -> Self {
        self.rules.push(FieldRule {
            name,
            policy: MergePolicy::Ignore,
            accessor: Accessor::Reset(reset),
        });
        self
    }

    /// Adds a keyed child collection.
    pub fn children(
        mut self,
        name: &'static str,
        merge: fn(&mut T, &[&T], &mut MergeContext),
    ) -> Self {
        self.rules.push(FieldRule {
            name,
            policy: MergePolicy::MergeByIdentifier,
            accessor: Accessor::Children(merge),
        });
        self
    }

    /// The rules in declaration order.
    pub fn rules(&self) -> &[FieldRule<T>] {
        &self.rules
    }

    /// Looks up the policy declared for a field.
    pub fn policy_of(&self, name: &str) -> Option<MergePolicy> {
        self.rules.iter().find(|r| r.name == name).map(|r| r.policy)
    }
}

/// An entity the merge engine can fold.
pub trait Mergeable: Clone + Sized + 'static {
    /// Entity kind used in conflict reports (e.g. `resource`).
    const ENTITY: &'static str;

    /// Identifier shared by all fragments of one logical entity.
    fn identifier(&self) -> &str;

    /// Ordering key applied to merged child collections. `None` keeps
    /// first-seen order.
    fn sort_key(&self) -> Option<(i64, String)> {
        None
    }

    /// The field table for this entity type.
    fn merge_table() -> &'static MergeTable<Self>;
}

/// Two or more fragments disagreeing on an `EqualOrNull` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    /// Entity kind of the innermost entity holding the field.
    pub entity: &'static str,
    /// Dotted path of identifiers from the merged root to that entity.
    pub path: String,
    /// Field name.
    pub field: &'static str,
    /// Distinct non-null values in fragment order. The first one was kept.
    pub values: Vec<String>,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' has conflicting values for '{}': {} (keeping {})",
            self.entity,
            self.path,
            self.field,
            self.values.join(" vs "),
            self.values.first().map(String::as_str).unwrap_or("null")
        )
    }
}

/// Bookkeeping threaded through a recursive merge.
#[derive(Debug, Default)]
pub struct MergeContext {
    path: Vec<String>,
    conflicts: Vec<MergeConflict>,
}

impl MergeContext {
    fn enter(&mut self, identifier: &str) {
        self.path.push(identifier.to_string());
    }

    fn leave(&mut self) {
        self.path.pop();
    }

    fn conflict(&mut self, entity: &'static str, field: &'static str, values: Vec<String>) {
        let conflict = MergeConflict {
            entity,
            path: self.path.join("."),
            field,
            values,
        };
        debug!(%conflict, "merge conflict");
        self.conflicts.push(conflict);
    }
}

/// Result of a merge: the canonical value plus every conflict met on the way.
#[derive(Debug, Clone)]
pub struct Merged<T> {
    /// The merged entity.
    pub value: T,
    /// Conflicts, in discovery order.
    pub conflicts: Vec<MergeConflict>,
}

/// Merges fragments sharing one identifier.
///
/// Fails when `entities` is empty or the identifiers differ. Field conflicts
/// do not fail; they are returned in [`Merged::conflicts`].
pub fn merge<T: Mergeable>(entities: &[T]) -> AppResult<Merged<T>> {
    let Some(first) = entities.first() else {
        return Err(AppError::General(format!(
            "cannot merge an empty set of {} fragments",
            T::ENTITY
        )));
    };
    if let Some(other) = entities
        .iter()
        .find(|e| e.identifier() != first.identifier())
    {
        return Err(AppError::General(format!(
            "cannot merge {} '{}' with '{}': identifiers differ",
            T::ENTITY,
            first.identifier(),
            other.identifier()
        )));
    }

    let refs: Vec<&T> = entities.iter().collect();
    let mut ctx = MergeContext::default();
    let value = merge_group(&refs, &mut ctx);
    Ok(Merged {
        value,
        conflicts: ctx.conflicts,
    })
}

/// Like [`merge`], but any conflict is an error.
pub fn merge_strict<T: Mergeable>(entities: &[T]) -> AppResult<T> {
    let merged = merge(entities)?;
    if merged.conflicts.is_empty() {
        return Ok(merged.value);
    }
    let detail = merged
        .conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::MergeConflict(detail))
}

/// Merges keyed child collections: union by key, first-seen order, children
/// sharing a key merged recursively, then a stable sort by
/// [`Mergeable::sort_key`].
pub fn merge_keyed<'a, C, I>(maps: I, ctx: &mut MergeContext) -> IndexMap<String, C>
where
    C: Mergeable,
    I: IntoIterator<Item = &'a IndexMap<String, C>>,
{
    let mut groups: IndexMap<&'a str, Vec<&'a C>> = IndexMap::new();
    for map in maps {
        for (key, child) in map {
            groups.entry(key.as_str()).or_default().push(child);
        }
    }

    let mut out: IndexMap<String, C> = groups
        .into_iter()
        .map(|(key, group)| (key.to_string(), merge_group(&group, ctx)))
        .collect();
    out.sort_by(|_, a, _, b| a.sort_key().cmp(&b.sort_key()));
    out
}

fn merge_group<T: Mergeable>(entities: &[&T], ctx: &mut MergeContext) -> T {
    // Callers guarantee a non-empty group.
    let mut out = entities[0].clone();
    ctx.enter(out.identifier());

    for rule in T::merge_table().rules() {
        match (&rule.accessor, rule.policy) {
            (Accessor::Reset(reset), _) => reset(&mut out),
            (Accessor::Children(merge_children), _) => merge_children(&mut out, entities, ctx),
            (Accessor::Value { set, .. }, MergePolicy::Ignore) => set(&mut out, FieldValue::Null),
            (Accessor::Value { get, set }, MergePolicy::PreferGreaterValue) => {
                let best = entities
                    .iter()
                    .map(|e| get(e))
                    .fold(FieldValue::Null, |best, v| {
                        if v.rank(&best) == Ordering::Greater {
                            v
                        } else {
                            best
                        }
                    });
                set(&mut out, best);
            }
            (Accessor::Value { get, set }, _) => {
                let resolved = resolve_equal_or_null(T::ENTITY, rule.name, entities, *get, ctx);
                set(&mut out, resolved);
            }
        }
    }

    ctx.leave();
    out
}

fn resolve_equal_or_null<T>(
    entity: &'static str,
    field: &'static str,
    entities: &[&T],
    get: fn(&T) -> FieldValue,
    ctx: &mut MergeContext,
) -> FieldValue {
    let mut distinct: Vec<FieldValue> = Vec::new();
    for value in entities.iter().map(|e| get(e)) {
        if !value.is_null() && !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    if distinct.len() > 1 {
        ctx.conflict(
            entity,
            field,
            distinct.iter().map(ToString::to_string).collect(),
        );
    }
    distinct.into_iter().next().unwrap_or(FieldValue::Null)
}
