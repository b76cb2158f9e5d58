#![deny(missing_docs)]

//! # Header Map
//!
//! Ordered, case-insensitive header collection. Line order is kept for
//! display; equality ignores name case and the relative order of different
//! headers, but keeps the order of repeated values of one header.

use std::fmt;

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header line, keeping existing values of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(first) => {
                self.entries[first].1 = value.into();
                let mut idx = 0;
                self.entries.retain(|(n, _)| {
                    let keep = idx <= first || !n.eq_ignore_ascii_case(&name);
                    idx += 1;
                    keep
                });
            }
            None => self.entries.push((name, value.into())),
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Lines in original order, names as written.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies `f` to every value, keeping names.
    pub fn map_values(&mut self, mut f: impl FnMut(&str) -> String) {
        for (_, value) in &mut self.entries {
            *value = f(value);
        }
    }

    fn comparable(&self) -> Vec<(String, &str)> {
        let mut lines: Vec<(String, &str)> = self
            .entries
            .iter()
            .map(|(n, v)| (n.to_ascii_lowercase(), v.as_str()))
            .collect();
        // Stable sort: values of one header keep their relative order.
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        lines
    }
}

impl PartialEq for HeaderMap {
    fn eq(&self, other: &Self) -> bool {
        self.comparable() == other.comparable()
    }
}

impl Eq for HeaderMap {}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            writeln!(f, "{}: {}", canonical_name(name), value)?;
        }
        Ok(())
    }
}

/// Normalises header name case: `content-TYPE` becomes `Content-Type`.
pub fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Media type of a `Content-Type` value: lowercase, parameters dropped.
pub fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// True for `application/json` and `+json` media types.
pub fn is_json_media_type(value: &str) -> bool {
    let media = media_type(value);
    media == "application/json" || media.ends_with("+json") || media == "text/json"
}
