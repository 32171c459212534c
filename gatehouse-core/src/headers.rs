//! Case-insensitive header storage that remembers original names.
//!
//! Lookups fold the name to lowercase, while each entry keeps the name it
//! was first set with. Gateway replies use the lowercase keys; applications
//! can still enumerate the original spelling.

use std::collections::HashMap;
use std::fmt;

/// A header value: one string or an ordered list (e.g. repeated `Set-Cookie`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// One value.
    Single(String),
    /// Several values, kept in order.
    Multi(Vec<String>),
}

impl HeaderValue {
    /// Get all values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(v) => vec![v.as_str()],
            HeaderValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            HeaderValue::Single(_) => 1,
            HeaderValue::Multi(vs) => vs.len(),
        }
    }

    /// Check if this holds no value at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if any value contains `needle` (case-insensitive).
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.values()
            .iter()
            .any(|v| v.to_ascii_lowercase().contains(&needle))
    }

    /// Join all values the way they appear on the wire.
    pub fn joined(&self) -> String {
        self.values().join(", ")
    }

    /// Append `value`, turning a single value into a list.
    pub fn push(&mut self, value: impl Into<String>) {
        let value = value.into();
        match self {
            HeaderValue::Single(first) => {
                *self = HeaderValue::Multi(vec![std::mem::take(first), value]);
            }
            HeaderValue::Multi(vs) => vs.push(value),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Single(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Single(value)
    }
}

impl From<&String> for HeaderValue {
    fn from(value: &String) -> Self {
        HeaderValue::Single(value.clone())
    }
}

impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        HeaderValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        HeaderValue::Multi(values)
    }
}

impl From<Vec<&str>> for HeaderValue {
    fn from(values: Vec<&str>) -> Self {
        HeaderValue::Multi(values.into_iter().map(String::from).collect())
    }
}

/// A stored header: the name as it was set, plus its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    /// Header name in its original case.
    pub name: String,
    /// Header value.
    pub value: HeaderValue,
}

/// Ordered header store keyed by lowercase name.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderStore {
    inner: Vec<(String, HeaderEntry)>,
}

impl HeaderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.inner
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Get a header value (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.position(name).map(|pos| &self.inner[pos].1.value)
    }

    /// Get the full entry, including the original name.
    pub fn entry(&self, name: &str) -> Option<&HeaderEntry> {
        self.position(name).map(|pos| &self.inner[pos].1)
    }

    /// Check if a header is present (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set a header, replacing any existing value for the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        let name = name.into();
        let entry = HeaderEntry {
            name: name.clone(),
            value: value.into(),
        };

        match self.position(&name) {
            Some(pos) => self.inner[pos].1 = entry,
            None => self.inner.push((name.to_ascii_lowercase(), entry)),
        }
    }

    /// Append a value, keeping whatever is already set under the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(pos) => {
                let existing = &mut self.inner[pos].1.value;
                for v in value.values() {
                    existing.push(v);
                }
            }
            None => self.set(name, value),
        }
    }

    /// Remove a header (case-insensitive).
    pub fn remove(&mut self, name: &str) -> Option<HeaderEntry> {
        let pos = self.position(name)?;
        Some(self.inner.remove(pos).1)
    }

    /// Iterate over `(lowercase name, entry)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderEntry)> {
        self.inner.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Iterate over original-case names.
    pub fn original_names(&self) -> impl Iterator<Item = &str> {
        self.inner.iter().map(|(_, entry)| entry.name.as_str())
    }

    /// Snapshot as a lowercase-keyed map.
    pub fn to_map(&self) -> HashMap<String, HeaderValue> {
        self.inner
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }
}

impl fmt::Debug for HeaderStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.iter().map(|(_, e)| (&e.name, &e.value)))
            .finish()
    }
}
