//! Ordered query-parameter mapping.
//!
//! Gateways deliver query parameters either as `name -> value` or as
//! `name -> [values]`. [`QueryMapping`] holds both shapes in one ordered
//! map so the order in which keys arrive is the order in which they are
//! written back into the normalized URL.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single query value or a sequence of values for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// One value.
    Single(String),
    /// Several values, kept in order.
    Multi(Vec<String>),
}

impl QueryValue {
    /// Get the single value, if this is not a sequence.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            QueryValue::Single(v) => Some(v),
            QueryValue::Multi(_) => None,
        }
    }

    /// Get all values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Check if this is a sequence.
    pub fn is_multi(&self) -> bool {
        matches!(self, QueryValue::Multi(_))
    }

    /// Split a single value on `,` when the comma is not the first character.
    ///
    /// HTTP-API (v2) gateways fold repeated parameters into one
    /// comma-separated value. The split cannot tell a literal comma from a
    /// delimiter, so `"a,b"` always becomes `["a", "b"]`.
    pub fn split_commas(self) -> Self {
        match self {
            QueryValue::Single(v) if v.find(',').is_some_and(|idx| idx > 0) => {
                QueryValue::Multi(v.split(',').map(String::from).collect())
            }
            other => other,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multi(values)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        QueryValue::Multi(values.into_iter().map(String::from).collect())
    }
}

impl<'de> Deserialize<'de> for QueryValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct V;

        impl<'de> Visitor<'de> for V {
            type Value = QueryValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string, a number or a sequence of strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(QueryValue::Single(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(QueryValue::Single(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(QueryValue::Single(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(QueryValue::Single(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(QueryValue::Single(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(QueryValue::Single(v.to_string()))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element::<QueryValue>()? {
                    values.extend(item.values().into_iter().map(String::from));
                }
                Ok(QueryValue::Multi(values))
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Insertion-ordered mapping of query keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMapping {
    entries: Vec<(String, QueryValue)>,
}

impl QueryMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut QueryValue> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Check if a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a value, replacing an existing key in place.
    ///
    /// Returns the previous value if the key was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Option<QueryValue> {
        let key = key.into();
        let value = value.into();

        for (k, v) in &mut self.entries {
            if *k == key {
                return Some(std::mem::replace(v, value));
            }
        }

        self.entries.push((key, value));
        None
    }

    /// Remove a key.
    pub fn remove(&mut self, key: &str) -> Option<QueryValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Shallow-merge `other` over `self`; keys of `other` win.
    pub fn merge(&mut self, other: QueryMapping) {
        for (k, v) in other.entries {
            self.insert(k, v);
        }
    }

    /// Apply a value transformation to every entry.
    pub fn map_values(self, mut f: impl FnMut(QueryValue) -> QueryValue) -> Self {
        Self {
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl<K, V> FromIterator<(K, V)> for QueryMapping
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = QueryMapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

impl IntoIterator for QueryMapping {
    type Item = (String, QueryValue);
    type IntoIter = std::vec::IntoIter<(String, QueryValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for QueryMapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// Keeps document order and skips `null` values.
impl<'de> Deserialize<'de> for QueryMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct V;

        impl<'de> Visitor<'de> for V {
            type Value = QueryMapping;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of query parameters")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut mapping = QueryMapping::new();
                while let Some((key, value)) = access.next_entry::<String, Option<QueryValue>>()? {
                    if let Some(value) = value {
                        mapping.insert(key, value);
                    }
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(V)
    }
}

/// Parse an `application/x-www-form-urlencoded` query string.
///
/// Repeated keys collapse into a sequence in order of appearance.
pub fn parse_query_string(input: &str) -> QueryMapping {
    let input = input.strip_prefix('?').unwrap_or(input);
    let mut mapping = QueryMapping::new();

    for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
        let value = value.into_owned();
        match mapping.get_mut(&key) {
            None => {
                mapping.insert(key.into_owned(), value);
            }
            Some(QueryValue::Multi(values)) => values.push(value),
            Some(existing) => {
                let first = existing.values().concat();
                *existing = QueryValue::Multi(vec![first, value]);
            }
        }
    }

    mapping
}
