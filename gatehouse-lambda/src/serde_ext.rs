//! Lenient deserializers for gateway event fields.
//!
//! Gateways are loose about empty collections: a missing query may arrive
//! as `null`, as `""`, or as an object with `null` values. These helpers
//! map all of those to `None` or skip the `null` entries.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

use gatehouse_core::QueryMapping;

/// A string, number or boolean, as a string.
struct Scalar(String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct V;

        impl<'de> Visitor<'de> for V {
            type Value = Scalar;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(Scalar(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Scalar(v.to_string()))
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Deserialize an optional map, treating `null` and strings as absent.
fn optional_map<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct V<T>(std::marker::PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for V<T> {
        type Value = Option<T>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map, null or an empty string")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2>(self, deserializer: D2) -> Result<Self::Value, D2::Error>
        where
            D2: Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_str<E: de::Error>(self, _v: &str) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            T::deserialize(de::value::MapAccessDeserializer::new(map)).map(Some)
        }
    }

    deserializer.deserialize_any(V(std::marker::PhantomData))
}

/// `queryStringParameters` / `multiValueQueryStringParameters`.
pub fn query<'de, D>(deserializer: D) -> Result<Option<QueryMapping>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_map(deserializer)
}

/// `headers`: string values, `null` entries dropped.
pub fn string_map<'de, D>(deserializer: D) -> Result<Option<HashMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, Option<Scalar>>> = optional_map(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .filter_map(|(k, v)| v.map(|Scalar(v)| (k, v)))
            .collect()
    }))
}

/// `multiValueHeaders`: list values, `null` entries dropped.
pub fn multi_string_map<'de, D>(
    deserializer: D,
) -> Result<Option<HashMap<String, Vec<String>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, Option<Vec<Scalar>>>> = optional_map(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .filter_map(|(k, v)| v.map(|vs| (k, vs.into_iter().map(|Scalar(v)| v).collect())))
            .collect()
    }))
}
