//! Header normalization.
//!
//! Headers arrive either as an ordered list of name/value pairs or as a
//! mapping of name to value. Both are materialized into a `Vec<HeaderPair>`
//! exactly once, when a response is constructed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A single response header.
///
/// Names are not validated and duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderPair {
    /// Header name, as given.
    pub name: String,
    /// Header value, as given.
    pub value: String,
}

impl HeaderPair {
    /// Create a header pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Header input accepted by response constructors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HeaderInput {
    /// No headers given.
    #[default]
    Absent,
    /// An already-normalized sequence of pairs, passed through unchanged.
    Pairs(Vec<HeaderPair>),
    /// A name to value mapping, in its iteration order.
    Map(Vec<(String, String)>),
}

impl HeaderInput {
    /// Convert the input into an ordered sequence of pairs.
    #[must_use]
    pub fn normalize(self) -> Vec<HeaderPair> {
        match self {
            Self::Absent => Vec::new(),
            Self::Pairs(pairs) => pairs,
            Self::Map(entries) => entries
                .into_iter()
                .map(|(name, value)| HeaderPair { name, value })
                .collect(),
        }
    }
}

impl From<()> for HeaderInput {
    fn from((): ()) -> Self {
        Self::Absent
    }
}

impl<T: Into<HeaderInput>> From<Option<T>> for HeaderInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

impl From<Vec<HeaderPair>> for HeaderInput {
    fn from(pairs: Vec<HeaderPair>) -> Self {
        Self::Pairs(pairs)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for HeaderInput {
    fn from(entries: Vec<(K, V)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for HeaderInput {
    fn from(entries: [(K, V); N]) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for HeaderInput {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::Map(map.into_iter().collect())
    }
}

impl<S: std::hash::BuildHasher> From<HashMap<String, String, S>> for HeaderInput {
    fn from(map: HashMap<String, String, S>) -> Self {
        Self::Map(map.into_iter().collect())
    }
}

impl From<&http::HeaderMap> for HeaderInput {
    /// Values that are not visible ASCII are converted lossily.
    fn from(map: &http::HeaderMap) -> Self {
        Self::Map(
            map.iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_owned(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for HeaderInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(HeaderInputVisitor)
    }
}

struct HeaderInputVisitor;

impl<'de> Visitor<'de> for HeaderInputVisitor {
    type Value = HeaderInput;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array of {name, value} pairs, an object of header values, or null")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(HeaderInput::Absent)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(HeaderInput::Absent)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut pairs = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(pair) = seq.next_element::<HeaderPair>()? {
            pairs.push(pair);
        }
        Ok(HeaderInput::Pairs(pairs))
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, value)) = map.next_entry::<String, String>()? {
            entries.push((name, value));
        }
        Ok(HeaderInput::Map(entries))
    }
}
