//! Query-string and URL-form accumulation.

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::flatten::FlattenTarget;

/// Key/value pairs destined for a query string or a URL-encoded form body.
///
/// Values are grouped per key. Encoding sorts keys alphabetically and keeps
/// insertion order among values of the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPairs {
    pairs: BTreeMap<String, Vec<String>>,
}

impl QueryPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an already-encoded query string.
    pub fn parse(query: &str) -> Self {
        let mut out = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            out.add(key.into_owned(), value.into_owned());
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.pairs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.pairs {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

impl FlattenTarget for QueryPairs {
    fn add(&mut self, key: String, value: String) {
        self.pairs.entry(key).or_default().push(value);
    }
}
