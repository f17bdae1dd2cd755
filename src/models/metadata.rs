//! Ordered, multi-valued metadata attached to a document.
//!
//! Keys are unique and keep their first-insertion order. A key holds one or
//! more values; `add` appends to an existing key instead of creating a
//! duplicate entry, so repeated writes compose into a multi-valued field.

use serde::{Deserialize, Serialize};

/// A single metadata entry: one key with its values in write order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub values: Vec<String>,
}

/// Ordered mapping from string keys to one-or-more string values.
///
/// Serialized as a list of entries. Deserializing merges entries that repeat
/// a key and drops entries without values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<MetadataEntry>", into = "Vec<MetadataEntry>")]
pub struct Metadata {
    entries: Vec<MetadataEntry>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    /// All values for `key`, in write order.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.position(key)
            .map(|i| self.entries[i].values.as_slice())
    }

    /// First value for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Replace every value of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.entries[i].values = vec![value],
            None => self.entries.push(MetadataEntry {
                key,
                values: vec![value],
            }),
        }
    }

    /// Append `value` to `key`, creating the key if needed.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.entries[i].values.push(value),
            None => self.entries.push(MetadataEntry {
                key,
                values: vec![value],
            }),
        }
    }

    /// Remove `key`, returning its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.position(key).map(|i| self.entries.remove(i).values)
    }

    /// Iterate over `(key, values)` in key order of first insertion.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.values.as_slice()))
    }

    /// Iterate over flattened `(key, value)` pairs; multi-valued keys repeat.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|e| {
            e.values
                .iter()
                .map(move |v| (e.key.as_str(), v.as_str()))
        })
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<MetadataEntry>> for Metadata {
    fn from(entries: Vec<MetadataEntry>) -> Self {
        let mut metadata = Metadata::new();
        for entry in entries {
            for value in entry.values {
                metadata.add(entry.key.as_str(), value);
            }
        }
        metadata
    }
}

impl From<Metadata> for Vec<MetadataEntry> {
    fn from(metadata: Metadata) -> Self {
        metadata.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.add(key, value);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_composes_values() {
        let mut meta = Metadata::new();
        meta.add("lang", "en");
        meta.add("lang", "fr");
        meta.add("source", "crawl");

        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get("lang").unwrap(), &["en", "fr"]);
        assert_eq!(meta.first("lang"), Some("en"));
    }

    #[test]
    fn test_set_replaces_values() {
        let mut meta = Metadata::new();
        meta.add("lang", "en");
        meta.add("lang", "fr");
        meta.set("lang", "de");

        assert_eq!(meta.get("lang").unwrap(), &["de"]);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let meta: Metadata = vec![("b", "1"), ("a", "2"), ("b", "3")]
            .into_iter()
            .collect();

        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);

        let pairs: Vec<(&str, &str)> = meta.pairs().collect();
        assert_eq!(pairs, vec![("b", "1"), ("b", "3"), ("a", "2")]);
    }

    #[test]
    fn test_duplicate_keys_merge_on_deserialize() {
        let meta: Metadata = serde_json::from_str(
            r#"[{"key":"lang","values":["fr"]},
                {"key":"src","values":[]},
                {"key":"lang","values":["en"]}]"#,
        )
        .unwrap();

        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("lang").unwrap(), &["fr", "en"]);
        assert!(!meta.contains_key("src"));
        assert_eq!(
            serde_json::to_string(&meta).unwrap(),
            r#"[{"key":"lang","values":["fr","en"]}]"#
        );
    }

    #[test]
    fn test_remove() {
        let mut meta = Metadata::new();
        meta.set("lang", "en");
        assert_eq!(meta.remove("lang"), Some(vec!["en".to_string()]));
        assert!(meta.is_empty());
        assert!(meta.remove("lang").is_none());
    }
}
