//! Deterministic string interning for annotation type and feature names.
//!
//! The lexicon is derived from configuration alone, never from documents, so
//! a writer and an independent reader that load the same configuration agree
//! on every id without exchanging a dictionary.

use std::collections::{BTreeSet, HashMap};

use sha2::{Digest, Sha256};

/// Sorted, deduplicated names with stable ordinal ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexicon {
    entries: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Lexicon {
    /// Build from any collection of names. Duplicates collapse; order is lexicographic.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let entries: Vec<String> = sorted.into_iter().collect();
        let ids = entries
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u32))
            .collect();
        Self { entries, ids }
    }

    /// Ordinal of `name`.
    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Name at ordinal `id`.
    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    /// SHA-256 over the entries, each prefixed by its u32 big-endian byte
    /// length, as hex.
    ///
    /// Record files carry this so a reader can tell it derived a different
    /// lexicon than the writer.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update((entry.len() as u32).to_be_bytes());
            hasher.update(entry.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
