//! Positional text annotations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A typed, feature-bearing span over a document's extracted text.
///
/// Offsets are byte offsets into the owning document's `text`. Annotations
/// on a document are neither sorted nor guaranteed non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub annotation_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, String>,
}

impl Annotation {
    pub fn new(annotation_type: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            annotation_type: annotation_type.into(),
            features: BTreeMap::new(),
        }
    }

    /// Builder-style feature setter.
    pub fn with_feature(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.features.insert(name.into(), value.into());
        self
    }

    pub fn feature(&self, name: &str) -> Option<&str> {
        self.features.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
