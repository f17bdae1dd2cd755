//! Constant metadata tagging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Document;
use crate::pipeline::{DocumentProcessor, ProcessorError, Reporter};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Values that replace whatever the key held.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, String>,
    /// Values appended to the key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, String>,
    /// Keys removed from the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

pub struct MetadataProcessor {
    name: String,
    config: MetadataConfig,
}

impl MetadataProcessor {
    pub fn new(name: String, config: MetadataConfig) -> Self {
        Self { name, config }
    }
}

impl DocumentProcessor for MetadataProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &mut self,
        mut doc: Document,
        _reporter: &dyn Reporter,
    ) -> Result<Vec<Document>, ProcessorError> {
        for key in &self.config.remove {
            doc.metadata.remove(key);
        }
        for (key, value) in &self.config.set {
            doc.metadata.set(key.as_str(), value.as_str());
        }
        for (key, value) in &self.config.add {
            doc.metadata.add(key.as_str(), value.as_str());
        }
        Ok(vec![doc])
    }
}
