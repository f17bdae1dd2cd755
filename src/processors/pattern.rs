//! Regex-driven annotator.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::models::{Annotation, Document};
use crate::pipeline::{DocumentProcessor, ProcessorError, Reporter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Annotation type given to every match.
    #[serde(rename = "type")]
    pub annotation_type: String,
    pub pattern: String,
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Annotates every match of a pattern in the document text.
/// Named capture groups that participate in a match become features.
pub struct RegexAnnotator {
    name: String,
    annotation_type: String,
    regex: Regex,
    counter: String,
}

impl RegexAnnotator {
    pub fn new(name: String, config: &RegexConfig) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(&config.pattern)
            .case_insensitive(config.case_insensitive)
            .build()
            .map_err(|e| ConfigError::Processor {
                name: name.clone(),
                message: e.to_string(),
            })?;

        if config.annotation_type.trim().is_empty() {
            return Err(ConfigError::Processor {
                name,
                message: "annotation type must not be empty".to_string(),
            });
        }

        Ok(Self {
            counter: format!("{}.matches", name),
            name,
            annotation_type: config.annotation_type.trim().to_string(),
            regex,
        })
    }
}

impl DocumentProcessor for RegexAnnotator {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &mut self,
        mut doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Vec<Document>, ProcessorError> {
        let Some(ref text) = doc.text else {
            return Ok(vec![doc]);
        };

        let mut found = Vec::new();
        for caps in self.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let mut annotation = Annotation::new(&self.annotation_type, whole.start(), whole.end());
            for group in self.regex.capture_names().flatten() {
                if let Some(m) = caps.name(group) {
                    annotation = annotation.with_feature(group, m.as_str());
                }
            }
            found.push(annotation);
        }

        reporter.incr(&self.counter, found.len() as u64);
        doc.annotations.extend(found);
        Ok(vec![doc])
    }
}
