//! Splits one document into several, one per text segment.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::models::Document;
use crate::pipeline::{DocumentProcessor, ProcessorError, Reporter};

/// Blank-line paragraph boundary.
const DEFAULT_DELIMITER: &str = r"\n\s*\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Regex separating segments (default: blank lines).
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Segments shorter than this (after trimming) are discarded.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

fn default_min_length() -> usize {
    1
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            name: None,
            delimiter: None,
            min_length: default_min_length(),
        }
    }
}

/// Emits one document per segment, at `<url>#part-<n>`.
///
/// Segments keep the parent's metadata plus `split.parent` and `split.index`.
/// Annotations lying wholly inside a segment move with it, offsets shifted;
/// annotations crossing a boundary are dropped. Raw content is not copied.
pub struct SplitProcessor {
    name: String,
    delimiter: Regex,
    min_length: usize,
}

impl SplitProcessor {
    pub fn new(name: String, config: &SplitConfig) -> Result<Self, ConfigError> {
        let pattern = config.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER);
        let delimiter = Regex::new(pattern).map_err(|e| ConfigError::Processor {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            delimiter,
            min_length: config.min_length,
        })
    }

    /// Byte ranges of the kept segments, trimmed of surrounding whitespace.
    fn segments(&self, text: &str) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        let bounds = self
            .delimiter
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .chain(std::iter::once((text.len(), text.len())));
        for (end, next) in bounds {
            let piece = &text[start..end];
            let lead = piece.len() - piece.trim_start().len();
            let trimmed = piece.trim();
            if trimmed.chars().count() >= self.min_length.max(1) {
                ranges.push((start + lead, start + lead + trimmed.len()));
            }
            start = next;
        }
        ranges
    }
}

impl DocumentProcessor for SplitProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &mut self,
        doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Vec<Document>, ProcessorError> {
        let Some(ref text) = doc.text else {
            return Ok(vec![doc]);
        };

        let segments = self.segments(text);
        if segments.len() <= 1 {
            return Ok(vec![doc]);
        }

        let parts = segments
            .iter()
            .enumerate()
            .map(|(index, &(start, end))| {
                let mut part = Document::new(format!("{}#part-{}", doc.url, index));
                part.text = Some(text[start..end].to_string());
                part.content_type = Some("text/plain".to_string());
                part.metadata = doc.metadata.clone();
                part.metadata.set("split.parent", doc.url.as_str());
                part.metadata.set("split.index", index.to_string());
                part.annotations = doc
                    .annotations
                    .iter()
                    .filter(|a| a.start >= start && a.end <= end)
                    .map(|a| {
                        let mut a = a.clone();
                        a.start -= start;
                        a.end -= start;
                        a
                    })
                    .collect();
                part
            })
            .collect::<Vec<_>>();

        reporter.incr("split.parts", parts.len() as u64);
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Annotation;
    use crate::pipeline::CounterReporter;

    fn splitter(config: SplitConfig) -> SplitProcessor {
        SplitProcessor::new("split".to_string(), &config).unwrap()
    }

    #[test]
    fn test_splits_paragraphs() {
        let mut doc = Document::new("u").with_text("First para.\n\n  Second Bob.\n \n\nThird.");
        doc.metadata.add("lang", "en");
        doc.annotate(Annotation::new("Person", 22, 25));
        doc.annotate(Annotation::new("Span", 0, 20));

        let reporter = CounterReporter::new();
        let out = splitter(SplitConfig::default()).process(doc, &reporter).unwrap();

        let texts: Vec<&str> = out.iter().map(|d| d.text_or_empty()).collect();
        assert_eq!(texts, vec!["First para.", "Second Bob.", "Third."]);
        assert_eq!(out[1].url, "u#part-1");
        assert_eq!(out[1].metadata.first("split.parent"), Some("u"));
        assert_eq!(out[1].metadata.first("lang"), Some("en"));

        assert_eq!(out[1].annotations.len(), 1);
        assert_eq!(out[1].covered_text(&out[1].annotations[0]).unwrap(), "Bob");
        assert!(out[0].annotations.is_empty());
        assert_eq!(reporter.get("split.parts"), 3);
    }

    #[test]
    fn test_single_segment_passes_through() {
        let doc = Document::new("u").with_text("just one paragraph");
        let out = splitter(SplitConfig::default())
            .process(doc.clone(), &CounterReporter::new())
            .unwrap();
        assert_eq!(out, vec![doc]);
    }

    #[test]
    fn test_custom_delimiter_and_min_length() {
        let doc = Document::new("u").with_text("alpha;b;gamma");
        let out = splitter(SplitConfig {
            delimiter: Some(";".to_string()),
            min_length: 2,
            ..Default::default()
        })
        .process(doc, &CounterReporter::new())
        .unwrap();
        let texts: Vec<&str> = out.iter().map(|d| d.text_or_empty()).collect();
        assert_eq!(texts, vec!["alpha", "gamma"]);
        assert_eq!(out[1].url, "u#part-1");
    }
}
