//! The document record that flows through every pipeline stage.
//!
//! A document is created by an ingestion adapter with raw bytes, a url and
//! a content type. Processors fill in `text`, append annotations and write
//! metadata; filters only read it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::annotation::Annotation;
use super::metadata::Metadata;

/// Errors raised when a document's contents violate the record contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("annotation offsets [{start}, {end}) out of range for text of length {len}")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("annotation offsets [{start}, {end}) do not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
}

/// A self-contained document record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier of the document, usually the url it was fetched from.
    pub url: String,
    /// Raw bytes as ingested.
    #[serde(
        default,
        with = "raw_content_base64",
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_content: Option<Vec<u8>>,
    /// Extracted plain text. Annotation offsets refer to this text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// MIME type of the raw content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Document {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create a document from ingested bytes.
    pub fn from_content(
        url: impl Into<String>,
        content: Vec<u8>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            raw_content: Some(content),
            content_type,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Compute SHA-256 hash of the raw content.
    pub fn content_hash(&self) -> Option<String> {
        self.raw_content.as_ref().map(|content| {
            let mut hasher = Sha256::new();
            hasher.update(content);
            hex::encode(hasher.finalize())
        })
    }

    /// Extracted text, or the empty string when none was extracted.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Text covered by `annotation`.
    ///
    /// Offsets outside the text, or splitting a UTF-8 sequence, are an error:
    /// the text is never truncated to make an annotation fit.
    pub fn covered_text(&self, annotation: &Annotation) -> Result<&str, DocumentError> {
        let text = self.text_or_empty();
        let (start, end) = (annotation.start, annotation.end);
        if start > end || end > text.len() {
            return Err(DocumentError::OutOfRange {
                start,
                end,
                len: text.len(),
            });
        }
        text.get(start..end)
            .ok_or(DocumentError::NotCharBoundary { start, end })
    }

    /// Append an annotation.
    pub fn annotate(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }
}

mod raw_content_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
