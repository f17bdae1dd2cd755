//! Maps annotations into named output fields.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::{Document, DocumentError};

/// What an output field takes from a matching annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The covered text (`Type.*`, or a bare `Type`).
    CoveredText,
    /// The value of one feature, when present (`Type.feature`).
    Feature(String),
}

/// One `field.<name> = <Type>[.<feature>]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub field: String,
    pub annotation_type: String,
    pub selector: Selector,
}

impl FieldMapping {
    /// Parse a mapping target. Returns `None` for an empty type or feature.
    pub fn parse(field: &str, target: &str) -> Option<Self> {
        let target = target.trim();
        let (annotation_type, selector) = match target.split_once('.') {
            Some((t, "*")) => (t, Selector::CoveredText),
            Some((_, "")) => return None,
            Some((t, feature)) => (t, Selector::Feature(feature.to_string())),
            None => (target, Selector::CoveredText),
        };
        if annotation_type.is_empty() || field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            annotation_type: annotation_type.to_string(),
            selector,
        })
    }
}

/// Field name to values, values in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projection {
    fields: BTreeMap<String, Vec<String>>,
}

impl Projection {
    pub fn push(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(value.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A document's url together with its projected fields, as handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedDocument {
    pub url: String,
    pub fields: Projection,
}

/// Configuration-built annotation to field projector.
#[derive(Debug, Clone)]
pub struct FieldProjector {
    by_type: HashMap<String, Vec<FieldMapping>>,
    include_annotations: bool,
    url_field: String,
    text_field: String,
    metadata_fields: Vec<String>,
}

impl Default for FieldProjector {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FieldProjector {
    /// Build from `field.<name>` mappings and projector switches.
    /// Malformed mappings are logged and skipped.
    pub fn from_config(config: &Config) -> Self {
        let mut by_type: HashMap<String, Vec<FieldMapping>> = HashMap::new();
        for (field, target) in &config.field {
            match FieldMapping::parse(field, target) {
                Some(mapping) => by_type
                    .entry(mapping.annotation_type.clone())
                    .or_default()
                    .push(mapping),
                None => tracing::warn!("Skipping malformed mapping field.{} = '{}'", field, target),
            }
        }

        Self {
            by_type,
            include_annotations: config.projector.include_annotations,
            url_field: config.projector.url_field.clone(),
            text_field: config.projector.text_field.clone(),
            metadata_fields: config.projector.metadata_fields.items(),
        }
    }

    /// Mappings configured for `annotation_type`.
    pub fn mappings_for(&self, annotation_type: &str) -> &[FieldMapping] {
        self.by_type
            .get(annotation_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn includes_annotations(&self) -> bool {
        self.include_annotations
    }

    /// Project `doc` into output fields.
    ///
    /// Fails only when a covered-text mapping hits an annotation whose
    /// offsets do not fit the document text.
    pub fn project(&self, doc: &Document) -> Result<Projection, DocumentError> {
        let mut out = Projection::default();

        if !self.url_field.is_empty() {
            out.push(&self.url_field, doc.url.as_str());
        }
        if let Some(ref text) = doc.text {
            if !self.text_field.is_empty() {
                out.push(&self.text_field, text.as_str());
            }
        }
        for key in &self.metadata_fields {
            if let Some(values) = doc.metadata.get(key) {
                for value in values {
                    out.push(key, value.as_str());
                }
            }
        }

        if !self.include_annotations {
            return Ok(out);
        }

        for annotation in &doc.annotations {
            for mapping in self.mappings_for(&annotation.annotation_type) {
                match mapping.selector {
                    Selector::CoveredText => {
                        out.push(&mapping.field, doc.covered_text(annotation)?);
                    }
                    Selector::Feature(ref name) => {
                        if let Some(value) = annotation.feature(name) {
                            out.push(&mapping.field, value);
                        }
                    }
                }
            }
        }

        Ok(out)
    }

    /// Project into a `ProjectedDocument`.
    pub fn project_document(&self, doc: &Document) -> Result<ProjectedDocument, DocumentError> {
        Ok(ProjectedDocument {
            url: doc.url.clone(),
            fields: self.project(doc)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Annotation;

    fn projector(props: &[(&str, &str)]) -> FieldProjector {
        FieldProjector::from_config(&Config::from_properties(props.iter().copied()).unwrap())
    }

    #[test]
    fn test_parse_mapping() {
        assert_eq!(
            FieldMapping::parse("p", "Person.*").unwrap().selector,
            Selector::CoveredText
        );
        assert_eq!(
            FieldMapping::parse("p", "Person").unwrap().selector,
            Selector::CoveredText
        );
        assert_eq!(
            FieldMapping::parse("p", "Person.gender").unwrap().selector,
            Selector::Feature("gender".to_string())
        );
        assert!(FieldMapping::parse("p", ".gender").is_none());
        assert!(FieldMapping::parse("p", "Person.").is_none());
        assert!(FieldMapping::parse("p", "").is_none());
    }

    #[test]
    fn test_wildcard_emits_covered_text() {
        let p = projector(&[("field.person", "Person.*")]);
        let mut doc = Document::new("http://example.com/").with_text("John text");
        doc.annotate(Annotation::new("Person", 0, 4));

        let out = p.project(&doc).unwrap();
        assert_eq!(out.get("person").unwrap(), &["John"]);
        assert_eq!(out.get("url").unwrap(), &["http://example.com/"]);
        assert_eq!(out.get("text").unwrap(), &["John text"]);
    }

    #[test]
    fn test_missing_feature_leaves_field_absent() {
        let p = projector(&[("field.person", "Person.string")]);
        let mut doc = Document::new("u").with_text("John text");
        doc.annotate(Annotation::new("Person", 0, 4));

        let out = p.project(&doc).unwrap();
        assert!(!out.contains("person"));
    }

    #[test]
    fn test_feature_value() {
        let p = projector(&[("field.gender", "Person.gender")]);
        let mut doc = Document::new("u").with_text("John and Mary");
        doc.annotate(Annotation::new("Person", 0, 4).with_feature("gender", "male"));
        doc.annotate(Annotation::new("Person", 9, 13).with_feature("gender", "female"));

        let out = p.project(&doc).unwrap();
        assert_eq!(out.get("gender").unwrap(), &["male", "female"]);
    }

    #[test]
    fn test_multi_value_accumulates_in_document_order() {
        let p = projector(&[("field.person", "Person")]);
        let mut doc = Document::new("u").with_text("Ann met Bob and Ann");
        doc.annotate(Annotation::new("Person", 16, 19));
        doc.annotate(Annotation::new("Person", 8, 11));
        doc.annotate(Annotation::new("Person", 0, 3));

        let out = p.project(&doc).unwrap();
        assert_eq!(out.get("person").unwrap(), &["Ann", "Bob", "Ann"]);
    }

    #[test]
    fn test_one_annotation_many_fields() {
        let p = projector(&[
            ("field.person", "Person.*"),
            ("field.gender", "Person.gender"),
            ("field.place", "Location.*"),
        ]);
        let mut doc = Document::new("u").with_text("John");
        doc.annotate(Annotation::new("Person", 0, 4).with_feature("gender", "male"));

        let out = p.project(&doc).unwrap();
        assert_eq!(out.get("person").unwrap(), &["John"]);
        assert_eq!(out.get("gender").unwrap(), &["male"]);
        assert!(!out.contains("place"));
    }

    #[test]
    fn test_annotations_disabled_copies_base_fields_only() {
        let p = projector(&[
            ("field.person", "Person.*"),
            ("projector.includeAnnotations", "false"),
        ]);
        let mut doc = Document::new("u").with_text("John");
        doc.annotate(Annotation::new("Person", 0, 4));

        let out = p.project(&doc).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get("text").unwrap(), &["John"]);
        assert!(!out.contains("person"));
    }

    #[test]
    fn test_no_matching_annotations() {
        let p = projector(&[("field.person", "Person.*")]);
        let mut doc = Document::new("u");
        doc.annotate(Annotation::new("Token", 0, 0));

        let out = p.project(&doc).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains("url"));
    }

    #[test]
    fn test_metadata_fields_and_renamed_base_fields() {
        let p = projector(&[
            ("projector.metadataFields", "lang,missing"),
            ("projector.textField", "body"),
            ("projector.urlField", ""),
        ]);
        let mut doc = Document::new("u").with_text("hello");
        doc.metadata.add("lang", "en");
        doc.metadata.add("lang", "fr");

        let out = p.project(&doc).unwrap();
        assert_eq!(out.get("lang").unwrap(), &["en", "fr"]);
        assert_eq!(out.get("body").unwrap(), &["hello"]);
        assert!(!out.contains("url"));
        assert!(!out.contains("missing"));
    }

    #[test]
    fn test_out_of_range_offsets_fail_loudly() {
        let p = projector(&[("field.person", "Person.*")]);
        let mut doc = Document::new("u").with_text("John");
        doc.annotate(Annotation::new("Person", 0, 40));

        assert_eq!(
            p.project(&doc),
            Err(DocumentError::OutOfRange {
                start: 0,
                end: 40,
                len: 4
            })
        );
    }
}
