//! Selection of annotation types and features, and the lexicon derived from it.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{AnnotationConfig, Config};
use crate::models::{Annotation, Document};

use super::lexicon::Lexicon;

static NO_FEATURES: BTreeSet<String> = BTreeSet::new();

/// Metadata key carrying the output set label of filtered documents.
pub const OUTPUT_SET_KEY: &str = "annotation.outputset";

/// Configuration-built selector over annotation types and features.
#[derive(Debug, Clone, Default)]
pub struct AnnotationFilter {
    types: BTreeSet<String>,
    features: BTreeMap<String, BTreeSet<String>>,
    output_set: String,
    lexicon: Lexicon,
}

impl AnnotationFilter {
    /// Build from type names, `Type.feature` paths and an output set label.
    ///
    /// Feature paths without exactly one `.` separator, or with an empty
    /// side, are logged and skipped.
    pub fn new<T, F>(types: T, feature_paths: F, output_set: impl Into<String>) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let types: BTreeSet<String> = types
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let mut features: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for path in feature_paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            match parse_feature_path(path) {
                Some((type_name, feature)) => {
                    features
                        .entry(type_name.to_string())
                        .or_default()
                        .insert(feature.to_string());
                }
                None => {
                    tracing::warn!("Skipping malformed annotation feature '{}'", path);
                }
            }
        }

        let lexicon = Lexicon::new(
            types
                .iter()
                .cloned()
                .chain(features.values().flatten().cloned()),
        );

        Self {
            types,
            features,
            output_set: output_set.into(),
            lexicon,
        }
    }

    pub fn from_annotation_config(config: &AnnotationConfig) -> Self {
        Self::new(
            config.types.items(),
            config.features.items(),
            config.outputset.clone(),
        )
    }

    pub fn from_config(config: &Config) -> Self {
        Self::from_annotation_config(&config.annotation)
    }

    /// Whether annotations of `annotation_type` are kept.
    pub fn accepts(&self, annotation_type: &str) -> bool {
        self.types.contains(annotation_type)
    }

    /// Features configured for `annotation_type`; empty when none are.
    pub fn retained_features(&self, annotation_type: &str) -> &BTreeSet<String> {
        self.features.get(annotation_type).unwrap_or(&NO_FEATURES)
    }

    pub fn accepted_types(&self) -> &BTreeSet<String> {
        &self.types
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Label attached to filtered output.
    pub fn output_set(&self) -> &str {
        &self.output_set
    }

    /// Restrict `annotations` to accepted types and retained features, in order.
    pub fn apply(&self, annotations: &[Annotation]) -> Vec<Annotation> {
        annotations
            .iter()
            .filter(|a| self.accepts(&a.annotation_type))
            .map(|a| self.restrict(a))
            .collect()
    }

    /// Restrict a document's annotations in place and label it with the
    /// output set under [`OUTPUT_SET_KEY`] when one is configured.
    pub fn apply_to(&self, doc: &mut Document) {
        if !self.output_set.is_empty() {
            doc.metadata.set(OUTPUT_SET_KEY, self.output_set.as_str());
        }
        let annotations = std::mem::take(&mut doc.annotations);
        doc.annotations = annotations
            .into_iter()
            .filter(|a| self.accepts(&a.annotation_type))
            .map(|mut a| {
                let retained = self.retained_features(&a.annotation_type);
                a.features.retain(|name, _| retained.contains(name));
                a
            })
            .collect();
    }

    fn restrict(&self, annotation: &Annotation) -> Annotation {
        let retained = self.retained_features(&annotation.annotation_type);
        Annotation {
            start: annotation.start,
            end: annotation.end,
            annotation_type: annotation.annotation_type.clone(),
            features: annotation
                .features
                .iter()
                .filter(|(name, _)| retained.contains(*name))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Split `Type.feature`. Exactly one separator and two non-empty sides.
fn parse_feature_path(path: &str) -> Option<(&str, &str)> {
    let (type_name, feature) = path.split_once('.')?;
    if type_name.is_empty() || feature.is_empty() || feature.contains('.') {
        return None;
    }
    Some((type_name, feature))
}
