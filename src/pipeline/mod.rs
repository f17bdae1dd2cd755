//! Per-document flow: processors, document filter, annotation restriction and
//! projection.
//!
//! A [`Pipeline`] is built once from the configuration and shared read-only
//! between workers. Processor instances are not shared; every worker owns a
//! [`ProcessorChain`] created with [`Pipeline::processor_chain`].

mod processor;
mod runner;

pub use processor::{
    CounterReporter, DocumentProcessor, NullReporter, ProcessorChain, ProcessorError, Reporter,
};
pub use runner::{PipelineEvent, PipelineRunner, PipelineStats, RunError};

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::filter::{AnnotationFilter, DocumentFilter, Lexicon, Rejection};
use crate::models::{Document, DocumentError};
use crate::processors::ProcessorSpec;
use crate::projection::{FieldProjector, ProjectedDocument};

/// Errors that fail a single document.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("{url}: {source}")]
    Document {
        url: String,
        #[source]
        source: DocumentError,
    },
}

/// What became of one processor output.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Projected(ProjectedDocument),
    Rejected { url: String, reason: Rejection },
}

/// Result of running processors and filters over one input document.
#[derive(Debug, Default)]
pub struct Sieved {
    /// Accepted documents with annotations restricted.
    pub accepted: Vec<Document>,
    pub rejected: Vec<(String, Rejection)>,
}

impl Sieved {
    /// True when the processors produced no output at all.
    pub fn is_dropped(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}

/// Immutable pipeline components built from one configuration.
#[derive(Debug)]
pub struct Pipeline {
    document_filter: DocumentFilter,
    annotation_filter: AnnotationFilter,
    projector: FieldProjector,
    processors: Vec<ProcessorSpec>,
    /// Restrict annotations to the configured types before projection.
    /// Off when no types are configured, so unfiltered runs keep everything.
    restrict_annotations: bool,
    workers: usize,
    channel_capacity: usize,
}

impl Pipeline {
    /// Build every component. Processor specs are instantiated once here so
    /// configuration mistakes surface before any document is read.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        validate_processors(&config.processors)?;

        let annotation_filter = AnnotationFilter::from_config(config);
        let restrict_annotations = !annotation_filter.accepted_types().is_empty();

        let pipeline = Self {
            document_filter: DocumentFilter::from_config(config),
            annotation_filter,
            projector: FieldProjector::from_config(config),
            processors: config.processors.clone(),
            restrict_annotations,
            workers: config.pipeline.workers.max(1),
            channel_capacity: config.pipeline.channel_capacity.max(1),
        };

        tracing::info!(
            "Pipeline: {} processor(s), {} keep / {} skip rule(s), {} annotation type(s)",
            pipeline.processors.len(),
            pipeline.document_filter.keep_rules().len(),
            pipeline.document_filter.skip_rules().len(),
            pipeline.annotation_filter.accepted_types().len()
        );
        Ok(pipeline)
    }

    /// Fresh processor instances for one worker.
    pub fn processor_chain(&self) -> Result<ProcessorChain, ConfigError> {
        ProcessorChain::from_specs(&self.processors)
    }

    pub fn document_filter(&self) -> &DocumentFilter {
        &self.document_filter
    }

    pub fn annotation_filter(&self) -> &AnnotationFilter {
        &self.annotation_filter
    }

    pub fn projector(&self) -> &FieldProjector {
        &self.projector
    }

    pub fn lexicon(&self) -> &Lexicon {
        self.annotation_filter.lexicon()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Run processors, then the document filter and annotation restriction.
    pub fn sieve(
        &self,
        chain: &mut ProcessorChain,
        doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Sieved, ProcessorError> {
        let mut sieved = Sieved::default();
        for mut doc in chain.process(doc, reporter)? {
            if let Err(reason) = self.document_filter.check(&doc) {
                tracing::debug!("Rejected {}: {}", doc.url, reason);
                sieved.rejected.push((doc.url, reason));
                continue;
            }
            if self.restrict_annotations {
                self.annotation_filter.apply_to(&mut doc);
            }
            sieved.accepted.push(doc);
        }
        Ok(sieved)
    }

    /// Full per-document flow. An empty result means the processors dropped
    /// the document.
    pub fn process_document(
        &self,
        chain: &mut ProcessorChain,
        doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Vec<Outcome>, PipelineError> {
        let sieved = self.sieve(chain, doc, reporter)?;

        let mut outcomes = Vec::with_capacity(sieved.accepted.len() + sieved.rejected.len());
        for doc in &sieved.accepted {
            let projected =
                self.projector
                    .project_document(doc)
                    .map_err(|source| PipelineError::Document {
                        url: doc.url.clone(),
                        source,
                    })?;
            outcomes.push(Outcome::Projected(projected));
        }
        outcomes.extend(
            sieved
                .rejected
                .into_iter()
                .map(|(url, reason)| Outcome::Rejected { url, reason }),
        );
        Ok(outcomes)
    }
}

/// Instantiate and close every processor once. Construction errors abort;
/// close errors are only logged since no document has been processed.
fn validate_processors(specs: &[ProcessorSpec]) -> Result<(), ConfigError> {
    let mut chain = ProcessorChain::from_specs(specs)?;
    if let Err(e) = chain.close() {
        tracing::warn!("Processor validation chain failed to close: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Annotation;

    fn pipeline(props: &[(&str, &str)]) -> Pipeline {
        Pipeline::from_config(&Config::from_properties(props.iter().copied()).unwrap()).unwrap()
    }

    fn person_doc(lang: &str) -> Document {
        let mut doc = Document::new(format!("http://example.com/{}", lang)).with_text("John text");
        doc.metadata.add("lang", lang);
        doc.annotate(Annotation::new("Person", 0, 4).with_feature("gender", "male"));
        doc.annotate(Annotation::new("Token", 5, 9));
        doc
    }

    #[test]
    fn test_validate_processors() {
        let config: Config = toml::from_str(
            r#"
            [[processors]]
            kind = "regex"
            type = "Year"
            pattern = "[0-9]{4}"
            "#,
        )
        .unwrap();
        assert!(validate_processors(&config.processors).is_ok());

        let config: Config = toml::from_str(
            r#"
            [[processors]]
            kind = "regex"
            type = "Broken"
            pattern = "("
            "#,
        )
        .unwrap();
        assert!(matches!(
            validate_processors(&config.processors),
            Err(ConfigError::Processor { .. })
        ));
        assert!(Pipeline::from_config(&config).is_err());
    }

    #[test]
    fn test_projects_accepted_document() {
        let p = pipeline(&[
            ("keep.lang", "en"),
            ("annotation.types", "Person"),
            ("field.person", "Person.*"),
        ]);
        let mut chain = p.processor_chain().unwrap();

        let outcomes = p
            .process_document(&mut chain, person_doc("en"), &NullReporter)
            .unwrap();
        match &outcomes[..] {
            [Outcome::Projected(projected)] => {
                assert_eq!(projected.fields.get("person").unwrap(), &["John"]);
            }
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_by_metadata() {
        let p = pipeline(&[("keep.lang", "en")]);
        let mut chain = p.processor_chain().unwrap();

        let outcomes = p
            .process_document(&mut chain, person_doc("fr"), &NullReporter)
            .unwrap();
        assert!(matches!(&outcomes[..], [Outcome::Rejected { .. }]));
    }

    #[test]
    fn test_sieve_restricts_annotations() {
        let p = pipeline(&[("annotation.types", "Person")]);
        let mut chain = p.processor_chain().unwrap();

        let sieved = p.sieve(&mut chain, person_doc("en"), &NullReporter).unwrap();
        let doc = &sieved.accepted[0];
        assert_eq!(doc.annotations.len(), 1);
        assert_eq!(doc.annotations[0].annotation_type, "Person");
        assert!(doc.annotations[0].features.is_empty());
    }

    #[test]
    fn test_no_types_keeps_all_annotations() {
        let p = pipeline(&[]);
        let mut chain = p.processor_chain().unwrap();

        let sieved = p.sieve(&mut chain, person_doc("en"), &NullReporter).unwrap();
        assert_eq!(sieved.accepted[0].annotations.len(), 2);
    }

    #[test]
    fn test_bad_offsets_fail_document() {
        let p = pipeline(&[("field.person", "Person.*")]);
        let mut chain = p.processor_chain().unwrap();
        let mut doc = Document::new("u").with_text("Jo");
        doc.annotate(Annotation::new("Person", 0, 4));

        assert!(matches!(
            p.process_document(&mut chain, doc, &NullReporter),
            Err(PipelineError::Document { .. })
        ));
    }
}
