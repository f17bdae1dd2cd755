//! Worker pool that drives documents through a [`Pipeline`] into a sink.
//!
//! One blocking task reads the input, `workers` blocking tasks each own a
//! processor chain, and the calling task writes projections to the sink and
//! emits [`PipelineEvent`]s for progress display.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::config::ConfigError;
use crate::models::Document;
use crate::sink::{FieldSink, SinkError};

use super::processor::{CounterReporter, ProcessorChain};
use super::{Outcome, Pipeline};

/// Events emitted during a run.
/// Fields are populated when events are created, even if consumers don't read all of them.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Workers started
    Started { workers: usize },
    /// A projection was written to the sink
    DocumentProjected { url: String },
    /// The document filter rejected a document
    DocumentRejected { url: String, reason: String },
    /// Processors produced no output for a document
    DocumentDropped { url: String },
    /// Processing a document failed
    DocumentFailed { url: String, error: String },
    /// Run complete
    Complete(PipelineStats),
}

/// Counters for one run.
///
/// `projected` and `rejected` count processor outputs, so with splitting
/// processors they can exceed `read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub read: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub projected: u64,
    pub failed: u64,
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("worker task failed: {0}")]
    Worker(String),
}

enum WorkerMessage {
    Outcomes(Vec<Outcome>),
    Dropped { url: String },
    Failed { url: String, error: String },
}

/// Runs a shared [`Pipeline`] over a stream of documents.
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    workers: usize,
    reporter: Arc<CounterReporter>,
}

impl PipelineRunner {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            workers: pipeline.workers(),
            pipeline,
            reporter: Arc::new(CounterReporter::new()),
        }
    }

    /// Override the configured worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Processor counters accumulated across all workers.
    pub fn reporter(&self) -> &CounterReporter {
        &self.reporter
    }

    /// Process every document from `input`.
    ///
    /// An `Err` item from `input` is logged and counted as failed; reading
    /// continues with the next item. Sources that cannot resume after an
    /// error (such as [`RecordReader`](crate::codec::RecordReader)) end
    /// themselves, so chained sources move on to the next one. Failures of
    /// individual documents never stop the run.
    pub async fn run<I, E, S>(
        &self,
        input: I,
        sink: &mut S,
        event_tx: mpsc::Sender<PipelineEvent>,
    ) -> Result<PipelineStats, RunError>
    where
        I: IntoIterator<Item = Result<Document, E>> + Send + 'static,
        I::IntoIter: Send,
        E: std::fmt::Display + Send + 'static,
        S: FieldSink + ?Sized,
    {
        let capacity = self.pipeline.channel_capacity();
        let (doc_tx, doc_rx) = mpsc::channel::<Document>(capacity);
        let (out_tx, mut out_rx) = mpsc::channel::<WorkerMessage>(capacity);
        let doc_rx = Arc::new(Mutex::new(doc_rx));

        let reader = tokio::task::spawn_blocking(move || {
            let (mut read, mut failed) = (0u64, 0u64);
            for item in input {
                match item {
                    Ok(doc) => {
                        read += 1;
                        if doc_tx.blocking_send(doc).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read input: {}", e);
                        failed += 1;
                    }
                }
            }
            (read, failed)
        });

        let mut workers = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let chain = self.pipeline.processor_chain()?;
            let pipeline = self.pipeline.clone();
            let reporter = self.reporter.clone();
            let doc_rx = doc_rx.clone();
            let out_tx = out_tx.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                work(&pipeline, chain, &reporter, &doc_rx, &out_tx)
            }));
        }
        drop(out_tx);

        let _ = event_tx
            .send(PipelineEvent::Started {
                workers: self.workers,
            })
            .await;

        let mut stats = PipelineStats::default();
        while let Some(message) = out_rx.recv().await {
            match message {
                WorkerMessage::Outcomes(outcomes) => {
                    for outcome in outcomes {
                        match outcome {
                            Outcome::Projected(projected) => {
                                let url = projected.url.clone();
                                sink.write(projected).await?;
                                stats.projected += 1;
                                let _ = event_tx
                                    .send(PipelineEvent::DocumentProjected { url })
                                    .await;
                            }
                            Outcome::Rejected { url, reason } => {
                                stats.rejected += 1;
                                let _ = event_tx
                                    .send(PipelineEvent::DocumentRejected {
                                        url,
                                        reason: reason.to_string(),
                                    })
                                    .await;
                            }
                        }
                    }
                }
                WorkerMessage::Dropped { url } => {
                    stats.dropped += 1;
                    let _ = event_tx.send(PipelineEvent::DocumentDropped { url }).await;
                }
                WorkerMessage::Failed { url, error } => {
                    stats.failed += 1;
                    let _ = event_tx
                        .send(PipelineEvent::DocumentFailed { url, error })
                        .await;
                }
            }
        }

        for worker in workers {
            worker.await.map_err(|e| RunError::Worker(e.to_string()))?;
        }
        let (read, read_failures) = reader
            .await
            .map_err(|e| RunError::Worker(e.to_string()))?;
        stats.read = read;
        stats.failed += read_failures;

        sink.finish().await?;

        tracing::info!(
            "Run complete: {} read, {} projected, {} rejected, {} dropped, {} failed",
            stats.read,
            stats.projected,
            stats.rejected,
            stats.dropped,
            stats.failed
        );
        let _ = event_tx.send(PipelineEvent::Complete(stats)).await;

        Ok(stats)
    }
}

/// Worker loop: pull documents until the input closes or the consumer goes
/// away, then close the processor chain.
fn work(
    pipeline: &Pipeline,
    mut chain: ProcessorChain,
    reporter: &CounterReporter,
    doc_rx: &Mutex<mpsc::Receiver<Document>>,
    out_tx: &mpsc::Sender<WorkerMessage>,
) {
    loop {
        let next = doc_rx.blocking_lock().blocking_recv();
        let Some(doc) = next else {
            break;
        };

        let url = doc.url.clone();
        let message = match pipeline.process_document(&mut chain, doc, reporter) {
            Ok(outcomes) if outcomes.is_empty() => WorkerMessage::Dropped { url },
            Ok(outcomes) => WorkerMessage::Outcomes(outcomes),
            Err(e) => {
                tracing::warn!("Failed to process {}: {}", url, e);
                WorkerMessage::Failed {
                    url,
                    error: e.to_string(),
                }
            }
        };

        if out_tx.blocking_send(message).is_err() {
            break;
        }
    }

    if let Err(e) = chain.close() {
        tracing::warn!("Failed to close processors: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Annotation;
    use crate::sink::MemorySink;

    fn docs() -> Vec<Result<Document, std::io::Error>> {
        ["en", "fr", "en"]
            .iter()
            .enumerate()
            .map(|(i, lang)| {
                let mut doc = Document::new(format!("http://example.com/{}", i)).with_text("John");
                doc.metadata.add("lang", *lang);
                doc.annotate(Annotation::new("Person", 0, 4));
                Ok(doc)
            })
            .collect()
    }

    fn runner(props: &[(&str, &str)]) -> PipelineRunner {
        let config = Config::from_properties(props.iter().copied()).unwrap();
        PipelineRunner::new(Arc::new(Pipeline::from_config(&config).unwrap())).with_workers(2)
    }

    #[tokio::test]
    async fn test_run_counts_outcomes() {
        let runner = runner(&[("keep.lang", "en"), ("field.person", "Person.*")]);
        let mut sink = MemorySink::new();
        let (event_tx, mut event_rx) = mpsc::channel(100);

        let stats = runner.run(docs(), &mut sink, event_tx).await.unwrap();

        assert_eq!(
            stats,
            PipelineStats {
                read: 3,
                dropped: 0,
                rejected: 1,
                projected: 2,
                failed: 0,
            }
        );
        assert_eq!(sink.documents.len(), 2);
        assert!(sink.finished);
        for doc in &sink.documents {
            assert_eq!(doc.fields.get("person").unwrap(), &["John"]);
        }

        let mut saw_complete = false;
        while let Ok(event) = event_rx.try_recv() {
            if let PipelineEvent::Complete(s) = event {
                assert_eq!(s, stats);
                saw_complete = true;
            }
        }
        assert!(saw_complete);
    }

    #[tokio::test]
    async fn test_failed_documents_do_not_stop_run() {
        let runner = runner(&[("field.person", "Person.*")]);
        let mut input = docs();
        let mut bad = Document::new("bad").with_text("J");
        bad.annotate(Annotation::new("Person", 0, 4));
        input.insert(1, Ok(bad));

        let mut sink = MemorySink::new();
        let (event_tx, _event_rx) = mpsc::channel(100);
        let stats = runner.run(input, &mut sink, event_tx).await.unwrap();

        assert_eq!(stats.read, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.projected, 3);
    }

    #[tokio::test]
    async fn test_read_error_is_counted_and_skipped() {
        let runner = runner(&[]);
        let mut input = docs();
        input.insert(1, Err(std::io::Error::other("corrupt")));

        let mut sink = MemorySink::new();
        let (event_tx, _event_rx) = mpsc::channel(100);
        let stats = runner.run(input, &mut sink, event_tx).await.unwrap();

        assert_eq!(stats.read, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.projected, 3);
    }
}
