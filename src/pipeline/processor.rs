//! The processor capability and the chain that owns processor instances.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::config::ConfigError;
use crate::models::Document;
use crate::processors::{self, ProcessorSpec};

/// Errors raised by a processor stage.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("{processor}: {message}")]
    Failed { processor: String, message: String },

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0}s")]
    Timeout(u64),

    #[error("processor '{0}' is already closed")]
    Closed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessorError {
    pub fn failed(processor: &str, message: impl Into<String>) -> Self {
        Self::Failed {
            processor: processor.to_string(),
            message: message.into(),
        }
    }
}

/// Progress and counter sink handed to processors.
pub trait Reporter: Send + Sync {
    /// Add `n` to the named counter.
    fn incr(&self, counter: &str, n: u64);

    /// Report a free-form status line.
    fn status(&self, message: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn incr(&self, _counter: &str, _n: u64) {}

    fn status(&self, _message: &str) {}
}

/// Thread-safe counter store, shared by all workers of a run.
#[derive(Debug, Default)]
pub struct CounterReporter {
    counters: Mutex<BTreeMap<String, u64>>,
    last_status: Mutex<Option<String>>,
}

impl CounterReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (0 if never incremented).
    pub fn get(&self, counter: &str) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(counter)
            .copied()
            .unwrap_or(0)
    }

    /// Copy of all counters.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.last_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Reporter for CounterReporter {
    fn incr(&self, counter: &str, n: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(counter.to_string()).or_insert(0) += n;
    }

    fn status(&self, message: &str) {
        tracing::debug!("{}", message);
        *self.last_status.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }
}

/// A document transformation stage.
///
/// `process` returns zero documents to drop the input, one to pass it on
/// (usually modified) and several to split it. An empty result is not an
/// error. Instances are owned by a [`ProcessorChain`], which calls `close`
/// exactly once.
pub trait DocumentProcessor: Send {
    fn name(&self) -> &str;

    fn process(
        &mut self,
        doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Vec<Document>, ProcessorError>;

    fn close(&mut self) -> Result<(), ProcessorError> {
        Ok(())
    }
}

struct Stage {
    processor: Box<dyn DocumentProcessor>,
    closed: bool,
}

impl Stage {
    fn close(&mut self) -> Result<(), ProcessorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.processor.close()
    }
}

/// Ordered processor stages. Each output of stage N is fed to stage N+1.
///
/// Every processor is closed exactly once: by [`ProcessorChain::close`], or
/// when the chain is dropped without it.
#[derive(Default)]
pub struct ProcessorChain {
    stages: Vec<Stage>,
}

impl ProcessorChain {
    pub fn new(processors: Vec<Box<dyn DocumentProcessor>>) -> Self {
        Self {
            stages: processors
                .into_iter()
                .map(|processor| Stage {
                    processor,
                    closed: false,
                })
                .collect(),
        }
    }

    /// Build fresh processor instances for the given specs.
    pub fn from_specs(specs: &[ProcessorSpec]) -> Result<Self, ConfigError> {
        let processors = specs
            .iter()
            .map(processors::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(processors))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.processor.name()).collect()
    }

    /// Run `doc` through every stage. An empty result means it was dropped.
    pub fn process(
        &mut self,
        doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Vec<Document>, ProcessorError> {
        let mut current = vec![doc];
        for stage in &mut self.stages {
            if stage.closed {
                return Err(ProcessorError::Closed(stage.processor.name().to_string()));
            }
            let mut next = Vec::with_capacity(current.len());
            for doc in current {
                next.extend(stage.processor.process(doc, reporter)?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            current = next;
        }
        Ok(current)
    }

    /// Close every stage. All stages are closed even when one fails; the
    /// first error is returned.
    pub fn close(&mut self) -> Result<(), ProcessorError> {
        let mut first_err = None;
        for stage in &mut self.stages {
            if let Err(e) = stage.close() {
                tracing::warn!("Failed to close processor {}: {}", stage.processor.name(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ProcessorChain {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
