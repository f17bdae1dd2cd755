//! Destinations for projected documents.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::projection::ProjectedDocument;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Receives projected documents in the order the pipeline produces them.
#[async_trait]
pub trait FieldSink: Send {
    async fn write(&mut self, doc: ProjectedDocument) -> Result<(), SinkError>;

    /// Flush buffered output. Called once after the last document.
    async fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// One JSON object per line: `{"url": ..., "fields": {...}}`.
pub struct JsonLinesSink {
    out: BufWriter<Box<dyn AsyncWrite + Unpin + Send>>,
    written: u64,
}

impl JsonLinesSink {
    pub fn new(out: Box<dyn AsyncWrite + Unpin + Send>) -> Self {
        Self {
            out: BufWriter::new(out),
            written: 0,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(tokio::io::stdout()))
    }

    /// Create (or truncate) `path`.
    pub async fn create(path: &Path) -> Result<Self, SinkError> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Self::new(Box::new(file)))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

#[async_trait]
impl FieldSink for JsonLinesSink {
    async fn write(&mut self, doc: ProjectedDocument) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&doc)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.out.flush().await?;
        Ok(())
    }
}

/// Collects projections in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub documents: Vec<ProjectedDocument>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FieldSink for MemorySink {
    async fn write(&mut self, doc: ProjectedDocument) -> Result<(), SinkError> {
        self.documents.push(doc);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Projection;

    fn projected(url: &str) -> ProjectedDocument {
        let mut fields = Projection::default();
        fields.push("person", "John");
        fields.push("person", "Mary");
        ProjectedDocument {
            url: url.to_string(),
            fields,
        }
    }

    #[tokio::test]
    async fn test_json_lines_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut sink = JsonLinesSink::create(&path).await.unwrap();
        sink.write(projected("a")).await.unwrap();
        sink.write(projected("b")).await.unwrap();
        sink.finish().await.unwrap();
        assert_eq!(sink.written(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"url":"a","fields":{"person":["John","Mary"]}}"#
        );
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write(projected("a")).await.unwrap();
        sink.finish().await.unwrap();
        assert_eq!(sink.documents.len(), 1);
        assert!(sink.finished);
    }
}
