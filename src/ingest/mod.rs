//! Ingestion adapters: turn external sources into [`Document`]s.
//!
//! [`Document`]: crate::models::Document

pub mod files;
pub mod warc;

pub use files::FileSource;
pub use warc::{WarcOptions, WarcSource};

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Document;

/// Metadata key holding the hex SHA-256 of the ingested raw content.
pub const CONTENT_HASH_KEY: &str = "content.sha256";

fn stamp_content_hash(doc: &mut Document) {
    if let Some(hash) = doc.content_hash() {
        doc.metadata.set(CONTENT_HASH_KEY, hash);
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("cannot build a file URL for '{0}'")]
    FileUrl(PathBuf),
}
