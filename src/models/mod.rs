//! Data models for docsieve.

mod annotation;
mod document;
mod metadata;

pub use annotation::Annotation;
pub use document::{Document, DocumentError};
pub use metadata::{Metadata, MetadataEntry};
