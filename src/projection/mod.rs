//! Projection of documents into flat, multi-valued field maps for indexing.

mod projector;

pub use projector::{FieldMapping, FieldProjector, ProjectedDocument, Projection, Selector};
