//! docsieve - document filtering, annotation and field projection.
//!
//! Documents flow from record files through configurable processors, a
//! metadata filter and an annotation filter, and are finally projected into
//! named output fields ready for indexing.
//!
//! ```text
//! ingest (WARC, files) -> record file -> processors -> keep/skip
//!     -> annotation restriction -> projection -> JSON lines
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod projection;
pub mod sink;
