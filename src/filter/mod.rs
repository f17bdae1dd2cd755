//! Configuration-built filters over documents and their annotations.
//!
//! - `DocumentFilter`: keep/skip rules over document metadata
//! - `AnnotationFilter`: accepted types and retained features
//! - `Lexicon`: deterministic ids for the names the annotation filter references

mod annotation;
mod document;
mod lexicon;

pub use annotation::{AnnotationFilter, OUTPUT_SET_KEY};
pub use document::{DocumentFilter, FieldRule, Rejection};
pub use lexicon::Lexicon;
