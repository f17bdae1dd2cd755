//! Serialized form of documents: single records and record files.

mod file;
mod record;

pub use file::{RecordReader, RecordWriter, MAX_RECORD_LEN};
pub use record::RecordCodec;

use thiserror::Error;

/// Errors from encoding or decoding records.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("invalid length {0}")]
    InvalidLength(i32),

    #[error("{0} does not fit the record format")]
    TooLarge(&'static str),

    #[error("'{0}' is not in the lexicon")]
    NotInLexicon(String),

    #[error("lexicon id {0} out of range")]
    UnknownId(u32),

    #[error("unknown record mode {0}")]
    UnknownMode(u8),

    #[error("record uses {found} names but the reader expects {expected} names")]
    ModeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("not a docsieve record file")]
    BadMagic,

    #[error("unsupported record file version {0}")]
    UnsupportedVersion(u8),

    #[error("lexicon fingerprint mismatch: file has '{file}', configuration gives '{config}'")]
    FingerprintMismatch { file: String, config: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
