//! Record files: a header followed by length-framed document records.
//!
//! ```text
//! magic        "DSRF"
//! version      u8
//! fingerprint  u32 len + ASCII hex (empty in literal mode)
//! records      (u32 len + record)*
//! ```
//!
//! The fingerprint identifies the lexicon the writer derived from its
//! configuration. A reader recomputes its own and refuses the file when the
//! two differ, instead of decoding ids into the wrong names.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::filter::Lexicon;
use crate::models::Document;

use super::record::RecordCodec;
use super::CodecError;

const MAGIC: &[u8; 4] = b"DSRF";
const VERSION: u8 = 1;

/// Largest record frame accepted by readers and writers (256 MiB).
pub const MAX_RECORD_LEN: usize = 256 * 1024 * 1024;
const MAX_FINGERPRINT_LEN: usize = 256;

/// Writes documents to a record file.
pub struct RecordWriter<W: Write> {
    inner: W,
    codec: RecordCodec,
    written: u64,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) a record file at `path`.
    pub fn create(path: &Path, codec: RecordCodec) -> Result<Self, CodecError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), codec)
    }
}

impl<W: Write> RecordWriter<W> {
    /// Write the header and return a writer ready for records.
    pub fn new(mut inner: W, codec: RecordCodec) -> Result<Self, CodecError> {
        let fingerprint = codec.lexicon().map(Lexicon::fingerprint).unwrap_or_default();
        inner.write_all(MAGIC)?;
        inner.write_all(&[VERSION])?;
        inner.write_all(&(fingerprint.len() as u32).to_be_bytes())?;
        inner.write_all(fingerprint.as_bytes())?;
        Ok(Self {
            inner,
            codec,
            written: 0,
        })
    }

    pub fn write(&mut self, doc: &Document) -> Result<(), CodecError> {
        let record = self.codec.encode(doc)?;
        if record.len() > MAX_RECORD_LEN {
            return Err(CodecError::TooLarge("record"));
        }
        let len = record.len() as u32;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(&record)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W, CodecError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads documents from a record file.
///
/// After the first error the reader is exhausted: the stream position is no
/// longer known, so no further records are attempted.
pub struct RecordReader<R: Read> {
    inner: R,
    codec: RecordCodec,
    failed: bool,
}

impl RecordReader<BufReader<File>> {
    /// Open the record file at `path`. See [`RecordReader::new`].
    pub fn open(path: &Path, lexicon: Option<Arc<Lexicon>>) -> Result<Self, CodecError> {
        let file = File::open(path)?;
        Self::new(BufReader::with_capacity(1024 * 1024, file), lexicon)
    }
}

impl<R: Read> RecordReader<R> {
    /// Read and validate the header.
    ///
    /// Literal-mode files are readable with or without a lexicon. Lexicon-mode
    /// files need `lexicon` and its fingerprint must match the file's.
    pub fn new(mut inner: R, lexicon: Option<Arc<Lexicon>>) -> Result<Self, CodecError> {
        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CodecError::BadMagic);
        }

        let mut version = [0u8; 1];
        inner.read_exact(&mut version)?;
        if version[0] != VERSION {
            return Err(CodecError::UnsupportedVersion(version[0]));
        }

        let mut len = [0u8; 4];
        inner.read_exact(&mut len)?;
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_FINGERPRINT_LEN {
            return Err(CodecError::TooLarge("fingerprint"));
        }
        let mut fingerprint = vec![0u8; len];
        inner.read_exact(&mut fingerprint)?;
        let fingerprint =
            String::from_utf8(fingerprint).map_err(|_| CodecError::InvalidUtf8("fingerprint"))?;

        let codec = if fingerprint.is_empty() {
            RecordCodec::literal()
        } else {
            let lexicon = lexicon.ok_or_else(|| CodecError::FingerprintMismatch {
                file: fingerprint.clone(),
                config: String::new(),
            })?;
            let expected = lexicon.fingerprint();
            if expected != fingerprint {
                return Err(CodecError::FingerprintMismatch {
                    file: fingerprint,
                    config: expected,
                });
            }
            RecordCodec::with_lexicon(lexicon)
        };

        Ok(Self {
            inner,
            codec,
            failed: false,
        })
    }

    /// Whether records in this file use lexicon ids.
    pub fn uses_lexicon(&self) -> bool {
        self.codec.lexicon().is_some()
    }

    /// Read the next record; `Ok(None)` at a clean end of file and after
    /// any earlier error.
    pub fn read_next(&mut self) -> Result<Option<Document>, CodecError> {
        if self.failed {
            return Ok(None);
        }
        let result = self.read_record();
        self.failed = result.is_err();
        result
    }

    fn read_record(&mut self) -> Result<Option<Document>, CodecError> {
        let mut len = [0u8; 4];
        let mut filled = 0;
        while filled < len.len() {
            match self.inner.read(&mut len[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(CodecError::Truncated {
                        needed: len.len(),
                        remaining: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_RECORD_LEN {
            return Err(CodecError::TooLarge("record"));
        }
        let mut record = vec![0u8; len];
        self.inner.read_exact(&mut record)?;
        self.codec.decode(&record).map(Some)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Document, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Annotation;

    fn docs() -> Vec<Document> {
        (0..3)
            .map(|i| {
                let mut doc = Document::new(format!("http://example.com/{}", i))
                    .with_text(format!("doc {} about Paris", i));
                doc.metadata.set("index", i.to_string());
                doc.annotate(Annotation::new("Location", 13, 18).with_feature("country", "FR"));
                doc
            })
            .collect()
    }

    #[test]
    fn test_file_roundtrip_with_lexicon() {
        let lexicon = Arc::new(Lexicon::new(["Location", "country"]));
        let mut writer =
            RecordWriter::new(Vec::new(), RecordCodec::with_lexicon(lexicon.clone())).unwrap();
        for doc in &docs() {
            writer.write(doc).unwrap();
        }
        assert_eq!(writer.written(), 3);
        let bytes = writer.finish().unwrap();

        let reader = RecordReader::new(bytes.as_slice(), Some(lexicon)).unwrap();
        assert!(reader.uses_lexicon());
        let read: Vec<Document> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(read, docs());
    }

    #[test]
    fn test_literal_file_reads_with_any_lexicon() {
        let mut writer = RecordWriter::new(Vec::new(), RecordCodec::literal()).unwrap();
        writer.write(&docs()[0]).unwrap();
        let bytes = writer.finish().unwrap();

        let lexicon = Arc::new(Lexicon::new(["Other"]));
        let mut reader = RecordReader::new(bytes.as_slice(), Some(lexicon)).unwrap();
        assert!(!reader.uses_lexicon());
        assert_eq!(reader.read_next().unwrap().unwrap(), docs()[0]);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_fingerprint_mismatch() {
        let writer_lexicon = Arc::new(Lexicon::new(["Location", "country"]));
        let writer = RecordWriter::new(Vec::new(), RecordCodec::with_lexicon(writer_lexicon)).unwrap();
        let bytes = writer.finish().unwrap();

        let other = Arc::new(Lexicon::new(["Location"]));
        assert!(matches!(
            RecordReader::new(bytes.as_slice(), Some(other)),
            Err(CodecError::FingerprintMismatch { .. })
        ));
        assert!(matches!(
            RecordReader::new(bytes.as_slice(), None),
            Err(CodecError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            RecordReader::new(&b"NOPE\x01\0\0\0\0"[..], None),
            Err(CodecError::BadMagic)
        ));
    }

    #[test]
    fn test_truncated_frame() {
        let mut writer = RecordWriter::new(Vec::new(), RecordCodec::literal()).unwrap();
        writer.write(&docs()[0]).unwrap();
        let mut bytes = writer.finish().unwrap();
        bytes.truncate(bytes.len() - 1);

        let mut reader = RecordReader::new(bytes.as_slice(), None).unwrap();
        assert!(reader.read_next().is_err());
        assert!(reader.read_next().unwrap().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_oversized_frame_is_rejected_before_allocation() {
        let mut bytes = RecordWriter::new(Vec::new(), RecordCodec::literal())
            .unwrap()
            .finish()
            .unwrap();
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());

        let mut reader = RecordReader::new(bytes.as_slice(), None).unwrap();
        assert!(matches!(
            reader.read_next(),
            Err(CodecError::TooLarge("record"))
        ));
    }

    #[test]
    fn test_oversized_fingerprint_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());

        assert!(matches!(
            RecordReader::new(bytes.as_slice(), None),
            Err(CodecError::TooLarge("fingerprint"))
        ));
    }

    #[test]
    fn test_create_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dsr");

        let mut writer = RecordWriter::create(&path, RecordCodec::literal()).unwrap();
        for doc in &docs() {
            writer.write(doc).unwrap();
        }
        writer.finish().unwrap();

        let read: Vec<Document> = RecordReader::open(&path, None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(read.len(), 3);
    }
}
