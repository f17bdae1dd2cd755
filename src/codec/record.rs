//! Binary layout of a single document record.
//!
//! All integers are big-endian.
//!
//! ```text
//! mode            u8      0 = literal names, 1 = lexicon ids
//! url             str
//! content_type    str     empty when absent
//! raw_content     i32 len (-1 = absent) + bytes
//! text            i32 len (-1 = absent) + UTF-8
//! metadata        u32 pair count, then (key str, value str) per value
//! annotations     u32 count, then per annotation:
//!                   start u32, end u32, type name,
//!                   u32 feature count, then (feature name, value str)
//! ```
//!
//! `str` is a u32 length followed by UTF-8 bytes. A "name" is a `str` in
//! literal mode and a u32 lexicon ordinal in lexicon mode.

use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::filter::Lexicon;
use crate::models::{Annotation, Document, Metadata};

use super::CodecError;

const MODE_LITERAL: u8 = 0;
const MODE_LEXICON: u8 = 1;
const ABSENT: i32 = -1;

fn mode_name(mode: u8) -> &'static str {
    match mode {
        MODE_LITERAL => "literal",
        _ => "lexicon",
    }
}

/// Encodes and decodes document records.
///
/// With a lexicon, annotation type and feature names are written as ordinals;
/// without one they are written as strings.
#[derive(Debug, Clone, Default)]
pub struct RecordCodec {
    lexicon: Option<Arc<Lexicon>>,
}

impl RecordCodec {
    /// Codec writing names as strings.
    pub fn literal() -> Self {
        Self { lexicon: None }
    }

    /// Codec writing names as ordinals into `lexicon`.
    pub fn with_lexicon(lexicon: Arc<Lexicon>) -> Self {
        Self {
            lexicon: Some(lexicon),
        }
    }

    pub fn lexicon(&self) -> Option<&Lexicon> {
        self.lexicon.as_deref()
    }

    fn mode(&self) -> u8 {
        if self.lexicon.is_some() {
            MODE_LEXICON
        } else {
            MODE_LITERAL
        }
    }

    /// Serialize a document.
    pub fn encode(&self, doc: &Document) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(
            64 + doc.url.len()
                + doc.raw_content.as_ref().map_or(0, Vec::len)
                + doc.text.as_ref().map_or(0, String::len),
        );

        buf.put_u8(self.mode());
        put_str(&mut buf, &doc.url, "url")?;
        put_str(&mut buf, doc.content_type.as_deref().unwrap_or(""), "content type")?;
        put_optional_bytes(&mut buf, doc.raw_content.as_deref(), "raw content")?;
        put_optional_bytes(&mut buf, doc.text.as_deref().map(str::as_bytes), "text")?;

        let pairs: Vec<(&str, &str)> = doc.metadata.pairs().collect();
        buf.put_u32(to_u32(pairs.len(), "metadata count")?);
        for (key, value) in pairs {
            put_str(&mut buf, key, "metadata key")?;
            put_str(&mut buf, value, "metadata value")?;
        }

        buf.put_u32(to_u32(doc.annotations.len(), "annotation count")?);
        for annotation in &doc.annotations {
            buf.put_u32(to_u32(annotation.start, "annotation start")?);
            buf.put_u32(to_u32(annotation.end, "annotation end")?);
            self.put_name(&mut buf, &annotation.annotation_type)?;
            buf.put_u32(to_u32(annotation.features.len(), "feature count")?);
            for (name, value) in &annotation.features {
                self.put_name(&mut buf, name)?;
                put_str(&mut buf, value, "feature value")?;
            }
        }

        Ok(buf)
    }

    /// Deserialize a document. The whole input must be consumed.
    pub fn decode(&self, data: &[u8]) -> Result<Document, CodecError> {
        let mut buf = data;

        let mode = get_u8(&mut buf)?;
        if mode != MODE_LITERAL && mode != MODE_LEXICON {
            return Err(CodecError::UnknownMode(mode));
        }
        if mode != self.mode() {
            return Err(CodecError::ModeMismatch {
                expected: mode_name(self.mode()),
                found: mode_name(mode),
            });
        }

        let url = get_str(&mut buf, "url")?;
        let content_type = Some(get_str(&mut buf, "content type")?).filter(|s| !s.is_empty());
        let raw_content = get_optional_bytes(&mut buf)?;
        let text = get_optional_bytes(&mut buf)?
            .map(|bytes| String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8("text")))
            .transpose()?;

        let mut metadata = Metadata::new();
        let pair_count = get_u32(&mut buf)?;
        for _ in 0..pair_count {
            let key = get_str(&mut buf, "metadata key")?;
            let value = get_str(&mut buf, "metadata value")?;
            metadata.add(key, value);
        }

        let annotation_count = get_u32(&mut buf)?;
        let mut annotations = Vec::with_capacity((annotation_count as usize).min(buf.len()));
        for _ in 0..annotation_count {
            let start = get_u32(&mut buf)? as usize;
            let end = get_u32(&mut buf)? as usize;
            let mut annotation = Annotation::new(self.get_name(&mut buf)?, start, end);
            let feature_count = get_u32(&mut buf)?;
            for _ in 0..feature_count {
                let name = self.get_name(&mut buf)?;
                let value = get_str(&mut buf, "feature value")?;
                annotation.features.insert(name, value);
            }
            annotations.push(annotation);
        }

        if buf.has_remaining() {
            return Err(CodecError::TrailingBytes(buf.remaining()));
        }

        Ok(Document {
            url,
            raw_content,
            text,
            content_type,
            metadata,
            annotations,
        })
    }

    fn put_name(&self, buf: &mut Vec<u8>, name: &str) -> Result<(), CodecError> {
        match self.lexicon {
            Some(ref lexicon) => {
                let id = lexicon
                    .id(name)
                    .ok_or_else(|| CodecError::NotInLexicon(name.to_string()))?;
                buf.put_u32(id);
                Ok(())
            }
            None => put_str(buf, name, "name"),
        }
    }

    fn get_name(&self, buf: &mut &[u8]) -> Result<String, CodecError> {
        match self.lexicon {
            Some(ref lexicon) => {
                let id = get_u32(buf)?;
                lexicon
                    .get(id)
                    .map(str::to_string)
                    .ok_or(CodecError::UnknownId(id))
            }
            None => get_str(buf, "name"),
        }
    }
}

fn to_u32(n: usize, what: &'static str) -> Result<u32, CodecError> {
    u32::try_from(n).map_err(|_| CodecError::TooLarge(what))
}

fn put_str(buf: &mut Vec<u8>, s: &str, what: &'static str) -> Result<(), CodecError> {
    buf.put_u32(to_u32(s.len(), what)?);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn put_optional_bytes(
    buf: &mut Vec<u8>,
    bytes: Option<&[u8]>,
    what: &'static str,
) -> Result<(), CodecError> {
    match bytes {
        Some(bytes) => {
            let len = i32::try_from(bytes.len()).map_err(|_| CodecError::TooLarge(what))?;
            buf.put_i32(len);
            buf.put_slice(bytes);
        }
        None => buf.put_i32(ABSENT),
    }
    Ok(())
}

fn ensure(buf: &&[u8], needed: usize) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn get_u8(buf: &mut &[u8]) -> Result<u8, CodecError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut &[u8]) -> Result<u32, CodecError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

fn get_bytes(buf: &mut &[u8], len: usize) -> Result<Vec<u8>, CodecError> {
    ensure(buf, len)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn get_str(buf: &mut &[u8], what: &'static str) -> Result<String, CodecError> {
    let len = get_u32(buf)? as usize;
    String::from_utf8(get_bytes(buf, len)?).map_err(|_| CodecError::InvalidUtf8(what))
}

fn get_optional_bytes(buf: &mut &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
    ensure(buf, 4)?;
    let len = buf.get_i32();
    if len == ABSENT {
        return Ok(None);
    }
    let len = usize::try_from(len).map_err(|_| CodecError::InvalidLength(len))?;
    get_bytes(buf, len).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut doc = Document::from_content(
            "http://example.com/people",
            b"<p>John met Mary</p>".to_vec(),
            Some("text/html".to_string()),
        )
        .with_text("John met Mary");
        doc.metadata.add("lang", "en");
        doc.metadata.add("lang", "fr");
        doc.metadata.set("warc.date", "2024-01-01T00:00:00Z");
        doc.annotate(Annotation::new("Person", 9, 13).with_feature("gender", "female"));
        doc.annotate(Annotation::new("Person", 0, 4).with_feature("gender", "male"));
        doc
    }

    fn lexicon() -> Arc<Lexicon> {
        Arc::new(Lexicon::new(["Person", "gender"]))
    }

    #[test]
    fn test_literal_roundtrip() {
        let codec = RecordCodec::literal();
        let doc = sample();
        let bytes = codec.encode(&doc).unwrap();
        assert_eq!(bytes[0], MODE_LITERAL);
        assert_eq!(codec.decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_lexicon_roundtrip_is_smaller() {
        let doc = sample();
        let literal = RecordCodec::literal().encode(&doc).unwrap();

        let codec = RecordCodec::with_lexicon(lexicon());
        let compact = codec.encode(&doc).unwrap();
        assert!(compact.len() < literal.len());
        assert_eq!(codec.decode(&compact).unwrap(), doc);
    }

    #[test]
    fn test_independent_readers_agree() {
        let writer = RecordCodec::with_lexicon(Arc::new(Lexicon::new(["gender", "Person"])));
        let reader = RecordCodec::with_lexicon(Arc::new(Lexicon::new(["Person", "gender"])));
        let bytes = writer.encode(&sample()).unwrap();
        assert_eq!(reader.decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_absent_optionals() {
        let doc = Document::new("u");
        let codec = RecordCodec::literal();
        let back = codec.decode(&codec.encode(&doc).unwrap()).unwrap();
        assert_eq!(back.raw_content, None);
        assert_eq!(back.text, None);
        assert_eq!(back.content_type, None);

        let empty = Document {
            raw_content: Some(Vec::new()),
            text: Some(String::new()),
            ..Document::new("u")
        };
        let back = codec.decode(&codec.encode(&empty).unwrap()).unwrap();
        assert_eq!(back.raw_content, Some(Vec::new()));
        assert_eq!(back.text, Some(String::new()));
    }

    #[test]
    fn test_name_missing_from_lexicon() {
        let mut doc = sample();
        doc.annotate(Annotation::new("Token", 0, 4));
        let err = RecordCodec::with_lexicon(lexicon()).encode(&doc).unwrap_err();
        assert!(matches!(err, CodecError::NotInLexicon(ref name) if name == "Token"));
    }

    #[test]
    fn test_mode_mismatch() {
        let bytes = RecordCodec::literal().encode(&sample()).unwrap();
        let err = RecordCodec::with_lexicon(lexicon()).decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ModeMismatch {
                expected: "lexicon",
                found: "literal"
            }
        ));
    }

    #[test]
    fn test_unknown_id() {
        let codec = RecordCodec::with_lexicon(lexicon());
        let bytes = codec.encode(&sample()).unwrap();
        let smaller = RecordCodec::with_lexicon(Arc::new(Lexicon::new(["Person"])));
        assert!(matches!(smaller.decode(&bytes), Err(CodecError::UnknownId(1))));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let codec = RecordCodec::literal();
        let bytes = codec.encode(&sample()).unwrap();

        let err = codec.decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));

        let mut extended = bytes.clone();
        extended.extend_from_slice(&[0, 0]);
        assert!(matches!(
            codec.decode(&extended),
            Err(CodecError::TrailingBytes(2))
        ));
    }
}
