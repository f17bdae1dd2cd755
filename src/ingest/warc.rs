//! WARC archive ingestion.
//!
//! Only `response` records with a 200 or 206 HTTP status become documents.
//! The HTTP headers are stripped from the body; the content type comes from
//! the `Content-Type` header or is guessed from the URL.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use regex::Regex;
use warc::{WarcHeader, WarcReader};

use crate::models::Document;

use super::IngestError;

/// Selection applied while reading archives.
#[derive(Debug, Clone, Default)]
pub struct WarcOptions {
    /// Only records whose target URI matches.
    pub filter: Option<Regex>,
    /// Stop after this many documents (0 = unlimited).
    pub limit: usize,
}

impl WarcOptions {
    pub fn new(filter: Option<&str>, limit: usize) -> Result<Self, IngestError> {
        Ok(Self {
            filter: filter.map(Regex::new).transpose()?,
            limit,
        })
    }
}

/// Counters for one ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarcStats {
    pub scanned: u64,
    pub filtered: u64,
    pub skipped: u64,
    pub malformed: u64,
    pub emitted: u64,
}

/// The parts of a WARC record ingestion looks at.
struct RawRecord {
    warc_type: Option<String>,
    target_uri: Option<String>,
    date: Option<String>,
    record_id: Option<String>,
    body: Vec<u8>,
}

type RecordIter = Box<dyn Iterator<Item = Result<RawRecord, String>> + Send>;

fn raw_records<R: BufRead + Send + 'static>(reader: WarcReader<R>) -> RecordIter {
    Box::new(reader.iter_records().map(|item| {
        item.map(|record| RawRecord {
            warc_type: record.header(WarcHeader::WarcType).map(|v| v.into_owned()),
            target_uri: record.header(WarcHeader::TargetURI).map(|v| v.into_owned()),
            date: record.header(WarcHeader::Date).map(|v| v.into_owned()),
            record_id: record.header(WarcHeader::RecordID).map(|v| v.into_owned()),
            body: record.body().to_vec(),
        })
        .map_err(|e| e.to_string())
    }))
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn open(path: &Path) -> Result<RecordIter, IngestError> {
    let open_err = |source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    };
    if is_gzip(path) {
        Ok(raw_records(WarcReader::from_path_gzip(path).map_err(open_err)?))
    } else {
        Ok(raw_records(WarcReader::from_path(path).map_err(open_err)?))
    }
}

/// Documents from one or more `.warc` / `.warc.gz` files, in file order.
///
/// A file that cannot be opened yields one `Err` and reading continues with
/// the next file.
pub struct WarcSource {
    pending: VecDeque<PathBuf>,
    current: Option<RecordIter>,
    options: WarcOptions,
    stats: WarcStats,
}

impl WarcSource {
    pub fn new(paths: Vec<PathBuf>, options: WarcOptions) -> Self {
        Self {
            pending: paths.into(),
            current: None,
            options,
            stats: WarcStats::default(),
        }
    }

    pub fn stats(&self) -> WarcStats {
        self.stats
    }

    fn limit_reached(&self) -> bool {
        self.options.limit > 0 && self.stats.emitted >= self.options.limit as u64
    }

    /// Turn one record into a document, or `None` when it is skipped.
    fn convert(&mut self, record: RawRecord) -> Option<Document> {
        if record.warc_type.as_deref() != Some("response") {
            return None;
        }
        let target_uri = record.target_uri?;

        if let Some(ref regex) = self.options.filter {
            if !regex.is_match(&target_uri) {
                self.stats.filtered += 1;
                return None;
            }
        }

        let Some((headers, content)) = parse_http_response(&record.body) else {
            tracing::debug!("Could not parse HTTP response for {}", target_uri);
            self.stats.skipped += 1;
            return None;
        };
        if !headers.status_ok() || content.is_empty() {
            self.stats.skipped += 1;
            return None;
        }

        let content_type = headers
            .content_type
            .clone()
            .unwrap_or_else(|| guess_mime_type(&target_uri));

        let mut doc = Document::from_content(&target_uri, content.to_vec(), Some(content_type));
        super::stamp_content_hash(&mut doc);
        if let Some(date) = record.date {
            doc.metadata.set("warc.date", date);
        }
        if let Some(id) = record.record_id {
            doc.metadata.set("warc.record_id", id);
        }
        if let Some(status) = headers.status {
            doc.metadata.set("http.status", status.to_string());
        }
        Some(doc)
    }
}

impl Iterator for WarcSource {
    type Item = Result<Document, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.limit_reached() {
                return None;
            }

            let Some(records) = self.current.as_mut() else {
                let path = self.pending.pop_front()?;
                tracing::info!("Reading WARC file {}", path.display());
                match open(&path) {
                    Ok(records) => self.current = Some(records),
                    Err(e) => return Some(Err(e)),
                }
                continue;
            };

            let Some(item) = records.next() else {
                self.current = None;
                continue;
            };
            self.stats.scanned += 1;

            let record = match item {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("Skipping malformed record: {}", e);
                    self.stats.malformed += 1;
                    continue;
                }
            };

            if let Some(doc) = self.convert(record) {
                self.stats.emitted += 1;
                return Some(Ok(doc));
            }
        }
    }
}

/// HTTP response headers extracted from a WARC body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseHeaders {
    pub status: Option<u16>,
    pub content_type: Option<String>,
}

impl HttpResponseHeaders {
    pub fn status_ok(&self) -> bool {
        matches!(self.status, Some(200) | Some(206))
    }
}

/// Parse an HTTP response from WARC body bytes.
/// Returns (headers, body content) if successful.
pub fn parse_http_response(data: &[u8]) -> Option<(HttpResponseHeaders, &[u8])> {
    let separator = b"\r\n\r\n";
    let sep_pos = data.windows(separator.len()).position(|w| w == separator)?;

    let header_bytes = &data[..sep_pos];
    let body = &data[sep_pos + separator.len()..];

    let header_str = std::str::from_utf8(header_bytes).ok()?;
    let mut lines = header_str.lines();

    // "HTTP/1.1 200 OK"
    let status_line = lines.next()?;
    if !status_line.starts_with("HTTP/") {
        return None;
    }
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok());

    let mut content_type = None;
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-type") {
                let value = value.trim();
                // Just the MIME type, not charset etc.
                content_type = value
                    .split(';')
                    .next()
                    .map(|v| v.trim().to_ascii_lowercase())
                    .filter(|v| !v.is_empty());
            }
        }
    }

    Some((
        HttpResponseHeaders {
            status,
            content_type,
        },
        body,
    ))
}

/// Guess MIME type from the URL path's extension.
pub fn guess_mime_type(uri: &str) -> String {
    let path = url::Url::parse(uri)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| uri.split(['?', '#']).next().unwrap_or(uri).to_string());
    mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}
