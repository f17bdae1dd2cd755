//! Local file ingestion.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::models::Document;

use super::IngestError;

/// Documents from local files. Directories are walked recursively, entries
/// in name order.
pub struct FileSource {
    pending: VecDeque<PathBuf>,
    limit: usize,
    emitted: usize,
}

impl FileSource {
    pub fn new(paths: Vec<PathBuf>, limit: usize) -> Self {
        Self {
            pending: paths.into(),
            limit,
            emitted: 0,
        }
    }

    /// Queue a directory's entries ahead of the remaining paths.
    fn expand_dir(&mut self, dir: &Path) -> Result<(), IngestError> {
        let mut entries = std::fs::read_dir(dir)
            .map_err(|source| IngestError::Open {
                path: dir.to_path_buf(),
                source,
            })?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        for entry in entries.into_iter().rev() {
            self.pending.push_front(entry);
        }
        Ok(())
    }
}

impl Iterator for FileSource {
    type Item = Result<Document, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.limit > 0 && self.emitted >= self.limit {
                return None;
            }
            let path = self.pending.pop_front()?;
            if path.is_dir() {
                if let Err(e) = self.expand_dir(&path) {
                    return Some(Err(e));
                }
                continue;
            }
            let result = read_document(&path);
            if result.is_ok() {
                self.emitted += 1;
            }
            return Some(result);
        }
    }
}

/// Read one file into a document.
///
/// The url is the `file://` URL of the absolute path. The content type is
/// sniffed from the bytes, falling back to the extension.
pub fn read_document(path: &Path) -> Result<Document, IngestError> {
    let open_err = |source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    };
    let absolute = std::fs::canonicalize(path).map_err(open_err)?;
    let content = std::fs::read(&absolute).map_err(open_err)?;
    let fs_meta = std::fs::metadata(&absolute).map_err(open_err)?;

    let url = url::Url::from_file_path(&absolute)
        .map_err(|_| IngestError::FileUrl(absolute.clone()))?;

    let content_type = detect_content_type(&absolute, &content);
    let size = content.len();
    let mut doc = Document::from_content(url.as_str(), content, content_type);
    super::stamp_content_hash(&mut doc);

    if let Some(name) = absolute.file_name().and_then(|n| n.to_str()) {
        doc.metadata.set("file.name", name);
    }
    doc.metadata.set("file.size", size.to_string());
    if let Ok(modified) = fs_meta.modified() {
        let modified: DateTime<Utc> = modified.into();
        doc.metadata.set("file.modified", modified.to_rfc3339());
    }
    Ok(doc)
}

fn detect_content_type(path: &Path, content: &[u8]) -> Option<String> {
    infer::get(content)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| mime_guess::from_path(path).first_raw().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "hello").unwrap();

        let doc = read_document(&path).unwrap();
        assert!(doc.url.starts_with("file:///"));
        assert!(doc.url.ends_with("/note.txt"));
        assert_eq!(doc.raw_content.as_deref(), Some(&b"hello"[..]));
        assert_eq!(doc.content_type.as_deref(), Some("text/plain"));
        assert_eq!(doc.metadata.first("file.name"), Some("note.txt"));
        assert_eq!(doc.metadata.first("file.size"), Some("5"));
        assert!(doc.metadata.contains_key("file.modified"));
        assert_eq!(
            doc.metadata.first(crate::ingest::CONTENT_HASH_KEY),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
    }

    #[test]
    fn test_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();

        let doc = read_document(&path).unwrap();
        assert_eq!(doc.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_walks_directories_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), "c").unwrap();

        let names: Vec<String> = FileSource::new(vec![dir.path().to_path_buf()], 0)
            .map(|doc| doc.unwrap().metadata.first("file.name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);

        let limited = FileSource::new(vec![dir.path().to_path_buf()], 2).count();
        assert_eq!(limited, 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileSource::new(vec![dir.path().join("missing")], 0);
        assert!(matches!(source.next(), Some(Err(IngestError::Open { .. }))));
        assert!(source.next().is_none());
    }
}
