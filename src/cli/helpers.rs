//! Shared helper functions for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::codec::{RecordCodec, RecordReader, RecordWriter};
use crate::filter::Lexicon;
use crate::ingest::IngestError;
use crate::models::Document;

/// Truncate to at most `max` bytes, on a char boundary, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Spinner on stderr with a message line.
pub fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {pos} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Open record files for reading with the configured lexicon.
pub fn open_readers(
    paths: &[PathBuf],
    lexicon: &Arc<Lexicon>,
) -> anyhow::Result<Vec<RecordReader<std::io::BufReader<std::fs::File>>>> {
    paths
        .iter()
        .map(|path| {
            let path = expand_path(path);
            RecordReader::open(&path, Some(lexicon.clone()))
                .with_context(|| format!("Failed to open record file {}", path.display()))
        })
        .collect()
}

/// Counts from writing an ingestion source to a record file.
#[derive(Debug, Default)]
pub struct IngestCounts {
    pub written: u64,
    pub errors: u64,
}

/// Write every document from `source` to a literal-mode record file.
/// Source errors are reported and skipped.
pub fn write_source<I>(source: I, output: &Path, pb: &ProgressBar) -> anyhow::Result<IngestCounts>
where
    I: Iterator<Item = Result<Document, IngestError>>,
{
    let mut writer = RecordWriter::create(output, RecordCodec::literal())
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut counts = IngestCounts::default();

    for item in source {
        match item {
            Ok(doc) => {
                pb.set_message(truncate(&doc.url, 60));
                writer.write(&doc)?;
                pb.inc(1);
                counts.written += 1;
            }
            Err(e) => {
                pb.println(format!("{} {}", console::style("✗").red(), e));
                counts.errors += 1;
            }
        }
    }

    writer.finish()?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("ééééé", 6), "é...");
    }
}
