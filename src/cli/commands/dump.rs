//! Print record files as JSON.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::helpers::expand_path;
use crate::codec::RecordReader;
use crate::config::Config;
use crate::filter::AnnotationFilter;

/// Print up to `limit` records (0 = all), one JSON object per line.
pub async fn cmd_dump(config: &Config, input: &Path, limit: usize, raw: bool) -> anyhow::Result<()> {
    let input = expand_path(input);
    let lexicon = Arc::new(AnnotationFilter::from_config(config).lexicon().clone());
    let reader = RecordReader::open(&input, Some(lexicon))
        .with_context(|| format!("Failed to open record file {}", input.display()))?;

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for (index, item) in reader.enumerate() {
        if limit > 0 && index >= limit {
            break;
        }
        let mut doc = item?;
        if !raw {
            doc.raw_content = None;
        }
        serde_json::to_writer(&mut out, &doc)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    Ok(())
}
