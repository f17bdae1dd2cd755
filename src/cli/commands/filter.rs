//! Filter a record file into a compact lexicon-mode record file.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::cli::helpers::{expand_path, spinner, truncate};
use crate::codec::{RecordCodec, RecordReader, RecordWriter};
use crate::config::Config;
use crate::pipeline::{CounterReporter, Pipeline};

#[derive(Debug, Default)]
struct FilterCounts {
    read: u64,
    written: u64,
    rejected: u64,
    dropped: u64,
    failed: u64,
}

/// Run processors, the document filter and annotation restriction over
/// `input`, writing accepted documents to `output` with lexicon ids.
pub async fn cmd_filter(config: &Config, input: &Path, output: &Path) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    let lexicon = Arc::new(pipeline.lexicon().clone());
    let input = expand_path(input);
    let output = expand_path(output);

    let reader = RecordReader::open(&input, Some(lexicon.clone()))
        .with_context(|| format!("Failed to open record file {}", input.display()))?;
    let mut chain = pipeline.processor_chain()?;

    println!(
        "{} Filtering {} into {} ({} lexicon entries)",
        style("→").cyan(),
        input.display(),
        output.display(),
        lexicon.len()
    );

    let pb = spinner();
    let worker_pb = pb.clone();
    let counts = tokio::task::spawn_blocking(move || -> anyhow::Result<FilterCounts> {
        let mut writer = RecordWriter::create(&output, RecordCodec::with_lexicon(lexicon))
            .with_context(|| format!("Failed to create {}", output.display()))?;
        let reporter = CounterReporter::new();
        let mut counts = FilterCounts::default();

        for item in reader {
            let doc = item?;
            counts.read += 1;
            worker_pb.set_message(truncate(&doc.url, 60));
            worker_pb.inc(1);

            let url = doc.url.clone();
            match pipeline.sieve(&mut chain, doc, &reporter) {
                Ok(sieved) => {
                    if sieved.is_dropped() {
                        counts.dropped += 1;
                    }
                    counts.rejected += sieved.rejected.len() as u64;
                    for mut doc in sieved.accepted {
                        // Names outside the lexicon cannot be encoded.
                        pipeline.annotation_filter().apply_to(&mut doc);
                        writer.write(&doc)?;
                        counts.written += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to process {}: {}", url, e);
                    worker_pb.println(format!("{} {}: {}", style("✗").red(), url, e));
                    counts.failed += 1;
                }
            }
        }

        chain.close()?;
        writer.finish()?;
        Ok(counts)
    })
    .await??;
    pb.finish_and_clear();

    println!("{} Filter complete:", style("✓").green());
    println!("  Documents read:     {}", counts.read);
    println!("  Documents written:  {}", style(counts.written).green());
    println!("  Rejected:           {}", style(counts.rejected).yellow());
    println!("  Dropped:            {}", style(counts.dropped).dim());
    if counts.failed > 0 {
        println!("  Failed:             {}", style(counts.failed).red());
    }

    Ok(())
}
