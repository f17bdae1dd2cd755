//! Full pipeline run: record files in, projected fields out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use crate::cli::helpers::{expand_path, open_readers, spinner, truncate};
use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineEvent, PipelineRunner};
use crate::sink::{FieldSink, JsonLinesSink};

/// Run processors, filters and projection over record files.
///
/// Status goes to stderr so projections can stream to stdout.
pub async fn cmd_run(
    config: &Config,
    inputs: &[PathBuf],
    output: Option<&Path>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    let lexicon = Arc::new(pipeline.lexicon().clone());
    let readers = open_readers(inputs, &lexicon)?;

    let mut sink: Box<dyn FieldSink> = match output {
        Some(path) => Box::new(JsonLinesSink::create(&expand_path(path)).await?),
        None => Box::new(JsonLinesSink::stdout()),
    };

    let mut runner = PipelineRunner::new(pipeline);
    if let Some(n) = workers {
        runner = runner.with_workers(n);
    }

    let (event_tx, mut event_rx) = mpsc::channel::<PipelineEvent>(100);
    let pb = spinner();
    let event_pb = pb.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PipelineEvent::Started { workers } => {
                    event_pb.set_message(format!("Running with {} workers...", workers));
                }
                PipelineEvent::DocumentProjected { url }
                | PipelineEvent::DocumentRejected { url, .. }
                | PipelineEvent::DocumentDropped { url } => {
                    event_pb.set_message(truncate(&url, 60));
                    event_pb.inc(1);
                }
                PipelineEvent::DocumentFailed { url, error } => {
                    event_pb.println(format!("{} {}: {}", style("✗").red(), url, error));
                    event_pb.inc(1);
                }
                PipelineEvent::Complete(_) => event_pb.finish_and_clear(),
            }
        }
    });

    let input = readers.into_iter().flatten();
    let result = runner.run(input, sink.as_mut(), event_tx).await;
    let _ = event_handler.await;
    pb.finish_and_clear();
    let stats = result?;

    eprintln!("{} Run complete:", style("✓").green());
    eprintln!("  Documents read:     {}", stats.read);
    eprintln!("  Projected:          {}", style(stats.projected).green());
    eprintln!("  Rejected:           {}", style(stats.rejected).yellow());
    eprintln!("  Dropped:            {}", style(stats.dropped).dim());
    if stats.failed > 0 {
        eprintln!("  Failed:             {}", style(stats.failed).red());
    }
    for (counter, value) in runner.reporter().snapshot() {
        eprintln!("  {:<20}{}", counter, style(value).dim());
    }

    Ok(())
}
