//! Ingestion commands: WARC archives and local files into record files.

use std::path::{Path, PathBuf};

use console::style;

use crate::cli::helpers::{expand_path, spinner, write_source};
use crate::ingest::{FileSource, WarcOptions, WarcSource};

/// Import response records from WARC archive files.
pub async fn cmd_ingest_warc(
    files: Vec<PathBuf>,
    output: &Path,
    filter: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let options = WarcOptions::new(filter, limit)?;
    let files: Vec<PathBuf> = files.iter().map(|f| expand_path(f)).collect();
    let output = expand_path(output);

    println!(
        "{} Importing {} WARC file(s) into {}",
        style("→").cyan(),
        files.len(),
        output.display()
    );

    let pb = spinner();
    let worker_pb = pb.clone();
    let (counts, stats) = tokio::task::spawn_blocking(move || {
        let mut source = WarcSource::new(files, options);
        let counts = write_source(source.by_ref(), &output, &worker_pb)?;
        Ok::<_, anyhow::Error>((counts, source.stats()))
    })
    .await??;
    pb.finish_and_clear();

    println!("\n{} Import complete:", style("✓").green());
    println!("  Records scanned:    {}", style(stats.scanned).dim());
    println!("  Documents written:  {}", style(counts.written).green());
    println!("  Records filtered:   {}", style(stats.filtered).dim());
    println!("  Records skipped:    {}", style(stats.skipped).dim());
    if stats.malformed > 0 {
        println!("  Malformed records:  {}", style(stats.malformed).yellow());
    }
    if counts.errors > 0 {
        println!("  Errors:             {}", style(counts.errors).red());
    }

    Ok(())
}

/// Import local files and directories.
pub async fn cmd_ingest_files(
    paths: Vec<PathBuf>,
    output: &Path,
    limit: usize,
) -> anyhow::Result<()> {
    let paths: Vec<PathBuf> = paths.iter().map(|p| expand_path(p)).collect();
    let output = expand_path(output);

    println!(
        "{} Importing files into {}",
        style("→").cyan(),
        output.display()
    );

    let pb = spinner();
    let worker_pb = pb.clone();
    let counts = tokio::task::spawn_blocking(move || {
        write_source(FileSource::new(paths, limit), &output, &worker_pb)
    })
    .await??;
    pb.finish_and_clear();

    println!(
        "{} Import complete: {} written",
        style("✓").green(),
        style(counts.written).green()
    );
    if counts.errors > 0 {
        println!("  Errors: {}", style(counts.errors).red());
    }

    Ok(())
}
