//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod dump;
mod filter;
mod ingest;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_config, LoadOptions};

#[derive(Parser)]
#[command(name = "docsieve")]
#[command(about = "Filter, annotate and project web documents for indexing")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "DOCSIEVE_CONFIG")]
    config: Option<PathBuf>,

    /// Override a configuration option, e.g. --set keep.lang=en (repeatable)
    #[arg(short, long = "set", global = true, value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Convert external sources into a record file
    Ingest {
        #[command(subcommand)]
        command: IngestCommands,
    },

    /// Run the full pipeline over record files and write projected fields
    Run {
        /// Record files to process
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output file for JSON lines (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of workers (default: pipeline.workers)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Apply processors and filters, writing a compact lexicon-mode record file
    Filter {
        /// Input record file
        input: PathBuf,
        /// Output record file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print records as JSON, one per line
    Dump {
        /// Record file to read
        input: PathBuf,
        /// Limit number of records (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Include raw content (base64)
        #[arg(long)]
        raw: bool,
    },

    /// Show the lexicon derived from the annotation configuration
    Lexicon,

    /// Show the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum IngestCommands {
    /// Import response records from WARC files (.warc or .warc.gz)
    Warc {
        /// WARC files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output record file
        #[arg(short, long)]
        output: PathBuf,
        /// Only import URLs matching this regex pattern
        #[arg(long)]
        filter: Option<String>,
        /// Limit number of documents (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// Import local files and directories
    Files {
        /// Files or directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output record file
        #[arg(short, long)]
        output: PathBuf,
        /// Limit number of documents (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        overrides: cli.set,
    };
    let config = load_config(&options).await?;

    match cli.command {
        Commands::Ingest { command } => match command {
            IngestCommands::Warc {
                files,
                output,
                filter,
                limit,
            } => ingest::cmd_ingest_warc(files, &output, filter.as_deref(), limit).await,
            IngestCommands::Files {
                paths,
                output,
                limit,
            } => ingest::cmd_ingest_files(paths, &output, limit).await,
        },
        Commands::Run {
            inputs,
            output,
            workers,
        } => run::cmd_run(&config, &inputs, output.as_deref(), workers).await,
        Commands::Filter { input, output } => filter::cmd_filter(&config, &input, &output).await,
        Commands::Dump { input, limit, raw } => dump::cmd_dump(&config, &input, limit, raw).await,
        Commands::Lexicon => config_cmd::cmd_lexicon(&config),
        Commands::Config => config_cmd::cmd_config(&config),
    }
}
