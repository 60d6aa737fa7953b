//! fileflow - A resumable, batched, parallel file indexer.
//!
//! Usage:
//!   fileflow index [PATH]    Index a directory, resuming an interrupted scan
//!   fileflow status          Show scan and index state
//!   fileflow show            Print the stored index
//!   fileflow clear           Discard an interrupted scan
//!   fileflow --help          Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use fileflow_core::{IndexEvent, LogSink, RecordingSink};
use fileflow_scan::{IndexingEngine, ScanControl, spawn_indexing};
use fileflow_store::{CheckpointStore, IndexStore, Settings, discover_config_dir};

#[derive(Parser)]
#[command(
    name = "fileflow",
    version,
    about = "A resumable, batched, parallel file indexer",
    long_about = "fileflow fingerprints every file under a directory and keeps a \
                  checkpoint after each batch, so an interrupted scan resumes \
                  where it stopped.\n\n\
                  State lives in a `.fileflow` directory found in the working \
                  directory or one of its parents."
)]
struct Cli {
    /// Configuration directory (defaults to the nearest `.fileflow`)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a directory
    Index {
        /// Directory to index
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Ignore any interrupted scan and start over
        #[arg(long)]
        fresh: bool,

        /// Files per batch (overrides config.json)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Worker threads (overrides config.json)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Stop after this many seconds, keeping the checkpoint
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Show whether a scan is in progress and what the last index holds
    Status,

    /// Print the stored index
    Show {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Only show the first N files
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Discard an interrupted scan
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => {
            let cwd = std::env::current_dir().context("Cannot determine working directory")?;
            discover_config_dir(&cwd).context("Cannot locate configuration directory")?
        }
    };
    tracing::debug!(config_dir = %config_dir.display(), "using configuration directory");

    match cli.command {
        Command::Index {
            path,
            fresh,
            batch_size,
            workers,
            timeout,
        } => {
            let mut settings = Settings::load(&config_dir);
            if let Some(n) = batch_size {
                settings.batch_size = n.max(1);
            }
            if let Some(n) = workers {
                settings.thread_count = n.max(1);
            }
            run_index(&config_dir, path, &settings, fresh, timeout).await?;
        }
        Command::Status => run_status(&config_dir),
        Command::Show { format, limit } => run_show(&config_dir, format, limit)?,
        Command::Clear => run_clear(&config_dir),
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Index `path`, printing progress to stderr and a summary to stdout.
async fn run_index(
    config_dir: &Path,
    path: PathBuf,
    settings: &Settings,
    fresh: bool,
    timeout: Option<u64>,
) -> Result<()> {
    let sink = Arc::new(RecordingSink::new());
    let engine = IndexingEngine::new(settings, config_dir, sink.clone())
        .context("Failed to set up indexing")?;

    if fresh {
        engine.clear_checkpoint();
    }

    let mut control = ScanControl::new();
    if let Some(secs) = timeout {
        control = control.with_timeout(Duration::from_secs(secs));
    }

    eprintln!("Indexing {}...", path.display());

    // Enumeration walks the whole tree; keep it off the async workers.
    let (engine, run) = tokio::task::spawn_blocking({
        let control = control.clone();
        move || {
            let run = engine.resume_indexing(&path, control)?;
            Ok::<_, fileflow_core::IndexError>((engine, run))
        }
    })
    .await
    .context("Indexing task failed")?
    .context("Indexing failed")?;

    if run.start_index() > 0 {
        eprintln!(
            "Resuming: {} of {} files already done",
            run.start_index(),
            run.checkpoint().total_files
        );
    }

    let ctrl_c = {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping after the current batch...");
                control.cancel();
            }
        })
    };

    let mut events = spawn_indexing(run);
    let mut outcome = None;
    while let Some(event) = events.recv().await {
        match event {
            IndexEvent::BatchCompleted(progress) => {
                eprintln!(
                    "  batch {}/{}: {}/{} files ({:.1}%)",
                    progress.current_batch,
                    progress.total_batches,
                    progress.processed_files,
                    progress.total_files,
                    progress.percent()
                );
            }
            terminal => outcome = Some(terminal),
        }
    }
    ctrl_c.abort();

    println!();
    println!("{}", "─".repeat(60));
    match outcome {
        Some(IndexEvent::ScanCompleted(summary)) => {
            let total_size = engine
                .index_store()
                .load()
                .map_or(0, |index| index.total_size());
            println!(" {}", summary.summary());
            println!(" {} indexed", format_size(total_size));
            println!(" Finished in {:.2}s", summary.elapsed.as_secs_f64());
            if !summary.index_saved {
                println!(" The index could not be saved; run again to retry");
            }
        }
        Some(IndexEvent::ScanCancelled { progress, reason }) => {
            println!(
                " Scan {reason} at {}/{} files ({:.1}%)",
                progress.processed_files,
                progress.total_files,
                progress.percent()
            );
            println!(" Run `fileflow index` again to resume");
        }
        Some(IndexEvent::BatchCompleted(_)) | None => {
            println!(" Scan ended unexpectedly; run again to resume");
        }
    }
    println!("{}", "─".repeat(60));

    if !sink.is_empty() {
        println!();
        println!("{} warning(s) during scan", sink.len());
        for entry in sink.entries().iter().take(10) {
            println!("  {}", entry.user_message);
        }
    }

    Ok(())
}

/// Show the checkpoint and index state.
fn run_status(config_dir: &Path) {
    let sink = Arc::new(LogSink);
    let checkpoints = CheckpointStore::new(config_dir, sink.clone());
    let index = IndexStore::new(config_dir, sink);

    println!("Configuration: {}", config_dir.display());

    match checkpoints.load() {
        Some(cp) => {
            let root = cp
                .root
                .as_deref()
                .map_or_else(|| "unknown directory".to_string(), |p| p.display().to_string());
            println!(
                "Scan in progress: {root}, {}/{} files ({:.1}%), batch {}/{}, started {}",
                cp.processed_count(),
                cp.total_files,
                cp.percent(),
                cp.current_batch,
                cp.total_batches,
                cp.started_at.to_rfc3339()
            );
        }
        None => println!("No scan in progress"),
    }

    match index.load() {
        Some(index) => println!(
            "Last index: {} files, {}, written {}",
            index.file_count,
            format_size(index.total_size()),
            index.indexed_at.to_rfc3339()
        ),
        None => println!("No index yet"),
    }
}

/// Print the stored index.
fn run_show(config_dir: &Path, format: OutputFormat, limit: Option<usize>) -> Result<()> {
    let store = IndexStore::new(config_dir, Arc::new(LogSink));
    let Some(mut index) = store.load() else {
        eprintln!("No index yet. Run `fileflow index` first.");
        return Ok(());
    };
    let total_size = index.total_size();
    if let Some(n) = limit {
        index.files.truncate(n);
    }

    match format {
        OutputFormat::Text => {
            for record in &index.files {
                let short = record.fingerprint.get(..12).unwrap_or(&record.fingerprint);
                println!(
                    "{:>10}  {}  {}",
                    format_size(record.size_bytes),
                    short,
                    record.relative_path
                );
            }
            println!();
            println!(
                "{} files, {} total, indexed {}",
                index.file_count,
                format_size(total_size),
                index.indexed_at.to_rfc3339()
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&index)?);
        }
    }

    Ok(())
}

/// Remove the checkpoint.
fn run_clear(config_dir: &Path) {
    let checkpoints = CheckpointStore::new(config_dir, Arc::new(LogSink));
    if !checkpoints.exists() {
        println!("No scan in progress");
    } else if checkpoints.clear() {
        println!("Discarded the interrupted scan");
    } else {
        println!("Could not remove {}", checkpoints.path().display());
    }
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
