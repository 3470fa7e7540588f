//! Tile subcommand
//!
//! Split a raster into `ceil(sqrt(n))²` tiles written by a pool of workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rastertiles::{
    CancellationToken, Compression, GdalStyleProgress, NoProgress, ProgressObserver,
    TileScheduler, TileStatus, default_engine,
};

use crate::{CommandResult, Completion, default_workers};

#[derive(Parser, Debug)]
#[command(about = "Split a raster into tiles processed in parallel")]
pub struct Args {
    /// Raster to split
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Folder for the tiles [default: <source stem>_tiles next to the source]
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Requested number of tiles, rounded up to the next square
    #[arg(short = 'n', long)]
    tiles: usize,

    /// Concurrent tile jobs [default: available cores]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Mark a tile as failed after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Tile compression: none, lzw, deflate or jpeg
    #[arg(long, default_value = "none")]
    compress: Compression,

    /// Do not draw the progress meter
    #[arg(short, long)]
    quiet: bool,
}

/// `dem.tif` -> `dem_tiles` in the same folder.
fn default_output(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map_or_else(|| "raster".into(), |s| s.to_string_lossy());
    source.with_file_name(format!("{stem}_tiles"))
}

pub async fn run(args: Args) -> CommandResult {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.source));
    let workers = args.workers.unwrap_or_else(default_workers);

    // Ctrl-C stops dispatching new tiles; running ones finish.
    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing running tiles");
            interrupt.cancel();
        }
    });

    let observer: Arc<dyn ProgressObserver> = if args.quiet {
        Arc::new(NoProgress)
    } else {
        Arc::new(GdalStyleProgress::stderr())
    };
    let mut scheduler = TileScheduler::new(default_engine())
        .cancellation(token)
        .observer(observer)
        .compression(args.compress);
    if let Some(secs) = args.timeout {
        scheduler = scheduler.timeout(Duration::from_secs(secs));
    }

    let run = scheduler
        .run(&args.source, &output, args.tiles, workers)
        .await?;

    for result in run.results() {
        if let TileStatus::Failed(err) = &result.status {
            eprintln!("tile {}: {err}", result.output_path.display());
        }
    }
    println!(
        "{} tiles in {}: {} written, {} skipped, {} failed",
        run.results().len(),
        output.display(),
        run.succeeded(),
        run.skipped(),
        run.failed()
    );

    Ok(Completion::from_counts(
        run.succeeded() + run.skipped(),
        run.failed(),
    ))
}
