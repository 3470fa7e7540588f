mod info;
mod map_values;
mod options;
mod rasterize;
mod reproject;
mod tile;
mod warp;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rastertiles")]
#[command(about = "Tile, warp, rasterize and remap georeferenced rasters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a raster into tiles processed in parallel
    Tile(tile::Args),
    /// Replace categorical cell values using a JSON value map
    MapValues(map_values::Args),
    /// Resample a raster onto a new grid or CRS
    Warp(warp::Args),
    /// Burn a vector attribute into a raster
    Rasterize(rasterize::Args),
    /// Reproject a vector layer
    Reproject(reproject::Args),
    /// Print the grid, CRS and encoding of a raster
    Info(info::Args),
    /// List the options an operation accepts
    Options(options::Args),
}

/// How a batch command ended when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every item was written or already present.
    Complete,
    /// Some items failed; the rest are on disk.
    Partial,
    /// Every item failed.
    Failed,
}

impl Completion {
    /// Classifies a batch from how many items ended on disk and how many failed.
    pub fn from_counts(done: usize, failed: usize) -> Self {
        match (done, failed) {
            (_, 0) => Completion::Complete,
            (0, _) => Completion::Failed,
            _ => Completion::Partial,
        }
    }
}

pub type CommandResult = Result<Completion, Box<dyn std::error::Error>>;

/// Worker count used when none is given.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logger from RUST_LOG environment variable
    // Example: RUST_LOG=debug rastertiles tile ...
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tile(args) => tile::run(args).await,
        Commands::MapValues(args) => map_values::run(args).await,
        Commands::Warp(args) => warp::run(args),
        Commands::Rasterize(args) => rasterize::run(args),
        Commands::Reproject(args) => reproject::run(args),
        Commands::Info(args) => info::run(args),
        Commands::Options(args) => options::run(&args),
    };

    match result {
        Ok(Completion::Complete) => ExitCode::SUCCESS,
        Ok(Completion::Partial) => ExitCode::from(2),
        Ok(Completion::Failed) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
