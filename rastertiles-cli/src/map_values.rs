//! Map-values subcommand
//!
//! Apply one JSON value map to many rasters.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rastertiles::{Compression, DataType, LogProgress, MapOutcome, ValueMap, ValueMapper, default_engine};

use crate::{CommandResult, Completion, default_workers};

#[derive(Parser, Debug)]
#[command(about = "Replace categorical cell values using a JSON value map")]
pub struct Args {
    /// Rasters to remap
    #[arg(value_name = "SOURCES", required = true)]
    sources: Vec<PathBuf>,

    /// Folder for the remapped rasters; outputs keep their source file names
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// JSON map, `{"1": 10}` or `{"values": {"1": 10}, "fallback": -9999}`
    #[arg(short, long, value_name = "FILE")]
    map: PathBuf,

    /// Value for cells missing from the map; overrides the map file
    #[arg(long, allow_hyphen_values = true)]
    fallback: Option<f64>,

    /// Concurrent files [default: available cores]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output cell type
    #[arg(long = "type", default_value = "float32")]
    data_type: DataType,

    /// Output compression: none, lzw, deflate or jpeg
    #[arg(long, default_value = "none")]
    compress: Compression,
}

pub async fn run(args: Args) -> CommandResult {
    let mut map = ValueMap::from_json_file(&args.map)?;
    if let Some(fallback) = args.fallback {
        map = map.with_fallback(fallback);
    }
    let mapper = ValueMapper::new(default_engine(), map)
        .data_type(args.data_type)
        .compression(args.compress)
        .observer(Arc::new(LogProgress::new("map-values")));

    let workers = args.workers.unwrap_or_else(default_workers);
    let results = mapper
        .map_many(args.sources.clone(), &args.output, workers)
        .await?;

    let (mut written, mut skipped, mut failed) = (0, 0, 0);
    for (source, result) in args.sources.iter().zip(&results) {
        match result {
            Ok(MapOutcome::Written(_)) => written += 1,
            Ok(MapOutcome::Skipped(_)) => skipped += 1,
            Err(err) => {
                failed += 1;
                eprintln!("{}: {err}", source.display());
            }
        }
    }
    println!("{written} written, {skipped} skipped, {failed} failed");

    Ok(Completion::from_counts(written + skipped, failed))
}
