//! Rasterize subcommand

use std::path::PathBuf;

use clap::Parser;
use rastertiles::{Compression, DataType, GeoEngine, RasterizeOptions, default_engine};

use crate::{CommandResult, Completion};

#[derive(Parser, Debug)]
#[command(about = "Burn a vector attribute into a raster")]
pub struct Args {
    /// Vector layer to burn
    #[arg(value_name = "SRC")]
    source: PathBuf,

    #[arg(value_name = "DST")]
    destination: PathBuf,

    /// Numeric attribute whose value is burned into each cell
    #[arg(short, long)]
    attribute: String,

    /// Raster whose grid and CRS the output copies
    #[arg(short, long, value_name = "FILE")]
    template: PathBuf,

    /// Burn every cell a shape touches
    #[arg(long)]
    all_touched: bool,

    /// Value of cells no shape covers
    #[arg(long, default_value_t = -9999.0, allow_hyphen_values = true)]
    nodata: f64,

    #[arg(long = "type", default_value = "float32")]
    data_type: DataType,

    #[arg(long, default_value = "none")]
    compress: Compression,

    /// Replace an existing destination
    #[arg(long)]
    overwrite: bool,
}

pub fn run(args: Args) -> CommandResult {
    let engine = default_engine();
    let grid = engine.open_grid(&args.template)?;
    let options = RasterizeOptions::new(args.attribute)
        .all_touched(args.all_touched)
        .nodata(args.nodata)
        .data_type(args.data_type)
        .compression(args.compress);

    if rastertiles::rasterize(
        &engine,
        &args.source,
        &args.destination,
        &grid,
        &options,
        args.overwrite,
    )? {
        println!("{}", args.destination.display());
    } else {
        println!(
            "{} exists, pass --overwrite to replace it",
            args.destination.display()
        );
    }
    Ok(Completion::Complete)
}
