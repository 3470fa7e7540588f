//! Info subcommand
//!
//! Print the geometry and encoding of a raster.

use std::path::PathBuf;

use clap::Parser;
use rastertiles::{default_engine, read_band};

use crate::{CommandResult, Completion};

#[derive(Parser, Debug)]
#[command(about = "Print the grid, CRS and encoding of a raster")]
pub struct Args {
    #[arg(value_name = "RASTER")]
    path: PathBuf,

    /// Band to describe, counting from 1
    #[arg(short, long, default_value_t = 1)]
    band: usize,
}

pub fn run(args: Args) -> CommandResult {
    let raster = read_band(&default_engine(), &args.path, args.band)?;
    let spec = raster.spec();

    println!("size: {} x {}", spec.width(), spec.height());
    println!("origin: ({}, {})", spec.origin().0, spec.origin().1);
    println!(
        "pixel size: ({}, {})",
        spec.pixel_width(),
        spec.pixel_height()
    );
    if spec.is_rotated() {
        println!("rotation: ({}, {})", spec.rotation().0, spec.rotation().1);
    }
    println!(
        "crs: {}",
        spec.crs()
            .map_or_else(|| "none".to_string(), ToString::to_string)
    );
    println!("extent: {}", spec.extent()?);
    println!(
        "data type: {} ({})",
        raster.data_type(),
        raster.data_type().description()
    );
    println!(
        "nodata: {}",
        raster
            .nodata()
            .map_or_else(|| "none".to_string(), |v| v.to_string())
    );
    Ok(Completion::Complete)
}
