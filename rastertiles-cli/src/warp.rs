//! Warp subcommand
//!
//! Resample a raster onto a template grid or explicit CRS, bounds and resolution.

use std::path::PathBuf;

use clap::Parser;
use rastertiles::{Compression, Crs, DataType, Extent, GeoEngine, WarpOptions, default_engine};

use crate::{CommandResult, Completion};

#[derive(Parser, Debug)]
#[command(about = "Resample a raster onto a new grid or CRS")]
pub struct Args {
    #[arg(value_name = "SRC")]
    source: PathBuf,

    #[arg(value_name = "DST")]
    destination: PathBuf,

    /// Take CRS, bounds and resolution from this raster; other flags override it
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Target CRS (EPSG:<code>, PROJ string or WKT)
    #[arg(long, allow_hyphen_values = true)]
    crs: Option<Crs>,

    /// Target pixel size as X,Y
    #[arg(long, value_name = "X,Y", value_parser = parse_resolution)]
    resolution: Option<(f64, f64)>,

    /// Target bounds as XMIN,YMIN,XMAX,YMAX in target units
    #[arg(long, value_name = "XMIN,YMIN,XMAX,YMAX", allow_hyphen_values = true, value_parser = parse_bounds)]
    bounds: Option<Extent>,

    /// Output cell type [default: source type]
    #[arg(long = "type")]
    data_type: Option<DataType>,

    /// Fill value for cells outside the source [default: source no-data]
    #[arg(long, allow_hyphen_values = true)]
    nodata: Option<f64>,

    /// Output compression: none, lzw, deflate or jpeg
    #[arg(long, default_value = "none")]
    compress: Compression,

    /// Replace an existing destination
    #[arg(long)]
    overwrite: bool,
}

fn parse_numbers<const N: usize>(value: &str) -> Result<[f64; N], String> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| format!("'{part}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    numbers
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected {N} comma-separated numbers, got {}", v.len()))
}

pub fn parse_resolution(value: &str) -> Result<(f64, f64), String> {
    let [x, y] = parse_numbers::<2>(value)?;
    Ok((x, y))
}

pub fn parse_bounds(value: &str) -> Result<Extent, String> {
    let [xmin, ymin, xmax, ymax] = parse_numbers::<4>(value)?;
    Extent::new(xmin, ymin, xmax, ymax).map_err(|e| e.to_string())
}

pub fn run(args: Args) -> CommandResult {
    let engine = default_engine();
    let mut options = match &args.template {
        Some(template) => WarpOptions::from_template(&engine.open_grid(template)?)?,
        None => WarpOptions::default(),
    };
    if let Some(crs) = args.crs {
        options = options.target_crs(crs);
    }
    if let Some((x, y)) = args.resolution {
        options = options.resolution(x, y)?;
    }
    if let Some(bounds) = args.bounds {
        options = options.bounds(bounds);
    }
    if let Some(data_type) = args.data_type {
        options = options.output_type(data_type);
    }
    if let Some(nodata) = args.nodata {
        options = options.nodata(nodata);
    }
    options = options.compression(args.compress);

    if rastertiles::warp(
        &engine,
        &args.source,
        &args.destination,
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
