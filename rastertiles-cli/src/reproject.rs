//! Reproject subcommand

use std::path::PathBuf;

use clap::Parser;
use rastertiles::{Crs, default_engine};

use crate::{CommandResult, Completion};

#[derive(Parser, Debug)]
#[command(about = "Reproject a vector layer")]
pub struct Args {
    #[arg(value_name = "SRC")]
    source: PathBuf,

    #[arg(value_name = "DST")]
    destination: PathBuf,

    /// Target CRS (EPSG:<code>, PROJ string or WKT)
    #[arg(long, allow_hyphen_values = true)]
    crs: Crs,
}

pub fn run(args: Args) -> CommandResult {
    rastertiles::reproject_vector(&default_engine(), &args.source, &args.destination, &args.crs)?;
    println!("{}", args.destination.display());
    Ok(Completion::Complete)
}
