#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use rastertiles::{CellGrid, Crs, DataType, GeoEngine, GridSpec, Raster, TiffEngine, WriteOptions};

pub fn rastertiles() -> Command {
    let mut cmd = cargo_bin_cmd!("rastertiles");
    cmd.env("RUST_LOG", "warn");
    cmd
}

/// Writes a 4x4 Float32 raster (cells 0..16) with 10 m pixels in UTM 10N.
pub fn write_fixture(dir: &Path, name: &str) -> PathBuf {
    let values = (0..16).map(f64::from).collect();
    let spec = GridSpec::north_up(0.0, 40.0, 10.0, 10.0, 4, 4, Some(Crs::Epsg(32610)));
    write(dir, name, spec, values, Some(-9999.0), DataType::Float32)
}

/// Writes a 2x2 Byte land-cover raster `[[1, 2], [3, 255]]` with no-data 255.
pub fn write_categories(dir: &Path, name: &str) -> PathBuf {
    let spec = GridSpec::north_up(0.0, 20.0, 10.0, 10.0, 2, 2, Some(Crs::Epsg(5070)));
    write(dir, name, spec, vec![1.0, 2.0, 3.0, 255.0], Some(255.0), DataType::Byte)
}

fn write(
    dir: &Path,
    name: &str,
    spec: GridSpec,
    values: Vec<f64>,
    nodata: Option<f64>,
    data_type: DataType,
) -> PathBuf {
    let cells = CellGrid::new(spec.width(), spec.height(), values).unwrap();
    let raster = Raster::new(spec, cells, nodata, data_type).unwrap();
    let path = dir.join(name);
    TiffEngine::new()
        .write_raster(&path, &raster, &WriteOptions::from_template(&raster))
        .unwrap();
    path
}

pub fn read(path: &Path) -> Raster {
    TiffEngine::new().open_raster(path).unwrap()
}
