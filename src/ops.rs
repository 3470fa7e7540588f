//! Single-file operations: read, write, warp, rasterize and reproject.
//!
//! Each writes through a temporary sibling, so a failed call leaves no partial
//! output behind. `warp` and `rasterize` respect an existing destination unless
//! asked to overwrite it.

use std::path::Path;

use crate::destination::{prepare, write_atomically};
use crate::engine::GeoEngine;
use crate::{
    Crs, GridSpec, Raster, RasterError, RasterResult, RasterizeOptions, WarpOptions,
    WriteOptions,
};

/// Reads the first band of the raster at `path`.
///
/// The declared no-data value is kept as is.
///
/// # Errors
///
/// Returns [`RasterError::UnreadableSource`] if the file cannot be opened.
pub fn read_raster<E: GeoEngine + ?Sized>(engine: &E, path: &Path) -> RasterResult<Raster> {
    engine.open_raster(path)
}

/// Reads band `band` (counting from 1) of the raster at `path`.
///
/// # Errors
///
/// Returns [`RasterError::UnreadableSource`] if the file cannot be opened and
/// [`RasterError::InvalidArgument`] if the raster has no such band.
pub fn read_band<E: GeoEngine + ?Sized>(
    engine: &E,
    path: &Path,
    band: usize,
) -> RasterResult<Raster> {
    engine.open_band(path, band)
}

/// Writes `raster` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`RasterError::WriteFailure`] if the file cannot be written.
pub fn write_raster<E: GeoEngine + ?Sized>(
    engine: &E,
    path: &Path,
    raster: &Raster,
    options: &WriteOptions,
) -> RasterResult<()> {
    write_atomically(path, |partial| engine.write_raster(partial, raster, options))
}

/// Warps `source` onto the grid described by `options`.
///
/// Returns `Ok(false)` without touching anything if `destination` exists and
/// `overwrite` is not set.
///
/// # Errors
///
/// Propagates engine errors and [`RasterError::WriteFailure`] if an existing
/// destination cannot be removed.
pub fn warp<E: GeoEngine + ?Sized>(
    engine: &E,
    source: &Path,
    destination: &Path,
    options: &WarpOptions,
    overwrite: bool,
) -> RasterResult<bool> {
    if !prepare(destination, overwrite)? {
        return Ok(false);
    }
    write_atomically(destination, |partial| {
        engine.warp_raster(source, partial, options)
    })?;
    log::info!("Warped {} -> {}", source.display(), destination.display());
    Ok(true)
}

/// Burns `options.attribute` of the vector layer at `source` into a raster on `grid`.
///
/// Features are reprojected into the grid's CRS first when the two differ.
/// Returns `Ok(false)` if `destination` exists and `overwrite` is not set.
///
/// # Errors
///
/// Returns [`RasterError::InvalidArgument`] if the layer has no such attribute,
/// and propagates engine read, reprojection and write errors.
pub fn rasterize<E: GeoEngine + ?Sized>(
    engine: &E,
    source: &Path,
    destination: &Path,
    grid: &GridSpec,
    options: &RasterizeOptions,
    overwrite: bool,
) -> RasterResult<bool> {
    if !prepare(destination, overwrite)? {
        return Ok(false);
    }

    let mut layer = engine.open_vector_layer(source)?;
    if !layer.fields.iter().any(|f| *f == options.attribute) {
        return Err(RasterError::invalid(format!(
            "{} has no attribute '{}' (available: {})",
            source.display(),
            options.attribute,
            layer.fields.join(", ")
        )));
    }
    if let (Some(from), Some(to)) = (&layer.crs, grid.crs())
        && from != to
    {
        log::debug!("Reprojecting {} from {from} to {to}", source.display());
        layer = engine.reproject_vector(&layer, to)?;
    }

    let cells = engine.rasterize_layer(&layer, grid, options)?;
    let raster = Raster::new(grid.clone(), cells, Some(options.nodata), options.data_type)?;
    let write = WriteOptions::default()
        .data_type(options.data_type)
        .nodata(Some(options.nodata))
        .compression(options.compression);
    write_atomically(destination, |partial| {
        engine.write_raster(partial, &raster, &write)
    })?;
    log::info!(
        "Rasterized {} features of {} -> {}",
        layer.len(),
        source.display(),
        destination.display()
    );
    Ok(true)
}

/// Reprojects every feature of the vector layer at `source` into `target` and
/// writes the result to `destination`, keeping all attributes.
///
/// # Errors
///
/// Propagates engine read, reprojection and write errors.
pub fn reproject_vector<E: GeoEngine + ?Sized>(
    engine: &E,
    source: &Path,
    destination: &Path,
    target: &Crs,
) -> RasterResult<()> {
    let layer = engine.open_vector_layer(source)?;
    let reprojected = engine.reproject_vector(&layer, target)?;
    engine.write_vector_layer(destination, &reprojected)?;
    log::info!(
        "Reprojected {} features to {target}: {}",
        reprojected.len(),
        destination.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use geo_types::{Geometry, Point};

    use super::*;
    use crate::tests::{PIXEL_SIZE, ScriptedEngine, write_fixture};
    use crate::{DataType, Extent, Feature, FieldValue, TiffEngine, VectorLayer};

    fn stations() -> VectorLayer {
        let mut layer = VectorLayer::new(Some(Crs::Epsg(4326)));
        layer.push(
            Feature::new(Geometry::Point(Point::new(5.0, 15.0)))
                .with_attribute("cost", FieldValue::Real(2.5)),
        );
        layer.push(
            Feature::new(Geometry::Point(Point::new(15.0, 5.0)))
                .with_attribute("cost", FieldValue::Integer(7)),
        );
        layer
    }

    fn grid() -> GridSpec {
        GridSpec::north_up(0.0, 20.0, 10.0, 10.0, 2, 2, Some(Crs::Epsg(4326)))
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TiffEngine::new();
        let source = read_raster(&engine, &write_fixture(dir.path(), "a.tif", 3, 2)).unwrap();
        let copy = dir.path().join("copy.tif");

        write_raster(&engine, &copy, &source, &WriteOptions::from_template(&source)).unwrap();
        assert_eq!(read_raster(&engine, &copy).unwrap(), source);
    }

    #[test]
    fn test_read_band_beyond_count() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TiffEngine::new();
        let path = write_fixture(dir.path(), "a.tif", 2, 2);

        assert_eq!(read_band(&engine, &path, 1).unwrap(), read_raster(&engine, &path).unwrap());
        assert!(matches!(
            read_band(&engine, &path, 2),
            Err(RasterError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_warp_respects_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TiffEngine::new();
        let source = write_fixture(dir.path(), "a.tif", 4, 4);
        let destination = dir.path().join("warped.tif");
        fs::write(&destination, b"old").unwrap();
        let options = WarpOptions::default()
            .bounds(Extent::new(0.0, 0.0, 2.0 * PIXEL_SIZE, 2.0 * PIXEL_SIZE).unwrap());

        assert!(!warp(&engine, &source, &destination, &options, false).unwrap());
        assert_eq!(fs::read(&destination).unwrap(), b"old");

        assert!(warp(&engine, &source, &destination, &options, true).unwrap());
        let warped = read_raster(&engine, &destination).unwrap();
        assert_eq!(warped.cells().values(), &[8.0, 9.0, 12.0, 13.0]);
    }

    #[test]
    fn test_warp_to_template_grid() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TiffEngine::new();
        let source = write_fixture(dir.path(), "a.tif", 4, 4);
        let template = GridSpec::north_up(
            20.0,
            40.0,
            20.0,
            20.0,
            1,
            2,
            Some(Crs::Epsg(32610)),
        );
        let destination = dir.path().join("coarse.tif");

        let options = WarpOptions::from_template(&template)
            .unwrap()
            .output_type(DataType::Int32);
        warp(&engine, &source, &destination, &options, false).unwrap();

        let warped = read_raster(&engine, &destination).unwrap();
        assert_eq!(warped.spec(), &template);
        assert_eq!(warped.data_type(), DataType::Int32);
        // Nearest neighbour samples the centre of each 2x2 block.
        assert_eq!(warped.cells().values(), &[7.0, 15.0]);
    }

    #[test]
    fn test_rasterize_burns_points() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new().with_layer(stations());
        let destination = dir.path().join("cost.tif");

        let options = RasterizeOptions::new("cost").data_type(DataType::Float64);
        assert!(rasterize(&engine, Path::new("stations.shp"), &destination, &grid(), &options, false).unwrap());

        let raster = read_raster(&engine, &destination).unwrap();
        assert_eq!(raster.cells().values(), &[2.5, -9999.0, -9999.0, 7.0]);
        assert_eq!(raster.nodata(), Some(-9999.0));
        assert_eq!(raster.spec(), &grid());
    }

    #[test]
    fn test_rasterize_unknown_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new().with_layer(stations());
        let err = rasterize(
            &engine,
            Path::new("stations.shp"),
            &dir.path().join("out.tif"),
            &grid(),
            &RasterizeOptions::new("height"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RasterError::InvalidArgument(_)));
        assert!(!dir.path().join("out.tif").exists());
    }

    #[test]
    fn test_rasterize_without_vector_support() {
        let dir = tempfile::tempdir().unwrap();
        let err = rasterize(
            &TiffEngine::new(),
            Path::new("stations.shp"),
            &dir.path().join("out.tif"),
            &grid(),
            &RasterizeOptions::new("cost"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RasterError::EngineFailure(_)));
    }

    #[test]
    fn test_reproject_keeps_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new().with_layer(stations());
        let destination = dir.path().join("stations_utm.shp");

        reproject_vector(&engine, Path::new("stations.shp"), &destination, &Crs::Epsg(32610))
            .unwrap();

        let written = engine.written_layers.lock().unwrap();
        let (path, layer) = &written[0];
        assert_eq!(path, &destination);
        assert_eq!(layer.crs, Some(Crs::Epsg(32610)));
        assert_eq!(layer.features, stations().features);
    }
}
