//! The geospatial engine seam.
//!
//! Everything that touches file formats, coordinate transforms or resampling goes
//! through [`GeoEngine`]. The pipeline only schedules work and names files.
//!
//! * [`TiffEngine`] is pure Rust and always available. It reads and writes
//!   single-band GeoTIFFs and resamples within one CRS.
//! * `GdalEngine` (feature `gdal`) delegates every capability to GDAL.

mod geotiff;
pub use geotiff::TiffEngine;

#[cfg(feature = "gdal")]
mod gdal_engine;
#[cfg(feature = "gdal")]
pub use gdal_engine::GdalEngine;

use std::path::Path;
use std::sync::Arc;

use crate::options::{RasterizeOptions, WarpOptions, WriteOptions};
use crate::{CellGrid, Crs, GridSpec, Raster, RasterResult, VectorLayer};

/// Raster and vector capabilities supplied by a linked geospatial library.
///
/// Implementations must be shareable across worker threads. Each call opens and
/// closes its own file handles; no dataset is shared between calls.
pub trait GeoEngine: Send + Sync {
    /// Reads band `band` (1-based) of a raster together with its geometry.
    ///
    /// A band the raster does not have is an [`InvalidArgument`](crate::RasterError::InvalidArgument).
    fn open_band(&self, path: &Path, band: usize) -> RasterResult<Raster>;

    /// Reads the first band of a raster.
    fn open_raster(&self, path: &Path) -> RasterResult<Raster> {
        self.open_band(path, 1)
    }

    /// Reads only the geometry of a raster.
    fn open_grid(&self, path: &Path) -> RasterResult<GridSpec> {
        Ok(self.open_raster(path)?.spec)
    }

    /// Writes `raster` to `path`, replacing any existing file.
    ///
    /// The raster's grid and CRS are written verbatim; `options` control encoding.
    fn write_raster(&self, path: &Path, raster: &Raster, options: &WriteOptions)
    -> RasterResult<()>;

    fn open_vector_layer(&self, path: &Path) -> RasterResult<VectorLayer>;

    fn write_vector_layer(&self, path: &Path, layer: &VectorLayer) -> RasterResult<()>;

    /// Transforms every feature of `layer` into `target`, keeping attributes.
    fn reproject_vector(&self, layer: &VectorLayer, target: &Crs) -> RasterResult<VectorLayer>;

    /// Burns `options.attribute` of every feature into a new grid shaped like `grid`.
    fn rasterize_layer(
        &self,
        layer: &VectorLayer,
        grid: &GridSpec,
        options: &RasterizeOptions,
    ) -> RasterResult<CellGrid>;

    /// Resamples the raster at `source` onto the grid described by `options`
    /// and writes the result to `destination`.
    fn warp_raster(
        &self,
        source: &Path,
        destination: &Path,
        options: &WarpOptions,
    ) -> RasterResult<()>;
}

impl<E: GeoEngine + ?Sized> GeoEngine for Arc<E> {
    fn open_band(&self, path: &Path, band: usize) -> RasterResult<Raster> {
        (**self).open_band(path, band)
    }

    fn open_raster(&self, path: &Path) -> RasterResult<Raster> {
        (**self).open_raster(path)
    }

    fn open_grid(&self, path: &Path) -> RasterResult<GridSpec> {
        (**self).open_grid(path)
    }

    fn write_raster(
        &self,
        path: &Path,
        raster: &Raster,
        options: &WriteOptions,
    ) -> RasterResult<()> {
        (**self).write_raster(path, raster, options)
    }

    fn open_vector_layer(&self, path: &Path) -> RasterResult<VectorLayer> {
        (**self).open_vector_layer(path)
    }

    fn write_vector_layer(&self, path: &Path, layer: &VectorLayer) -> RasterResult<()> {
        (**self).write_vector_layer(path, layer)
    }

    fn reproject_vector(&self, layer: &VectorLayer, target: &Crs) -> RasterResult<VectorLayer> {
        (**self).reproject_vector(layer, target)
    }

    fn rasterize_layer(
        &self,
        layer: &VectorLayer,
        grid: &GridSpec,
        options: &RasterizeOptions,
    ) -> RasterResult<CellGrid> {
        (**self).rasterize_layer(layer, grid, options)
    }

    fn warp_raster(
        &self,
        source: &Path,
        destination: &Path,
        options: &WarpOptions,
    ) -> RasterResult<()> {
        (**self).warp_raster(source, destination, options)
    }
}

/// The engine selected by the enabled cargo features.
#[must_use]
pub fn default_engine() -> Arc<dyn GeoEngine> {
    #[cfg(feature = "gdal")]
    {
        Arc::new(GdalEngine::new())
    }
    #[cfg(not(feature = "gdal"))]
    {
        Arc::new(TiffEngine::new())
    }
}
