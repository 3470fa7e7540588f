#![forbid(unsafe_code)]

mod crs;
pub use crs::{Crs, CrsKind};

mod destination;

pub mod engine;
#[cfg(feature = "gdal")]
pub use engine::GdalEngine;
pub use engine::{GeoEngine, TiffEngine, default_engine};

mod error;
pub use error::{RasterError, RasterResult};

mod extent;
pub use extent::{Extent, split_extent};

mod grid;
pub use grid::{CellGrid, DataType, GridSpec, Raster};

mod mapper;
pub use mapper::{MapOutcome, ValueMapper};

mod ops;
pub use ops::{rasterize, read_band, read_raster, reproject_vector, warp, write_raster};

pub mod options;
pub use options::{Compression, RasterizeOptions, WarpOptions, WriteOptions};

mod pool;
pub use pool::{JobOutcome, WorkerPool};

pub mod progress;
pub use progress::{GdalStyleProgress, LogProgress, NoProgress, ProgressObserver};

pub mod tiling;
pub use tiling::{TileJob, TileResult, TileRun, TileScheduler, TileStatus, TileWorker};

mod value_map;
pub use value_map::{DEFAULT_FALLBACK, ValueMap};

pub mod vector;
pub use vector::{Feature, FieldValue, Record, VectorLayer};

pub use tokio_util::sync::CancellationToken;
