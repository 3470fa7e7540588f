//! Split a raster into tiles and warp them in parallel.
//!
//! A [`TileScheduler`] opens the source once, splits its extent on pixel edges and
//! hands one [`TileJob`] per tile to a [`TileWorker`] running on the
//! [`WorkerPool`](crate::WorkerPool). Finished tiles double as the resume marker:
//! running the same job again finds the output and skips it.
//!
//! ```no_run
//! use std::path::Path;
//! use rastertiles::{TileScheduler, default_engine};
//!
//! # async fn example() -> rastertiles::RasterResult<()> {
//! let scheduler = TileScheduler::new(default_engine());
//! let run = scheduler
//!     .run(Path::new("dem.tif"), Path::new("dem_tiles"), 16, 4)
//!     .await?;
//! println!("{} written, {} skipped, {} failed", run.succeeded(), run.skipped(), run.failed());
//! # Ok(())
//! # }
//! ```

mod scheduler;
mod worker;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;

pub use scheduler::{TileRun, TileScheduler};
pub use worker::{TileWorker, index_width};

use crate::{Extent, RasterError};

/// One tile to produce. Jobs are never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TileJob {
    pub source_path: PathBuf,
    pub extent: Extent,
    /// Position in the split order, starting at 0.
    pub index: usize,
    pub output_folder: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
}

#[derive(Debug)]
pub enum TileStatus {
    Success,
    Skipped(SkipReason),
    Failed(RasterError),
}

impl TileStatus {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, TileStatus::Failed(_))
    }
}

impl fmt::Display for TileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileStatus::Success => f.write_str("written"),
            TileStatus::Skipped(SkipReason::AlreadyExists) => f.write_str("skipped (exists)"),
            TileStatus::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// The outcome of one [`TileJob`].
#[derive(Debug)]
pub struct TileResult {
    pub job: TileJob,
    pub output_path: PathBuf,
    pub status: TileStatus,
}
