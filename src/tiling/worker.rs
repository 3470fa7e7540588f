use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::destination::write_atomically;
use crate::engine::GeoEngine;
use crate::options::WarpOptions;
use crate::tiling::{SkipReason, TileJob, TileResult, TileStatus};

/// Digits used for tile indices in a run of `total` tiles.
///
/// Two digits at minimum so that runs of up to 100 tiles keep the familiar
/// `_00` .. `_99` names; wider runs grow as needed.
#[must_use]
pub fn index_width(total: usize) -> usize {
    let last = total.saturating_sub(1);
    let digits = last.checked_ilog10().map_or(1, |d| d as usize + 1);
    digits.max(2)
}

/// Produces one tile file per [`TileJob`].
#[derive(Clone)]
pub struct TileWorker {
    engine: Arc<dyn GeoEngine>,
    index_width: usize,
    warp: WarpOptions,
}

impl TileWorker {
    /// Creates a worker for a run of `total` tiles.
    pub fn new(engine: Arc<dyn GeoEngine>, total: usize) -> Self {
        Self {
            engine,
            index_width: index_width(total),
            warp: WarpOptions::default(),
        }
    }

    /// Options applied to every tile. The bounds are replaced by each job's extent.
    #[must_use]
    pub fn warp_options(mut self, warp: WarpOptions) -> Self {
        self.warp = warp;
        self
    }

    /// `{folder}/{source stem}_{index}.{source extension or tif}`
    #[must_use]
    pub fn output_path(&self, job: &TileJob) -> PathBuf {
        let stem = job
            .source_path
            .file_stem()
            .map_or_else(|| "tile".into(), |s| s.to_string_lossy());
        let ext = job
            .source_path
            .extension()
            .map_or_else(|| "tif".into(), |s| s.to_string_lossy());
        job.output_folder.join(format!(
            "{stem}_{index:0width$}.{ext}",
            index = job.index,
            width = self.index_width
        ))
    }

    /// Warps the job's extent out of the source. Never panics on engine errors;
    /// they are reported as [`TileStatus::Failed`].
    pub fn process(&self, job: TileJob) -> TileResult {
        let output_path = self.output_path(&job);
        if output_path.exists() {
            log::debug!("Tile {} exists, skipping", output_path.display());
            return TileResult {
                job,
                output_path,
                status: TileStatus::Skipped(SkipReason::AlreadyExists),
            };
        }

        let options = self.warp.clone().bounds(job.extent);
        let status = match self.warp_tile(&job.source_path, &output_path, &options) {
            Ok(()) => {
                log::debug!("Wrote tile {} ({})", output_path.display(), job.extent);
                TileStatus::Success
            }
            Err(err) => {
                log::warn!("Tile {} failed: {err}", job.index);
                TileStatus::Failed(err)
            }
        };
        TileResult {
            job,
            output_path,
            status,
        }
    }

    fn warp_tile(
        &self,
        source: &Path,
        output: &Path,
        options: &WarpOptions,
    ) -> crate::RasterResult<()> {
        write_atomically(output, |partial| {
            self.engine.warp_raster(source, partial, options)
        })
    }
}
