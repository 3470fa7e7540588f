use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::destination::ensure_folder;
use crate::engine::GeoEngine;
use crate::options::{Compression, WarpOptions};
use crate::pool::WorkerPool;
use crate::progress::{NoProgress, ProgressObserver};
use crate::tiling::{SkipReason, TileJob, TileResult, TileStatus, TileWorker};
use crate::{Extent, GridSpec, RasterError, RasterResult};

/// Runs a whole tiling pass over one source raster.
pub struct TileScheduler {
    engine: Arc<dyn GeoEngine>,
    timeout: Option<Duration>,
    cancellation: CancellationToken,
    observer: Arc<dyn ProgressObserver>,
    compression: Compression,
}

impl TileScheduler {
    pub fn new(engine: Arc<dyn GeoEngine>) -> Self {
        Self {
            engine,
            timeout: None,
            cancellation: CancellationToken::new(),
            observer: Arc::new(NoProgress),
            compression: Compression::None,
        }
    }

    /// Reports a tile as failed once it has been running longer than `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stops dispatching tiles once `token` is cancelled.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Splits `source` into `ceil(sqrt(tile_count))²` tiles and writes them to
    /// `output_folder` using at most `worker_count` concurrent workers.
    ///
    /// Per-tile failures are recorded in the returned [`TileRun`]; the run
    /// itself only fails when it cannot start.
    ///
    /// # Errors
    ///
    /// * [`RasterError::InvalidArgument`] for a zero tile or worker count, or a
    ///   raster too small or rotated to split.
    /// * [`RasterError::UnreadableSource`] if the source cannot be opened.
    /// * [`RasterError::WriteFailure`] if the output folder cannot be created.
    pub async fn run(
        &self,
        source: &Path,
        output_folder: &Path,
        tile_count: usize,
        worker_count: usize,
    ) -> RasterResult<TileRun> {
        if tile_count == 0 {
            return Err(RasterError::invalid("tile count must be at least 1"));
        }
        let pool = self.pool(worker_count)?;

        let grid = self.open_grid(source).await?;
        ensure_folder(output_folder)?;
        let extents = Extent::split_aligned(&grid, tile_count)?;
        log::info!(
            "Splitting {} ({grid}) into {} tiles with {worker_count} workers",
            source.display(),
            extents.len()
        );

        let jobs: Vec<TileJob> = extents
            .into_iter()
            .enumerate()
            .map(|(index, extent)| TileJob {
                source_path: source.to_path_buf(),
                extent,
                index,
                output_folder: output_folder.to_path_buf(),
            })
            .collect();

        // Tiles keep the source pixel size exactly.
        let warp = WarpOptions {
            resolution: Some((grid.pixel_width().abs(), grid.pixel_height().abs())),
            compression: self.compression,
            ..WarpOptions::default()
        };
        let worker = TileWorker::new(Arc::clone(&self.engine), jobs.len()).warp_options(warp);
        let results = dispatch(&pool, &worker, jobs).await;
        let run = TileRun { worker, results };
        log::info!(
            "Tiling finished: {} written, {} skipped, {} failed",
            run.succeeded(),
            run.skipped(),
            run.failed()
        );
        Ok(run)
    }

    /// Runs the failed jobs of `run` again and merges the new results in place.
    ///
    /// Tiles keep the names of the original run, so anything that finished in
    /// the meantime is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if `worker_count` is zero.
    pub async fn resume(&self, mut run: TileRun, worker_count: usize) -> RasterResult<TileRun> {
        let pool = self.pool(worker_count)?;
        let retry = run.failed_jobs();
        log::info!("Retrying {} failed tiles", retry.len());

        for result in dispatch(&pool, &run.worker, retry).await {
            let index = result.job.index;
            if let Some(slot) = run.results.get_mut(index) {
                *slot = result;
            }
        }
        Ok(run)
    }

    fn pool(&self, worker_count: usize) -> RasterResult<WorkerPool> {
        let mut pool = WorkerPool::new(worker_count)?
            .cancellation(self.cancellation.clone())
            .observer(Arc::clone(&self.observer));
        if let Some(timeout) = self.timeout {
            pool = pool.timeout(timeout);
        }
        Ok(pool)
    }

    async fn open_grid(&self, source: &Path) -> RasterResult<GridSpec> {
        let engine = Arc::clone(&self.engine);
        let path = source.to_path_buf();
        tokio::task::spawn_blocking(move || engine.open_grid(&path))
            .await
            .map_err(|e| RasterError::unreadable(source, e))?
    }
}

async fn dispatch(pool: &WorkerPool, worker: &TileWorker, jobs: Vec<TileJob>) -> Vec<TileResult> {
    let shared = worker.clone();
    let outcomes = pool
        .run(jobs.clone(), move |job| shared.process(job))
        .await;

    jobs.into_iter()
        .zip(outcomes)
        .map(|(job, outcome)| match outcome.into_result() {
            Ok(result) => result,
            Err(err) => {
                log::warn!("Tile {} failed: {err}", job.index);
                TileResult {
                    output_path: worker.output_path(&job),
                    job,
                    status: TileStatus::Failed(err),
                }
            }
        })
        .collect()
}

/// Results of a tiling pass, in job index order.
pub struct TileRun {
    worker: TileWorker,
    results: Vec<TileResult>,
}

impl TileRun {
    #[must_use]
    pub fn results(&self) -> &[TileResult] {
        &self.results
    }

    #[must_use]
    pub fn into_results(self) -> Vec<TileResult> {
        self.results
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, TileStatus::Success))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, TileStatus::Skipped(SkipReason::AlreadyExists)))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(TileStatus::is_failed)
    }

    /// The jobs to hand back to [`TileScheduler::resume`].
    #[must_use]
    pub fn failed_jobs(&self) -> Vec<TileJob> {
        self.results
            .iter()
            .filter(|r| r.status.is_failed())
            .map(|r| r.job.clone())
            .collect()
    }

    /// Whether every tile is on disk.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, predicate: impl Fn(&TileStatus) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.status)).count()
    }
}
