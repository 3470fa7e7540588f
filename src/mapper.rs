use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::destination::{ensure_folder, write_atomically};
use crate::engine::GeoEngine;
use crate::pool::WorkerPool;
use crate::progress::{NoProgress, ProgressObserver};
use crate::{
    CellGrid, Compression, DataType, Raster, RasterError, RasterResult, ValueMap, WriteOptions,
};

/// What [`ValueMapper::map_many`] did with one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOutcome {
    Written(PathBuf),
    /// The destination already existed and was left alone.
    Skipped(PathBuf),
}

impl MapOutcome {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            MapOutcome::Written(path) | MapOutcome::Skipped(path) => path,
        }
    }
}

/// Replaces categorical cell values through a [`ValueMap`].
///
/// Outputs keep the source grid and CRS verbatim. Their no-data value is the
/// map's fallback, and cells are written as `Float32` unless configured otherwise.
#[derive(Clone)]
pub struct ValueMapper {
    engine: Arc<dyn GeoEngine>,
    map: Arc<ValueMap>,
    data_type: DataType,
    compression: Compression,
    observer: Arc<dyn ProgressObserver>,
}

impl ValueMapper {
    pub fn new(engine: Arc<dyn GeoEngine>, map: ValueMap) -> Self {
        Self {
            engine,
            map: Arc::new(map),
            data_type: DataType::Float32,
            compression: Compression::None,
            observer: Arc::new(NoProgress),
        }
    }

    #[must_use]
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Notified once per file by [`ValueMapper::map_many`].
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn value_map(&self) -> &ValueMap {
        &self.map
    }

    /// Checks that the fallback and every target value fit the output type.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] naming the first value that
    /// would be clamped or truncated on write.
    pub fn check_output_type(&self) -> RasterResult<()> {
        let fallback = self.map.fallback();
        if !self.data_type.can_hold(fallback) {
            return Err(RasterError::invalid(format!(
                "fallback {fallback} cannot be stored as {}",
                self.data_type
            )));
        }
        match self.map.targets().find(|v| !self.data_type.can_hold(*v)) {
            Some(value) => Err(RasterError::invalid(format!(
                "mapped value {value} cannot be stored as {}",
                self.data_type
            ))),
            None => Ok(()),
        }
    }

    /// Maps every cell of `raster`.
    ///
    /// No-data cells only match a key that is exactly their value; otherwise
    /// they become the fallback like any other unmapped cell.
    #[must_use]
    pub fn map_cells(&self, raster: &Raster) -> CellGrid {
        raster.cells().map(|value| {
            if raster.is_nodata(value) && !self.map.contains(value) {
                self.map.fallback()
            } else {
                self.map.lookup(value)
            }
        })
    }

    /// Reads `source`, maps its cells and writes the result to `destination`,
    /// creating the destination folder if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if the output type cannot hold
    /// the map's values, [`RasterError::UnreadableSource`] if the source cannot
    /// be read and [`RasterError::WriteFailure`] if the destination cannot be written.
    pub fn map_values(&self, source: &Path, destination: &Path) -> RasterResult<()> {
        self.check_output_type()?;
        let raster = self.engine.open_raster(source)?;
        let mapped = Raster::new(
            raster.spec().clone(),
            self.map_cells(&raster),
            Some(self.map.fallback()),
            self.data_type,
        )?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_folder(parent)?;
        }
        let options = WriteOptions::default()
            .data_type(self.data_type)
            .nodata(Some(self.map.fallback()))
            .compression(self.compression);
        write_atomically(destination, |partial| {
            self.engine.write_raster(partial, &mapped, &options)
        })?;
        log::debug!("Mapped {} -> {}", source.display(), destination.display());
        Ok(())
    }

    /// Applies the map to every source, writing each output under its source
    /// file name in `destination_folder`.
    ///
    /// Every source gets its own result in input order; a failing file does not
    /// affect the others. Existing destinations are skipped. A source whose file
    /// name repeats an earlier one is not mapped and gets
    /// [`RasterError::InvalidArgument`].
    ///
    /// # Errors
    ///
    /// Fails as a whole if `worker_count` is zero, the output type cannot hold
    /// the map's values, or the folder cannot be created.
    pub async fn map_many(
        &self,
        sources: Vec<PathBuf>,
        destination_folder: &Path,
        worker_count: usize,
    ) -> RasterResult<Vec<RasterResult<MapOutcome>>> {
        let pool = WorkerPool::new(worker_count)?.observer(Arc::clone(&self.observer));
        self.check_output_type()?;
        ensure_folder(destination_folder)?;
        log::info!(
            "Mapping {} rasters into {} with {worker_count} workers",
            sources.len(),
            destination_folder.display()
        );

        let mut names = HashSet::new();
        let jobs: Vec<(PathBuf, bool)> = sources
            .into_iter()
            .map(|source| {
                let repeated = source
                    .file_name()
                    .is_some_and(|name| !names.insert(name.to_os_string()));
                (source, repeated)
            })
            .collect();

        let mapper = self.clone();
        let folder = destination_folder.to_path_buf();
        let outcomes = pool
            .run(jobs, move |(source, repeated)| {
                if repeated {
                    log::warn!("{} repeats an earlier file name, skipping", source.display());
                    return Err(RasterError::invalid(format!(
                        "{} has the same file name as an earlier source",
                        source.display()
                    )));
                }
                mapper.map_one(&source, &folder)
            })
            .await;
        Ok(outcomes
            .into_iter()
            .map(|outcome| outcome.into_result().and_then(std::convert::identity))
            .collect())
    }

    fn map_one(&self, source: &Path, folder: &Path) -> RasterResult<MapOutcome> {
        let name = source.file_name().ok_or_else(|| {
            RasterError::invalid(format!("{} has no file name", source.display()))
        })?;
        let destination = folder.join(name);
        if destination.exists() {
            log::debug!("{} exists, skipping", destination.display());
            return Ok(MapOutcome::Skipped(destination));
        }
        match self.map_values(source, &destination) {
            Ok(()) => Ok(MapOutcome::Written(destination)),
            Err(err) => {
                log::warn!("Mapping {} failed: {err}", source.display());
                Err(err)
            }
        }
    }
}
