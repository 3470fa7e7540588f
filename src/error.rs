use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// A specialized [`Result`] type for raster operations.
pub type RasterResult<T> = Result<T, RasterError>;

/// Errors that can occur while tiling, warping or remapping rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unable to read {}: {reason}", path.display())]
    UnreadableSource { path: PathBuf, reason: String },
    #[error("Unable to write {}: {reason}", path.display())]
    WriteFailure { path: PathBuf, reason: String },
    #[error("Geospatial engine failure: {0}")]
    EngineFailure(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Cancelled before the job was started")]
    Cancelled,
    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("IO Error {0}")]
    Io(#[from] std::io::Error),
}

impl RasterError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn unreadable(path: &Path, reason: impl ToString) -> Self {
        Self::UnreadableSource {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write_failure(path: &Path, reason: impl ToString) -> Self {
        Self::WriteFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn engine(message: impl Into<String>) -> Self {
        Self::EngineFailure(message.into())
    }

    /// Whether re-running the same job could plausibly succeed.
    ///
    /// Argument errors are deterministic; everything else may be transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for RasterError {
    fn from(err: gdal::errors::GdalError) -> Self {
        Self::EngineFailure(err.to_string())
    }
}
