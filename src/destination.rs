//! Where outputs land and how they get there.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use tempfile::{Builder, NamedTempFile, TempPath};

use crate::{RasterError, RasterResult};

/// Creates a hidden, uniquely named staging file next to `destination`.
///
/// `out/cost_03.tif` is staged as `out/.cost_03.<random>.partial.tif`; the
/// extension is kept so format drivers that look at it still pick the right
/// format. Every call gets its own file, so an abandoned attempt that is still
/// running never shares a file with its retry.
fn staging_file(destination: &Path) -> RasterResult<TempPath> {
    let folder = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut prefix = OsString::from(".");
    prefix.push(destination.file_stem().unwrap_or_default());
    prefix.push(".");
    let mut suffix = OsString::from(".partial");
    if let Some(ext) = destination.extension() {
        suffix.push(".");
        suffix.push(ext);
    }

    Builder::new()
        .prefix(&prefix)
        .suffix(&suffix)
        .tempfile_in(folder)
        .map(NamedTempFile::into_temp_path)
        .map_err(|e| RasterError::write_failure(destination, e))
}

/// Runs `write` against a private staging file next to `destination` and
/// renames the result into place once it succeeds.
///
/// A failed or interrupted write never leaves a file at `destination`.
pub(crate) fn write_atomically<F>(destination: &Path, write: F) -> RasterResult<()>
where
    F: FnOnce(&Path) -> RasterResult<()>,
{
    let staged = staging_file(destination)?;
    let staged_path: &Path = &staged;
    // Dropping `staged` on any early return removes the staging file.
    write(staged_path)?;
    staged
        .persist(destination)
        .map_err(|e| RasterError::write_failure(destination, e.error))
}

/// Applies the overwrite policy to `destination`.
///
/// Returns `Ok(true)` when the caller should go ahead and write. An existing
/// destination is either removed (`overwrite`) or left alone with a warning.
pub(crate) fn prepare(destination: &Path, overwrite: bool) -> RasterResult<bool> {
    if !destination.exists() {
        return Ok(true);
    }
    if !overwrite {
        log::warn!(
            "{} already exists, skipping (pass overwrite to replace it)",
            destination.display()
        );
        return Ok(false);
    }

    let removed = if destination.is_dir() {
        fs::remove_dir_all(destination)
    } else {
        fs::remove_file(destination)
    };
    removed.map_err(|e| RasterError::write_failure(destination, e))?;
    log::debug!("Removed existing {}", destination.display());
    Ok(true)
}

/// Creates `folder` (and parents) if missing.
pub(crate) fn ensure_folder(folder: &Path) -> RasterResult<()> {
    fs::create_dir_all(folder).map_err(|e| RasterError::write_failure(folder, e))
}
