use std::path::PathBuf;
use std::sync::Arc;

use rstest::rstest;

use crate::tests::{ScriptedEngine, hidden_files, write_fixture};
use crate::tiling::{SkipReason, TileJob, TileStatus, TileWorker, index_width};
use crate::{Extent, GeoEngine, RasterError, TiffEngine, WarpOptions};

fn job(source: PathBuf, folder: PathBuf, index: usize) -> TileJob {
    TileJob {
        source_path: source,
        extent: Extent::new(0.0, 0.0, 20.0, 20.0).unwrap(),
        index,
        output_folder: folder,
    }
}

#[rstest]
#[case(1, 2)]
#[case(4, 2)]
#[case(100, 2)]
#[case(101, 3)]
#[case(1000, 3)]
#[case(1001, 4)]
fn test_index_width(#[case] total: usize, #[case] width: usize) {
    assert_eq!(index_width(total), width);
}

#[rstest]
#[case("in/dem.tif", 4, 3, "out/dem_03.tif")]
#[case("in/dem.TIF", 4, 0, "out/dem_00.TIF")]
#[case("in/dem", 4, 1, "out/dem_01.tif")]
#[case("in/dem.tif", 121, 7, "out/dem_007.tif")]
fn test_output_names(
    #[case] source: &str,
    #[case] total: usize,
    #[case] index: usize,
    #[case] expected: &str,
) {
    let worker = TileWorker::new(Arc::new(TiffEngine::new()), total);
    let path = worker.output_path(&job(source.into(), "out".into(), index));
    assert_eq!(path, PathBuf::from(expected));
}

#[test]
fn test_process_writes_tile() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let worker = TileWorker::new(Arc::new(TiffEngine::new()), 4)
        .warp_options(WarpOptions::default().resolution(10.0, 10.0).unwrap());

    let result = worker.process(job(source, dir.path().to_path_buf(), 0));
    assert!(matches!(result.status, TileStatus::Success));
    assert_eq!(result.output_path, dir.path().join("src_00.tif"));

    let tile = TiffEngine::new().open_raster(&result.output_path).unwrap();
    assert_eq!(tile.cells().values(), &[8.0, 9.0, 12.0, 13.0]);
    assert!(hidden_files(dir.path()).is_empty());
}

#[test]
fn test_existing_output_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    std::fs::write(dir.path().join("src_02.tif"), b"already here").unwrap();

    let engine = Arc::new(ScriptedEngine::new());
    let worker = TileWorker::new(engine.clone(), 4);
    let result = worker.process(job(source, dir.path().to_path_buf(), 2));

    assert!(matches!(
        result.status,
        TileStatus::Skipped(SkipReason::AlreadyExists)
    ));
    assert_eq!(engine.warps(), 0);
    assert_eq!(std::fs::read(&result.output_path).unwrap(), b"already here");
}

#[test]
fn test_engine_failure_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let worker = TileWorker::new(Arc::new(ScriptedEngine::new().fail_on("_01.")), 4);

    let result = worker.process(job(source, dir.path().to_path_buf(), 1));
    assert!(matches!(
        result.status,
        TileStatus::Failed(RasterError::EngineFailure(_))
    ));
    assert!(!result.output_path.exists());
    assert!(hidden_files(dir.path()).is_empty());
}

#[test]
fn test_unreadable_source_fails_tile() {
    let dir = tempfile::tempdir().unwrap();
    let worker = TileWorker::new(Arc::new(TiffEngine::new()), 4);
    let result = worker.process(job(
        dir.path().join("missing.tif"),
        dir.path().to_path_buf(),
        0,
    ));
    assert!(matches!(
        result.status,
        TileStatus::Failed(RasterError::UnreadableSource { .. })
    ));
}
