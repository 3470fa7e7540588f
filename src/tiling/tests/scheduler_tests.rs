use std::fs;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::tests::{ScriptedEngine, hidden_files, write_fixture};
use crate::tiling::{TileScheduler, TileStatus};
use crate::{CancellationToken, GeoEngine, RasterError, TiffEngine};

fn modified(path: &std::path::Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

#[tokio::test]
async fn test_four_tiles_cover_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let out = dir.path().join("src_tiles");

    let run = TileScheduler::new(Arc::new(TiffEngine::new()))
        .run(&source, &out, 4, 2)
        .await
        .unwrap();

    assert!(run.is_complete());
    assert_eq!(run.succeeded(), 4);
    let engine = TiffEngine::new();
    let tiles: Vec<Vec<f64>> = run
        .results()
        .iter()
        .map(|r| engine.open_raster(&r.output_path).unwrap().into_cells().into_values())
        .collect();
    // x-chunk outer, y-chunk inner with y ascending: bottom-left first.
    assert_eq!(
        tiles,
        vec![
            vec![8.0, 9.0, 12.0, 13.0],
            vec![0.0, 1.0, 4.0, 5.0],
            vec![10.0, 11.0, 14.0, 15.0],
            vec![2.0, 3.0, 6.0, 7.0],
        ]
    );
    for (index, result) in run.results().iter().enumerate() {
        assert_eq!(result.job.index, index);
        assert_eq!(result.output_path, out.join(format!("src_{index:02}.tif")));
    }
}

#[tokio::test]
async fn test_results_keep_index_order_when_first_job_is_slow() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let engine = Arc::new(ScriptedEngine::new().delay_on("_00.", Duration::from_millis(150)));

    let run = TileScheduler::new(engine)
        .run(&source, &dir.path().join("tiles"), 4, 4)
        .await
        .unwrap();

    let indices: Vec<usize> = run.results().iter().map(|r| r.job.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert!(run.is_complete());
}

#[tokio::test]
async fn test_failing_tile_does_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 6, 6);
    let out = dir.path().join("tiles");
    let engine = Arc::new(ScriptedEngine::new().fail_on("_02."));

    // 5 tiles round up to a 3x3 split.
    let run = TileScheduler::new(engine)
        .run(&source, &out, 5, 3)
        .await
        .unwrap();

    assert_eq!(run.results().len(), 9);
    assert_eq!(run.failed(), 1);
    assert_eq!(run.succeeded(), 8);
    assert!(!run.is_complete());
    for result in run.results() {
        if result.job.index == 2 {
            assert!(matches!(
                result.status,
                TileStatus::Failed(RasterError::EngineFailure(_))
            ));
            assert!(!result.output_path.exists());
        } else {
            assert!(result.output_path.exists(), "{}", result.output_path.display());
        }
    }
    let failed: Vec<usize> = run.failed_jobs().iter().map(|j| j.index).collect();
    assert_eq!(failed, vec![2]);
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let out = dir.path().join("tiles");
    let engine = Arc::new(ScriptedEngine::new());
    let scheduler = TileScheduler::new(engine.clone());

    let first = scheduler.run(&source, &out, 4, 2).await.unwrap();
    assert_eq!(first.succeeded(), 4);
    let stamps: Vec<SystemTime> = first
        .results()
        .iter()
        .map(|r| modified(&r.output_path))
        .collect();

    let second = scheduler.run(&source, &out, 4, 2).await.unwrap();
    assert_eq!(second.skipped(), 4);
    assert_eq!(engine.warps(), 4);
    for (result, stamp) in second.results().iter().zip(stamps) {
        assert_eq!(modified(&result.output_path), stamp);
    }
}

#[tokio::test]
async fn test_resume_retries_only_failed_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let engine = Arc::new(ScriptedEngine::new().fail_on("_01."));
    let scheduler = TileScheduler::new(engine.clone());

    let run = scheduler
        .run(&source, &dir.path().join("tiles"), 4, 2)
        .await
        .unwrap();
    assert_eq!(run.failed(), 1);

    engine.heal();
    let run = scheduler.resume(run, 2).await.unwrap();
    assert!(run.is_complete());
    assert_eq!(run.succeeded(), 4);
    assert_eq!(engine.warps(), 5);
}

#[tokio::test]
async fn test_slow_tile_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let engine = Arc::new(ScriptedEngine::new().delay_on("_01.", Duration::from_millis(400)));

    let run = TileScheduler::new(engine)
        .timeout(Duration::from_millis(50))
        .run(&source, &dir.path().join("tiles"), 4, 4)
        .await
        .unwrap();

    assert!(matches!(
        run.results()[1].status,
        TileStatus::Failed(RasterError::Timeout(_))
    ));
    assert_eq!(run.succeeded(), 3);
}

#[tokio::test]
async fn test_resume_overlapping_a_timed_out_tile() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let tiles = dir.path().join("tiles");
    let engine = Arc::new(ScriptedEngine::new().delay_on("_01.", Duration::from_millis(300)));

    let run = TileScheduler::new(engine.clone())
        .timeout(Duration::from_millis(50))
        .run(&source, &tiles, 4, 4)
        .await
        .unwrap();
    assert_eq!(run.failed(), 1);

    // The timed-out warp is still running while its retry starts.
    let run = TileScheduler::new(engine.clone())
        .resume(run, 2)
        .await
        .unwrap();
    assert!(run.is_complete());
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(engine.warps(), 5);
    let tile = TiffEngine::new()
        .open_raster(&run.results()[1].output_path)
        .unwrap();
    assert_eq!(tile.cells().values(), &[0.0, 1.0, 4.0, 5.0]);
    assert!(hidden_files(&tiles).is_empty());
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let engine = Arc::new(ScriptedEngine::new());
    let token = CancellationToken::new();
    token.cancel();

    let run = TileScheduler::new(engine.clone())
        .cancellation(token)
        .run(&source, &dir.path().join("tiles"), 4, 2)
        .await
        .unwrap();

    assert_eq!(run.failed(), 4);
    assert!(run.results().iter().all(|r| matches!(
        r.status,
        TileStatus::Failed(RasterError::Cancelled)
    ) && !r.output_path.exists()));
    assert_eq!(engine.warps(), 0);
}

#[tokio::test]
async fn test_observer_counts_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 4, 4);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    TileScheduler::new(Arc::new(TiffEngine::new()))
        .observer(Arc::new(move |done: usize, total: usize| {
            sink.lock().unwrap().push((done, total));
        }))
        .run(&source, &dir.path().join("tiles"), 4, 2)
        .await
        .unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

#[tokio::test]
async fn test_run_level_errors() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "src.tif", 2, 2);
    let out = dir.path().join("tiles");
    let scheduler = TileScheduler::new(Arc::new(TiffEngine::new()));

    assert!(matches!(
        scheduler.run(&source, &out, 0, 2).await,
        Err(RasterError::InvalidArgument(_))
    ));
    assert!(matches!(
        scheduler.run(&source, &out, 4, 0).await,
        Err(RasterError::InvalidArgument(_))
    ));
    // 9 tiles need at least 3 pixels per axis.
    assert!(matches!(
        scheduler.run(&source, &out, 9, 2).await,
        Err(RasterError::InvalidArgument(_))
    ));
    assert!(matches!(
        scheduler
            .run(&dir.path().join("missing.tif"), &out, 4, 2)
            .await,
        Err(RasterError::UnreadableSource { .. })
    ));

    let blocked = dir.path().join("blocked");
    fs::write(&blocked, b"a file, not a folder").unwrap();
    assert!(matches!(
        scheduler.run(&source, &blocked.join("tiles"), 1, 1).await,
        Err(RasterError::WriteFailure { .. })
    ));
}
