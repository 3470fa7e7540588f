mod common;

use std::fs;

use common::{read, rastertiles, write_fixture};
use predicates::prelude::*;

#[test]
fn tile_into_default_folder() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "dem.tif");

    rastertiles()
        .args(["tile", "--tiles", "4", "--workers", "2", "--quiet"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 written, 0 skipped, 0 failed"));

    let tiles = dir.path().join("dem_tiles");
    for index in 0..4 {
        assert!(tiles.join(format!("dem_{index:02}.tif")).exists());
    }
    assert_eq!(
        read(&tiles.join("dem_00.tif")).cells().values(),
        &[8.0, 9.0, 12.0, 13.0]
    );
}

#[test]
fn tile_twice_skips() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "dem.tif");
    let out = dir.path().join("out");

    for expected in ["4 written", "4 skipped"] {
        rastertiles()
            .args(["tile", "--tiles", "4", "--quiet", "--output"])
            .arg(&out)
            .arg(&source)
            .assert()
            .success()
            .stdout(predicate::str::contains(expected));
    }
}

#[test]
fn tile_draws_progress_meter() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "dem.tif");

    rastertiles()
        .args(["tile", "--tiles", "1"])
        .arg(&source)
        .assert()
        .success()
        .stderr(predicate::str::contains("0...10...20").and(predicate::str::contains("100 - done.")));
}

#[test]
fn tile_missing_source_is_hard_failure() {
    let dir = tempfile::tempdir().unwrap();
    rastertiles()
        .args(["tile", "--tiles", "4"])
        .arg(dir.path().join("missing.tif"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unable to read"));
}

#[test]
fn tile_zero_tiles_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_fixture(dir.path(), "dem.tif");
    rastertiles()
        .args(["tile", "--tiles", "0"])
        .arg(&source)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("tile count"));
    assert!(!fs::exists(dir.path().join("dem_tiles")).unwrap());
}
