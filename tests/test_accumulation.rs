mod common;

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDateTime};
use common::{init_logging, start_time};
use ndarray::Array2;
use radar_rainfall::config::AccumulationParams;
use radar_rainfall::core::AccumulationEngine;
use radar_rainfall::io::raster::{rainfall_path, read_raster, write_npy_atomic};
use std::path::Path;
use tempfile::TempDir;

const SHAPE: (usize, usize) = (4, 6);

fn write_frame(dir: &Path, timestamp: NaiveDateTime, data: &Array2<f32>) {
    write_npy_atomic(&rainfall_path(dir, timestamp), data).expect("Failed to write frame");
}

/// Uniform frames every five minutes from `first`
fn write_series(dir: &Path, first: NaiveDateTime, count: usize, value: f32) {
    for i in 0..count {
        let ts = first + Duration::minutes(5 * i as i64);
        write_frame(dir, ts, &Array2::from_elem(SHAPE, value));
    }
}

fn at(minutes: i64) -> NaiveDateTime {
    start_time() + Duration::minutes(minutes)
}

#[test]
fn test_twelve_frames_sum_to_one_hour() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    // 00:00..00:55 precede the 01:00 anchor
    write_series(frames.path(), at(0), 13, 1.5);

    let engine = AccumulationEngine::new(AccumulationParams::default());
    let report = engine.run(frames.path(), output.path()).unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.insufficient_history, 1);

    let total = read_raster(&output.path().join("1h/rainfall_202311090100.npy")).unwrap();
    assert_eq!(total.dim(), SHAPE);
    assert!(total.iter().all(|&v| (v - 18.0).abs() < 1e-5));
}

#[test]
fn test_anchor_is_not_part_of_its_window() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    // each frame holds its own position: 0 at 00:00 .. 12 at 01:00
    for i in 0..13 {
        write_frame(frames.path(), at(5 * i), &Array2::from_elem(SHAPE, i as f32));
    }

    let engine = AccumulationEngine::new(AccumulationParams::default());
    engine.run(frames.path(), output.path()).unwrap();

    let total = read_raster(&output.path().join("1h/rainfall_202311090100.npy")).unwrap();
    println!("Sum at 01:00: {}", total[[0, 0]]);
    assert_relative_eq!(total[[0, 0]], 66.0);
}

#[test]
fn test_eleven_preceding_frames_produce_nothing() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    // 00:05..01:00: the 01:00 anchor has eleven frames before it
    write_series(frames.path(), at(5), 12, 1.0);

    let engine = AccumulationEngine::new(AccumulationParams::default());
    let report = engine.run(frames.path(), output.path()).unwrap();
    assert!(report.written.is_empty());
    assert_eq!(report.insufficient_history, 1);
    assert_eq!(std::fs::read_dir(output.path().join("1h")).unwrap().count(), 0);
}

#[test]
fn test_no_data_counts_as_zero() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_series(frames.path(), at(0), 13, 2.0);

    let mut holes = Array2::from_elem(SHAPE, 2.0_f32);
    holes[[0, 0]] = f32::NAN;
    holes[[3, 5]] = f32::NAN;
    write_frame(frames.path(), at(30), &holes);

    let engine = AccumulationEngine::new(AccumulationParams::default());
    engine.run(frames.path(), output.path()).unwrap();

    let total = read_raster(&output.path().join("1h/rainfall_202311090100.npy")).unwrap();
    assert!(total.iter().all(|v| v.is_finite()));
    assert_relative_eq!(total[[0, 0]], 22.0);
    assert_relative_eq!(total[[3, 5]], 22.0);
    assert_relative_eq!(total[[1, 1]], 24.0);
}

#[test]
fn test_window_is_positional_across_gaps() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    // 23:55 then 00:00..01:00 with 00:30 missing: twelve frames still
    // precede 01:00, so the window reaches back to 23:55
    write_frame(frames.path(), at(-5), &Array2::from_elem(SHAPE, 100.0));
    for minutes in (0..=60).step_by(5).filter(|&m| m != 30) {
        write_frame(frames.path(), at(minutes), &Array2::from_elem(SHAPE, 1.0));
    }

    let engine = AccumulationEngine::new(AccumulationParams::default());
    let report = engine.run(frames.path(), output.path()).unwrap();
    assert_eq!(report.insufficient_history, 1);
    assert_eq!(report.written.len(), 1);

    let total = read_raster(&output.path().join("1h/rainfall_202311090100.npy")).unwrap();
    assert_relative_eq!(total[[2, 2]], 111.0);
}

#[test]
fn test_bad_constituent_skips_only_its_anchor() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_series(frames.path(), at(0), 25, 1.0);
    std::fs::write(rainfall_path(frames.path(), at(30)), b"corrupt").unwrap();

    let engine = AccumulationEngine::new(AccumulationParams::default());
    let report = engine.run(frames.path(), output.path()).unwrap();
    println!("Report: {:?}", report);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, at(60));
    assert_eq!(report.written.len(), 1);
    assert!(!output.path().join("1h/rainfall_202311090100.npy").exists());
    assert!(output.path().join("1h/rainfall_202311090200.npy").exists());
}

#[test]
fn test_shape_mismatch_skips_anchor() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_series(frames.path(), at(0), 13, 1.0);
    write_frame(frames.path(), at(45), &Array2::from_elem((4, 5), 1.0));

    let engine = AccumulationEngine::new(AccumulationParams::default());
    let report = engine.run(frames.path(), output.path()).unwrap();
    assert!(report.written.is_empty());
    assert_eq!(report.failed.len(), 1);
}

#[test]
fn test_multiple_window_lengths() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_series(frames.path(), at(0), 37, 0.5);

    let params = AccumulationParams { windows_hours: vec![1, 3], ..Default::default() };
    let engine = AccumulationEngine::new(params);
    let report = engine.run(frames.path(), output.path()).unwrap();

    // 1h: 01:00, 02:00, 03:00; 3h: only 03:00 has 36 frames before it
    assert_eq!(report.written.len(), 4);
    assert_eq!(report.insufficient_history, 4);

    let three_hour = read_raster(&output.path().join("3h/rainfall_202311090300.npy")).unwrap();
    assert_relative_eq!(three_hour[[0, 0]], 18.0, epsilon = 1e-5);
    let one_hour = read_raster(&output.path().join("1h/rainfall_202311090200.npy")).unwrap();
    assert_relative_eq!(one_hour[[0, 0]], 6.0, epsilon = 1e-5);
}

#[test]
fn test_rerun_rewrites_identical_products() {
    init_logging();

    let frames = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_series(frames.path(), at(0), 13, 0.25);

    let engine = AccumulationEngine::new(AccumulationParams::default());
    engine.run(frames.path(), output.path()).unwrap();
    let path = output.path().join("1h/rainfall_202311090100.npy");
    let first = std::fs::read(&path).unwrap();

    engine.run(frames.path(), output.path()).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);
}
