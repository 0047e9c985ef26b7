#[allow(dead_code)]
mod common;

use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use tempfile::TempDir;

use ccdred_core::frame::FrameKind;
use ccdred_core::io::discover::{
    discover, discover_frames, file_index, sort_by_index, FramePatterns,
};
use ccdred_core::io::fits::{read_frame, read_text_key, HeaderKeys, TrimRegion};
use ccdred_core::io::preview::save_preview_png;

use common::write_exposure;

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"").unwrap();
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[test]
fn test_file_index_takes_last_number() {
    assert_eq!(file_index(Path::new("LPSEB12.fits")), Some(12));
    assert_eq!(file_index(Path::new("data/run2_frame007.fits")), Some(7));
    assert_eq!(file_index(Path::new("domeflat.fits")), None);
}

#[test]
fn test_sort_is_numeric_not_lexical() {
    let mut paths: Vec<PathBuf> = ["Bias10.fits", "Bias2.fits", "Bias.fits", "Bias1.fits"]
        .iter()
        .map(PathBuf::from)
        .collect();
    sort_by_index(&mut paths);
    assert_eq!(
        names(&paths),
        vec!["Bias1.fits", "Bias2.fits", "Bias10.fits", "Bias.fits"]
    );
}

#[test]
fn test_discover_matches_pattern_in_order() {
    let dir = TempDir::new().unwrap();
    for name in ["LPSEB3.fits", "LPSEB11.fits", "LPSEB1.fits", "Bias1.fits", "notes.txt"] {
        touch(dir.path(), name);
    }
    std::fs::create_dir(dir.path().join("LPSEB_old")).unwrap();

    let science = discover(dir.path(), "LPSEB*").unwrap();
    assert_eq!(
        names(&science),
        vec!["LPSEB1.fits", "LPSEB3.fits", "LPSEB11.fits"]
    );
}

#[test]
fn test_discover_frames_per_kind() {
    let dir = TempDir::new().unwrap();
    for name in ["Bias1.fits", "Bias2.fits", "domeflat1.fits", "LPSEB1.fits"] {
        touch(dir.path(), name);
    }
    let found = discover_frames(dir.path(), &FramePatterns::default()).unwrap();
    assert_eq!(found.bias.len(), 2);
    assert!(found.dark.is_empty());
    assert_eq!(found.flat.len(), 1);
    assert_eq!(found.science.len(), 1);
}

#[test]
fn test_invalid_pattern_is_error() {
    let dir = TempDir::new().unwrap();
    assert!(discover(dir.path(), "Bias[").is_err());
}

// ---------------------------------------------------------------------------
// FITS
// ---------------------------------------------------------------------------

#[test]
fn test_fits_round_trip_keeps_orientation_and_header() {
    let dir = TempDir::new().unwrap();
    let data = Array2::from_shape_fn((3, 5), |(r, c)| (r * 10 + c) as f32);
    let path = write_exposure(
        dir.path(),
        "LPSEB1.fits",
        &data,
        "Light Frame",
        Some(30.0),
        Some(2_459_123.25),
    );

    let frame = read_frame(&path, FrameKind::Bias, &HeaderKeys::default(), None).unwrap();
    assert_eq!(frame.dim(), (3, 5));
    // Pixel (x=4, y=2) is row 2, column 4.
    assert_eq!(frame.data[[2, 4]], 24.0);
    assert_eq!(frame.metadata.kind, FrameKind::Science);
    assert_eq!(frame.metadata.exposure_time, Some(30.0));
    assert_abs_diff_eq!(frame.metadata.timestamp.unwrap(), 2_459_123.25, epsilon = 1e-6);
    assert_eq!(frame.metadata.source.as_deref(), Some(path.as_path()));
    assert_eq!(
        read_text_key(&path, "IMAGETYP").unwrap().as_deref().map(str::trim),
        Some("Light Frame")
    );
}

#[test]
fn test_missing_header_keys_are_none() {
    let dir = TempDir::new().unwrap();
    let data = Array2::from_elem((4, 4), 1.0f32);
    let path = write_exposure(dir.path(), "mystery.fits", &data, "unknown", None, None);

    let frame = read_frame(&path, FrameKind::Flat, &HeaderKeys::default(), None).unwrap();
    assert_eq!(frame.metadata.kind, FrameKind::Flat);
    assert!(frame.metadata.exposure_time.is_none());
    assert!(frame.metadata.timestamp.is_none());
    assert!(frame.metadata.filter.is_none());
}

#[test]
fn test_trim_region_applied_on_load() {
    let dir = TempDir::new().unwrap();
    let data = Array2::from_shape_fn((6, 8), |(r, c)| (r * 8 + c) as f32);
    let path = write_exposure(dir.path(), "Bias1.fits", &data, "Bias Frame", None, None);
    let trim = TrimRegion {
        row_start: 1,
        row_end: 4,
        col_start: 2,
        col_end: 7,
    };
    assert_eq!(trim.dim(), (3, 5));

    let frame = read_frame(&path, FrameKind::Bias, &HeaderKeys::default(), Some(&trim)).unwrap();
    assert_eq!(frame.dim(), (3, 5));
    assert_eq!(frame.data[[0, 0]], data[[1, 2]]);

    let too_big = TrimRegion {
        row_end: 10,
        ..trim
    };
    assert!(read_frame(&path, FrameKind::Bias, &HeaderKeys::default(), Some(&too_big)).is_err());
}

#[test]
fn test_unreadable_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Bias1.fits");
    std::fs::write(&path, b"definitely not a FITS file").unwrap();
    assert!(read_frame(&path, FrameKind::Bias, &HeaderKeys::default(), None).is_err());
    assert!(read_frame(
        &dir.path().join("absent.fits"),
        FrameKind::Bias,
        &HeaderKeys::default(),
        None
    )
    .is_err());
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[test]
fn test_preview_png_written() {
    let dir = TempDir::new().unwrap();
    let mut data = Array2::from_shape_fn((20, 30), |(r, c)| (r + c) as f32);
    data[[0, 0]] = f32::NAN;
    let path = dir.path().join("preview.png");
    save_preview_png(&data.view(), &path).unwrap();

    let img = image::open(&path).unwrap().to_luma8();
    assert_eq!(img.dimensions(), (30, 20));
    assert_eq!(img.get_pixel(0, 0).0[0], 0);
    assert_eq!(img.get_pixel(29, 19).0[0], 255);
}
