#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use tempfile::TempDir;

use ccdred_core::calibration::{CalibrationBuilder, MasterFrame, MasterKind};
use ccdred_core::error::CcdError;
use ccdred_core::frame::{FrameKind, RawFrame};
use ccdred_core::io::fits::{read_frame, HeaderKeys};
use ccdred_core::reduce::ScienceReducer;
use ccdred_core::stack::SigmaClipParams;

use common::flat_frame;

fn master(kind: MasterKind, h: usize, w: usize, fill: f32) -> MasterFrame {
    MasterFrame::new(kind, Array2::from_elem((h, w), fill))
}

// ---------------------------------------------------------------------------
// Identity and scaling
// ---------------------------------------------------------------------------

#[test]
fn test_zero_bias_unit_flat_is_identity() {
    let bias = master(MasterKind::Bias, 6, 7, 0.0);
    let flat = master(MasterKind::Flat, 6, 7, 1.0);
    let reducer = ScienceReducer::new(&bias, &flat, None).unwrap();

    let data = Array2::from_shape_fn((6, 7), |(r, c)| (r * 7 + c) as f32 * 3.5);
    let frame = RawFrame::new(data.clone(), FrameKind::Science);
    let out = reducer.reduce(&frame).unwrap();
    assert_eq!(out.data, data);
    assert_eq!(out.guarded_pixels, 0);
}

#[test]
fn test_dark_scaled_by_exposure_ratio() {
    let bias = master(MasterKind::Bias, 4, 4, 0.0);
    let flat = master(MasterKind::Flat, 4, 4, 1.0);
    let mut dark = master(MasterKind::Dark, 4, 4, 3.0);
    dark.reference_exposure = Some(30.0);
    let reducer = ScienceReducer::new(&bias, &flat, Some(&dark)).unwrap();

    let frame = flat_frame(4, 4, 50.0, FrameKind::Science).with_exposure(60.0);
    let out = reducer.reduce(&frame).unwrap();
    for v in out.data.iter() {
        assert_abs_diff_eq!(*v, 44.0, epsilon = 1e-5);
    }
}

#[test]
fn test_flat_division() {
    let bias = master(MasterKind::Bias, 2, 2, 10.0);
    let mut flat_data = Array2::from_elem((2, 2), 1.0f32);
    flat_data[[0, 1]] = 0.5;
    flat_data[[1, 0]] = 2.0;
    let flat = MasterFrame::new(MasterKind::Flat, flat_data);
    let reducer = ScienceReducer::new(&bias, &flat, None).unwrap();

    let out = reducer
        .reduce(&flat_frame(2, 2, 110.0, FrameKind::Science))
        .unwrap();
    assert_abs_diff_eq!(out.data[[0, 0]], 100.0);
    assert_abs_diff_eq!(out.data[[0, 1]], 200.0);
    assert_abs_diff_eq!(out.data[[1, 0]], 50.0);
}

// ---------------------------------------------------------------------------
// End-to-end calibration scenario
// ---------------------------------------------------------------------------

#[test]
fn test_end_to_end_reduces_to_ninety() {
    let builder = CalibrationBuilder::new(SigmaClipParams::default());
    let biases: Vec<RawFrame> = (0..3)
        .map(|_| flat_frame(16, 16, 100.0, FrameKind::Bias))
        .collect();
    let darks: Vec<RawFrame> = (0..3)
        .map(|_| flat_frame(16, 16, 105.0, FrameKind::Dark).with_exposure(10.0))
        .collect();

    let bias = builder.build_bias(&biases).unwrap();
    let dark = builder.build_dark(&darks, &bias, None).unwrap();
    let flat = master(MasterKind::Flat, 16, 16, 1.0);

    let science = flat_frame(16, 16, 200.0, FrameKind::Science).with_exposure(20.0);
    let reducer = ScienceReducer::new(&bias, &flat, Some(&dark)).unwrap();
    let out = reducer.reduce(&science).unwrap();
    for v in out.data.iter() {
        assert_abs_diff_eq!(*v, 90.0, epsilon = 1e-4);
    }
}

// ---------------------------------------------------------------------------
// Degeneracies and errors
// ---------------------------------------------------------------------------

#[test]
fn test_tiny_flat_pixels_are_guarded() {
    let bias = master(MasterKind::Bias, 3, 3, 0.0);
    let mut flat_data = Array2::from_elem((3, 3), 1.0f32);
    flat_data[[1, 1]] = 0.0;
    flat_data[[2, 2]] = f32::NAN;
    let flat = MasterFrame::new(MasterKind::Flat, flat_data);
    let reducer = ScienceReducer::new(&bias, &flat, None).unwrap();

    let out = reducer
        .reduce(&flat_frame(3, 3, 5.0, FrameKind::Science))
        .unwrap();
    assert!(out.data[[1, 1]].is_nan());
    assert!(out.data[[2, 2]].is_nan());
    assert_abs_diff_eq!(out.data[[0, 0]], 5.0);
    assert_eq!(out.guarded_pixels, 2);
}

#[test]
fn test_missing_science_exposure_with_dark_is_error() {
    let bias = master(MasterKind::Bias, 2, 2, 0.0);
    let flat = master(MasterKind::Flat, 2, 2, 1.0);
    let mut dark = master(MasterKind::Dark, 2, 2, 1.0);
    dark.reference_exposure = Some(10.0);
    let reducer = ScienceReducer::new(&bias, &flat, Some(&dark)).unwrap();
    let result = reducer.reduce(&flat_frame(2, 2, 5.0, FrameKind::Science));
    assert!(matches!(result, Err(CcdError::MissingExposure(_))));
}

#[test]
fn test_shape_mismatch_is_error() {
    let bias = master(MasterKind::Bias, 4, 4, 0.0);
    let flat = master(MasterKind::Flat, 4, 4, 1.0);
    let reducer = ScienceReducer::new(&bias, &flat, None).unwrap();
    let result = reducer.reduce(&flat_frame(4, 5, 5.0, FrameKind::Science));
    assert!(matches!(result, Err(CcdError::ShapeMismatch { .. })));
}

#[test]
fn test_wrong_master_kind_rejected() {
    let bias = master(MasterKind::Bias, 2, 2, 0.0);
    let not_flat = master(MasterKind::Dark, 2, 2, 1.0);
    assert!(ScienceReducer::new(&bias, &not_flat, None).is_err());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_reduce_and_save_keeps_exposure_and_timestamp() {
    let dir = TempDir::new().unwrap();
    let bias = master(MasterKind::Bias, 5, 6, 1.0);
    let flat = master(MasterKind::Flat, 5, 6, 1.0);
    let reducer = ScienceReducer::new(&bias, &flat, None).unwrap();

    let frame = flat_frame(5, 6, 11.0, FrameKind::Science)
        .with_exposure(45.0)
        .with_timestamp(2_459_000.5);
    let path = dir.path().join("reduced_science1.fits");
    reducer.reduce_and_save(&frame, &path).unwrap();

    let loaded = read_frame(&path, FrameKind::Science, &HeaderKeys::default(), None).unwrap();
    assert_eq!(loaded.dim(), (5, 6));
    assert_eq!(loaded.metadata.exposure_time, Some(45.0));
    assert_abs_diff_eq!(loaded.metadata.timestamp.unwrap(), 2_459_000.5, epsilon = 1e-6);
    for v in loaded.data.iter() {
        assert_abs_diff_eq!(*v, 10.0);
    }
}
