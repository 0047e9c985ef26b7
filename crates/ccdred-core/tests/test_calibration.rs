#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use tempfile::TempDir;

use ccdred_core::calibration::{CalibrationBuilder, MasterFrame, MasterKind};
use ccdred_core::error::CcdError;
use ccdred_core::frame::{FrameKind, RawFrame};
use ccdred_core::stack::SigmaClipParams;
use ccdred_core::stats::finite_median;

use common::flat_frame;

fn builder() -> CalibrationBuilder {
    CalibrationBuilder::new(SigmaClipParams::default())
}

fn bias_master(level: f32) -> MasterFrame {
    builder()
        .build_bias(&[
            flat_frame(8, 8, level, FrameKind::Bias),
            flat_frame(8, 8, level, FrameKind::Bias),
        ])
        .unwrap()
}

// ---------------------------------------------------------------------------
// Master bias
// ---------------------------------------------------------------------------

#[test]
fn test_bias_of_constant_frames() {
    let master = bias_master(500.0);
    assert_eq!(master.kind, MasterKind::Bias);
    for v in master.data.iter() {
        assert_abs_diff_eq!(*v, 500.0);
    }
}

#[test]
fn test_empty_bias_list_is_error() {
    assert!(matches!(
        builder().build_bias(&[]),
        Err(CcdError::EmptySequence)
    ));
}

// ---------------------------------------------------------------------------
// Master dark
// ---------------------------------------------------------------------------

#[test]
fn test_dark_is_bias_subtracted_and_keeps_reference_exposure() {
    let bias = bias_master(100.0);
    let darks: Vec<RawFrame> = (0..3)
        .map(|_| flat_frame(8, 8, 130.0, FrameKind::Dark).with_exposure(60.0))
        .collect();
    let dark = builder().build_dark(&darks, &bias, None).unwrap();
    assert_eq!(dark.kind, MasterKind::Dark);
    assert_eq!(dark.reference_exposure, Some(60.0));
    for v in dark.data.iter() {
        assert_abs_diff_eq!(*v, 30.0);
    }
}

#[test]
fn test_dark_explicit_exposure_overrides_headers() {
    let bias = bias_master(0.0);
    let darks = vec![flat_frame(8, 8, 10.0, FrameKind::Dark)];
    let dark = builder().build_dark(&darks, &bias, Some(30.0)).unwrap();
    assert_eq!(dark.reference_exposure, Some(30.0));
}

#[test]
fn test_dark_without_exposure_is_error() {
    let bias = bias_master(0.0);
    let darks = vec![flat_frame(8, 8, 10.0, FrameKind::Dark)];
    assert!(matches!(
        builder().build_dark(&darks, &bias, None),
        Err(CcdError::MissingExposure(_))
    ));
}

#[test]
fn test_dark_mixed_exposures_is_error() {
    let bias = bias_master(0.0);
    let darks = vec![
        flat_frame(8, 8, 10.0, FrameKind::Dark).with_exposure(30.0),
        flat_frame(8, 8, 20.0, FrameKind::Dark).with_exposure(60.0),
    ];
    assert!(matches!(
        builder().build_dark(&darks, &bias, None),
        Err(CcdError::PreconditionViolation(_))
    ));
}

#[test]
fn test_dark_scale_is_exposure_ratio() {
    let mut dark = MasterFrame::new(MasterKind::Dark, Array2::zeros((2, 2)));
    dark.reference_exposure = Some(30.0);
    assert_abs_diff_eq!(dark.dark_scale(60.0).unwrap(), 2.0);
    assert_abs_diff_eq!(dark.dark_scale(15.0).unwrap(), 0.5);

    dark.reference_exposure = None;
    assert!(dark.dark_scale(60.0).is_err());
}

// ---------------------------------------------------------------------------
// Master flat
// ---------------------------------------------------------------------------

#[test]
fn test_flat_has_unit_median() {
    let bias = bias_master(100.0);
    let flats: Vec<RawFrame> = (0..3)
        .map(|_| {
            let data = Array2::from_shape_fn((8, 8), |(r, c)| 1100.0 + (r * 8 + c) as f32);
            RawFrame::new(data, FrameKind::Flat)
        })
        .collect();
    let flat = builder().build_flat(&flats, &bias, None, None).unwrap();
    let median = finite_median(&flat.data.view()).unwrap();
    assert_abs_diff_eq!(median, 1.0, epsilon = 1e-6);
    // Bias-subtracted median of 1000..1063 is 1031.5.
    assert_abs_diff_eq!(flat.normalization.unwrap(), 1031.5, epsilon = 1e-3);
}

#[test]
fn test_flat_subtracts_scaled_dark() {
    let bias = bias_master(0.0);
    let mut dark = MasterFrame::new(MasterKind::Dark, Array2::from_elem((8, 8), 10.0));
    dark.reference_exposure = Some(10.0);
    // 20 s flats carry 2x the reference dark current.
    let flats = vec![
        flat_frame(8, 8, 220.0, FrameKind::Flat).with_exposure(20.0),
        flat_frame(8, 8, 220.0, FrameKind::Flat).with_exposure(20.0),
    ];
    let flat = builder()
        .build_flat(&flats, &bias, Some(&dark), None)
        .unwrap();
    assert_abs_diff_eq!(flat.normalization.unwrap(), 200.0, epsilon = 1e-4);
}

#[test]
fn test_flat_mixed_filters_is_error() {
    let bias = bias_master(0.0);
    let flats = vec![
        flat_frame(8, 8, 100.0, FrameKind::Flat).with_filter("V"),
        flat_frame(8, 8, 100.0, FrameKind::Flat).with_filter("R"),
    ];
    match builder().build_flat(&flats, &bias, None, None) {
        Err(CcdError::FilterMismatch { first, other }) => {
            assert_eq!(first, "V");
            assert_eq!(other, "R");
        }
        other => panic!("expected FilterMismatch, got {other:?}"),
    }
}

#[test]
fn test_flat_zero_median_is_degenerate() {
    let bias = bias_master(100.0);
    let flats = vec![flat_frame(8, 8, 100.0, FrameKind::Flat)];
    assert!(matches!(
        builder().build_flat(&flats, &bias, None, None),
        Err(CcdError::DegenerateFlat { .. })
    ));
}

#[test]
fn test_flat_shape_mismatch_with_bias() {
    let bias = bias_master(0.0);
    let flats = vec![flat_frame(4, 8, 100.0, FrameKind::Flat)];
    assert!(matches!(
        builder().build_flat(&flats, &bias, None, None),
        Err(CcdError::ShapeMismatch { .. })
    ));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_masters_persisted_and_reloaded() {
    let dir = TempDir::new().unwrap();
    let persisting = builder().persist_to(dir.path());

    let bias = persisting
        .build_bias(&[flat_frame(8, 8, 50.0, FrameKind::Bias)])
        .unwrap();
    let dark = persisting
        .build_dark(
            &[flat_frame(8, 8, 65.0, FrameKind::Dark).with_exposure(120.0)],
            &bias,
            None,
        )
        .unwrap();
    let flat = persisting
        .build_flat(
            &[flat_frame(8, 8, 450.0, FrameKind::Flat).with_exposure(1.0)],
            &bias,
            Some(&dark),
            None,
        )
        .unwrap();

    let bias_path = dir.path().join("master_bias.fits");
    let dark_path = dir.path().join("master_dark.fits");
    let flat_path = dir.path().join("master_flat.fits");
    assert!(bias_path.exists());
    assert!(dark_path.exists());
    assert!(flat_path.exists());

    let loaded = MasterFrame::load(&dark_path, MasterKind::Dark).unwrap();
    assert_eq!(loaded.reference_exposure, Some(120.0));
    assert_eq!(loaded.data, dark.data);

    let loaded = MasterFrame::load(&flat_path, MasterKind::Flat).unwrap();
    assert_abs_diff_eq!(
        loaded.normalization.unwrap(),
        flat.normalization.unwrap(),
        epsilon = 1e-9
    );
    for v in loaded.data.iter() {
        assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_loading_wrong_master_kind_is_error() {
    let dir = TempDir::new().unwrap();
    let bias = builder()
        .persist_to(dir.path())
        .build_bias(&[flat_frame(4, 4, 10.0, FrameKind::Bias)])
        .unwrap();
    assert_eq!(bias.kind, MasterKind::Bias);
    let path = dir.path().join(MasterKind::Bias.file_name());
    assert!(MasterFrame::load(&path, MasterKind::Flat).is_err());
}
