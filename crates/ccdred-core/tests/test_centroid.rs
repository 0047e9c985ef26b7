#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use ccdred_core::centroid::{
    refine_positions, CenterOfMass, CentroidConfig, CentroidMethod, Centroider, Quadratic,
};
use ccdred_core::photometry::PixelPosition;

use common::gaussian_star;

// ---------------------------------------------------------------------------
// Individual strategies
// ---------------------------------------------------------------------------

#[test]
fn test_center_of_mass_finds_offset_star() {
    let data = gaussian_star(48, 48, 100.0, 20.3, 24.7, 800.0, 2.0);
    let refined = CenterOfMass
        .refine(&data.view(), 100.0, PixelPosition::new(21.0, 24.0), 15)
        .unwrap();
    assert_abs_diff_eq!(refined.x, 20.3, epsilon = 0.05);
    assert_abs_diff_eq!(refined.y, 24.7, epsilon = 0.05);
}

#[test]
fn test_quadratic_finds_offset_star() {
    let data = gaussian_star(48, 48, 100.0, 20.3, 24.7, 800.0, 2.0);
    let refined = Quadratic
        .refine(&data.view(), 100.0, PixelPosition::new(21.0, 24.0), 15)
        .unwrap();
    assert_abs_diff_eq!(refined.x, 20.3, epsilon = 0.2);
    assert_abs_diff_eq!(refined.y, 24.7, epsilon = 0.2);
}

#[test]
fn test_quadratic_exact_on_centred_star() {
    let data = gaussian_star(31, 31, 0.0, 15.0, 15.0, 500.0, 1.5);
    let refined = Quadratic
        .refine(&data.view(), 0.0, PixelPosition::new(14.0, 16.0), 9)
        .unwrap();
    assert_abs_diff_eq!(refined.x, 15.0, epsilon = 1e-6);
    assert_abs_diff_eq!(refined.y, 15.0, epsilon = 1e-6);
}

#[test]
fn test_quadratic_rejects_flat_region() {
    let data = Array2::from_elem((20, 20), 7.0f32);
    assert!(Quadratic
        .refine(&data.view(), 7.0, PixelPosition::new(10.0, 10.0), 5)
        .is_none());
}

#[test]
fn test_center_of_mass_rejects_empty_box() {
    let data = Array2::from_elem((20, 20), 7.0f32);
    assert!(CenterOfMass
        .refine(&data.view(), 7.0, PixelPosition::new(10.0, 10.0), 5)
        .is_none());
}

#[test]
fn test_nominal_outside_frame_is_none() {
    let data = gaussian_star(20, 20, 0.0, 10.0, 10.0, 100.0, 1.0);
    assert!(CenterOfMass
        .refine(&data.view(), 0.0, PixelPosition::new(-30.0, 10.0), 5)
        .is_none());
}

// ---------------------------------------------------------------------------
// refine_positions
// ---------------------------------------------------------------------------

#[test]
fn test_refine_positions_counts_fallbacks() {
    let data = gaussian_star(64, 64, 20.0, 16.2, 16.4, 600.0, 1.8);
    let nominal = [
        PixelPosition::new(17.0, 16.0),
        // Empty sky: nothing to lock onto.
        PixelPosition::new(48.0, 48.0),
    ];
    let config = CentroidConfig {
        method: CentroidMethod::CenterOfMass,
        box_size: 15,
    };
    let refined = refine_positions(&data.view(), &nominal, &config);
    assert_eq!(refined.positions.len(), 2);
    assert_abs_diff_eq!(refined.positions[0].x, 16.2, epsilon = 0.05);
    assert_abs_diff_eq!(refined.positions[0].y, 16.4, epsilon = 0.05);
    assert_eq!(refined.positions[1], nominal[1]);
    assert_eq!(refined.fallbacks, 1);
}

#[test]
fn test_centroid_defaults() {
    let config = CentroidConfig::default();
    assert_eq!(config.method, CentroidMethod::Quadratic);
    assert_eq!(config.box_size, 15);
    assert_eq!(format!("{}", CentroidMethod::CenterOfMass), "Center of Mass");
}
