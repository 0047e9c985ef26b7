use std::f64::consts::PI;

use ndarray::ArrayView2;
use rayon::prelude::*;
use tracing::warn;

use crate::consts::PARALLEL_POSITION_THRESHOLD;

use super::overlap::{pixel_annulus_overlap, pixel_overlap};
use super::{
    ApertureMeasurement, ApertureSpec, MeasurementStatus, PhotometryResult, PixelPosition,
    PositionPhotometry,
};

/// Measures background-subtracted flux in circular apertures.
#[derive(Clone, Debug)]
pub struct Photometer {
    spec: ApertureSpec,
}

/// Weighted sum over a circular footprint.
struct RegionSum {
    sum: f64,
    /// Sum of overlap weights over in-frame, finite pixels.
    area: f64,
    truncated: bool,
    non_finite: bool,
}

impl Photometer {
    pub fn new(spec: ApertureSpec) -> Self {
        if !spec.annulus_clears_apertures() {
            warn!(
                sky_radius_in = spec.sky_radius_in,
                max_radius = spec.max_radius(),
                "Sky annulus overlaps the largest aperture; background will include source flux"
            );
        }
        Self { spec }
    }

    pub fn spec(&self) -> &ApertureSpec {
        &self.spec
    }

    /// Measure every radius at every position.
    ///
    /// Pixels are weighted by their exact overlap with the aperture, so flux
    /// varies smoothly with radius. The annulus background is estimated once
    /// per position and shared by all radii.
    pub fn measure(&self, data: &ArrayView2<f32>, positions: &[PixelPosition]) -> PhotometryResult {
        let positions = if positions.len() >= PARALLEL_POSITION_THRESHOLD {
            positions
                .par_iter()
                .map(|p| self.measure_position(data, *p))
                .collect()
        } else {
            positions
                .iter()
                .map(|p| self.measure_position(data, *p))
                .collect()
        };
        PhotometryResult { positions }
    }

    fn measure_position(&self, data: &ArrayView2<f32>, position: PixelPosition) -> PositionPhotometry {
        let r_in = self.spec.sky_radius_in;
        let r_out = self.spec.sky_radius_out();
        let annulus = sum_region(data, position, r_out, |col, row| {
            pixel_annulus_overlap(col, row, position.x, position.y, r_in, r_out)
        });
        let analytic_annulus = PI * (r_out * r_out - r_in * r_in);
        let annulus_area = if annulus.truncated || annulus.non_finite {
            annulus.area
        } else {
            analytic_annulus
        };
        let background_per_pixel = if annulus_area > 0.0 {
            annulus.sum / annulus_area
        } else {
            f64::NAN
        };

        let measurements = self
            .spec
            .radii
            .iter()
            .map(|&radius| {
                let aperture = sum_region(data, position, radius, |col, row| {
                    pixel_overlap(col, row, position.x, position.y, radius)
                });
                let aperture_area = if aperture.truncated {
                    aperture.area
                } else {
                    PI * radius * radius
                };
                let raw_flux = if aperture.non_finite {
                    f64::NAN
                } else {
                    aperture.sum
                };
                let status = if aperture.non_finite || annulus.non_finite {
                    MeasurementStatus::NonFinite
                } else if aperture.truncated {
                    MeasurementStatus::ApertureTruncated
                } else if annulus.truncated {
                    MeasurementStatus::AnnulusTruncated
                } else {
                    MeasurementStatus::Valid
                };
                ApertureMeasurement {
                    radius,
                    raw_flux,
                    flux: raw_flux - background_per_pixel * aperture_area,
                    aperture_area,
                    annulus_area,
                    background_per_pixel,
                    status,
                }
            })
            .collect();

        PositionPhotometry {
            position,
            measurements,
        }
    }
}

/// Sum `weight(col, row) * pixel` over the bounding box of a circle of
/// `radius` around `center`.
///
/// Non-finite pixels with positive weight are skipped and reported.
fn sum_region<F>(data: &ArrayView2<f32>, center: PixelPosition, radius: f64, weight: F) -> RegionSum
where
    F: Fn(f64, f64) -> f64,
{
    let (h, w) = data.dim();
    let truncated = center.x - radius < -0.5
        || center.y - radius < -0.5
        || center.x + radius > w as f64 - 0.5
        || center.y + radius > h as f64 - 0.5;

    let col_lo = (center.x - radius).floor().max(0.0) as usize;
    let row_lo = (center.y - radius).floor().max(0.0) as usize;
    let col_hi = ((center.x + radius).ceil() + 1.0).clamp(0.0, w as f64) as usize;
    let row_hi = ((center.y + radius).ceil() + 1.0).clamp(0.0, h as f64) as usize;

    let mut sum = 0.0;
    let mut area = 0.0;
    let mut non_finite = false;
    for row in row_lo..row_hi {
        for col in col_lo..col_hi {
            let wgt = weight(col as f64, row as f64);
            if wgt <= 0.0 {
                continue;
            }
            let v = data[[row, col]];
            if !v.is_finite() {
                non_finite = true;
                continue;
            }
            sum += wgt * v as f64;
            area += wgt;
        }
    }
    RegionSum {
        sum,
        area,
        truncated,
        non_finite,
    }
}
