//! Centre-of-mass (intensity-weighted) centroid.

use ndarray::ArrayView2;

use crate::photometry::PixelPosition;

use super::{Centroider, SearchBox};

#[derive(Clone, Copy, Debug, Default)]
pub struct CenterOfMass;

impl Centroider for CenterOfMass {
    fn refine(
        &self,
        data: &ArrayView2<f32>,
        background: f32,
        nominal: PixelPosition,
        box_size: usize,
    ) -> Option<PixelPosition> {
        let window = SearchBox::around(nominal, box_size, data.dim())?;

        let mut sum_r = 0.0f64;
        let mut sum_c = 0.0f64;
        let mut sum_w = 0.0f64;
        for row in window.row0..window.row1 {
            for col in window.col0..window.col1 {
                let val = data[[row, col]] - background;
                if val.is_finite() && val > 0.0 {
                    let weight = val as f64;
                    sum_r += row as f64 * weight;
                    sum_c += col as f64 * weight;
                    sum_w += weight;
                }
            }
        }

        if sum_w > 0.0 {
            Some(PixelPosition::new(sum_c / sum_w, sum_r / sum_w))
        } else {
            None
        }
    }
}
