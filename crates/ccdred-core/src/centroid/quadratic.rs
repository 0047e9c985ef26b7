//! Quadratic-surface centroid.
//!
//! Fits `f = c0 + c1 x + c2 y + c3 x^2 + c4 xy + c5 y^2` by least squares to the
//! 3x3 neighbourhood of the brightest pixel in the search box and returns the
//! location of the surface maximum.

use ndarray::ArrayView2;

use crate::photometry::PixelPosition;

use super::{Centroider, SearchBox};

#[derive(Clone, Copy, Debug, Default)]
pub struct Quadratic;

impl Centroider for Quadratic {
    fn refine(
        &self,
        data: &ArrayView2<f32>,
        background: f32,
        nominal: PixelPosition,
        box_size: usize,
    ) -> Option<PixelPosition> {
        let (h, w) = data.dim();
        let window = SearchBox::around(nominal, box_size, (h, w))?;

        let mut peak: Option<(usize, usize, f32)> = None;
        for row in window.row0..window.row1 {
            for col in window.col0..window.col1 {
                let v = data[[row, col]];
                if v.is_finite() && peak.map_or(true, |(_, _, best)| v > best) {
                    peak = Some((row, col, v));
                }
            }
        }
        let (pr, pc, _) = peak?;
        if pr == 0 || pc == 0 || pr + 1 >= h || pc + 1 >= w {
            return None;
        }

        // f[j][i] with x = i - 1, y = j - 1.
        let mut f = [[0.0f64; 3]; 3];
        for (j, fr) in f.iter_mut().enumerate() {
            for (i, v) in fr.iter_mut().enumerate() {
                let value = data[[pr + j - 1, pc + i - 1]];
                if !value.is_finite() {
                    return None;
                }
                *v = (value - background) as f64;
            }
        }

        let col_sum = |i: usize| f[0][i] + f[1][i] + f[2][i];
        let row_sum = |j: usize| f[j][0] + f[j][1] + f[j][2];

        // The grid is symmetric, so the least-squares terms decouple.
        let c1 = (col_sum(2) - col_sum(0)) / 6.0;
        let c2 = (row_sum(2) - row_sum(0)) / 6.0;
        let c3 = (col_sum(0) + col_sum(2) - 2.0 * col_sum(1)) / 6.0;
        let c5 = (row_sum(0) + row_sum(2) - 2.0 * row_sum(1)) / 6.0;
        let c4 = (f[2][2] + f[0][0] - f[0][2] - f[2][0]) / 4.0;

        let det = 4.0 * c3 * c5 - c4 * c4;
        if c3 >= 0.0 || det <= 0.0 {
            return None;
        }
        let dx = (c4 * c2 - 2.0 * c5 * c1) / det;
        let dy = (c4 * c1 - 2.0 * c3 * c2) / det;
        if dx.abs() > 1.0 || dy.abs() > 1.0 {
            return None;
        }

        Some(PixelPosition::new(pc as f64 + dx, pr as f64 + dy))
    }
}
