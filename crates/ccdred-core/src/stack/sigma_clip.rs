use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::{DEFAULT_CLIP_ITERATIONS, DEFAULT_CLIP_SIGMA, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{CcdError, Result};
use crate::frame::RawFrame;
use crate::stats::{mean_std, median_in_place};

/// Central statistic that clipping distances are measured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipCenter {
    #[default]
    Median,
    Mean,
}

/// Statistic used to combine the values that survive clipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineMethod {
    #[default]
    Median,
    Mean,
}

impl std::fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "Median"),
            Self::Mean => write!(f, "Mean"),
        }
    }
}

/// Parameters for sigma-clipped stacking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipParams {
    /// Sigma threshold: values beyond center +/- sigma*stddev are rejected (default: 3.0).
    pub sigma: f32,
    /// Upper bound on rejection iterations (default: 5).
    pub max_iterations: usize,
    pub center: ClipCenter,
    pub combine: CombineMethod,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_CLIP_SIGMA,
            max_iterations: DEFAULT_CLIP_ITERATIONS,
            center: ClipCenter::Median,
            combine: CombineMethod::Median,
        }
    }
}

/// Output of a sigma-clipped combination.
#[derive(Clone, Debug)]
pub struct CombinedFrame {
    pub data: Array2<f32>,
    /// Number of input samples rejected across all pixels.
    pub rejected: usize,
    /// Pixels whose every contributor was rejected; these hold NaN.
    pub undefined_pixels: usize,
}

/// Stack raw frames with sigma clipping. See [`sigma_clip_combine`].
pub fn sigma_clip_stack(frames: &[RawFrame], params: &SigmaClipParams) -> Result<CombinedFrame> {
    let views: Vec<ArrayView2<f32>> = frames.iter().map(|f| f.data.view()).collect();
    sigma_clip_combine(&views, params)
}

/// Combine same-shape frames pixel by pixel with sigma clipping.
///
/// Per pixel: drop non-finite samples, then repeatedly compute the center and
/// standard deviation of the surviving samples and reject those further than
/// `sigma` standard deviations from the center. Stops when nothing new is
/// rejected, the spread is zero, or `max_iterations` is reached. Survivors are
/// combined with `params.combine`.
///
/// A pixel with no surviving samples is NaN in the output and counted in
/// [`CombinedFrame::undefined_pixels`].
pub fn sigma_clip_combine(
    frames: &[ArrayView2<f32>],
    params: &SigmaClipParams,
) -> Result<CombinedFrame> {
    if frames.is_empty() {
        return Err(CcdError::EmptySequence);
    }
    if !(params.sigma > 0.0) {
        return Err(CcdError::Config(format!(
            "sigma must be positive, got {}",
            params.sigma
        )));
    }

    let (h, w) = frames[0].dim();
    for (index, frame) in frames.iter().enumerate() {
        if frame.dim() != (h, w) {
            return Err(CcdError::ShapeMismatch {
                index,
                expected: (h, w),
                found: frame.dim(),
            });
        }
    }

    let n = frames.len();
    let combine_row = |row: usize| -> (Vec<f32>, usize, usize) {
        let mut column = Vec::with_capacity(n);
        let mut scratch = Vec::with_capacity(n);
        let mut out = vec![0.0f32; w];
        let mut rejected = 0usize;
        let mut undefined = 0usize;
        for (col, slot) in out.iter_mut().enumerate() {
            column.clear();
            column.extend(frames.iter().map(|f| f[[row, col]]));
            let (value, dropped) = clip_pixel(&mut column, &mut scratch, params);
            rejected += dropped;
            *slot = match value {
                Some(v) => v,
                None => {
                    undefined += 1;
                    f32::NAN
                }
            };
        }
        (out, rejected, undefined)
    };

    let rows: Vec<(Vec<f32>, usize, usize)> = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        (0..h).into_par_iter().map(combine_row).collect()
    } else {
        (0..h).map(combine_row).collect()
    };

    let mut data = Array2::<f32>::zeros((h, w));
    let mut rejected = 0;
    let mut undefined_pixels = 0;
    for (row, (values, row_rejected, row_undefined)) in rows.into_iter().enumerate() {
        for (col, val) in values.into_iter().enumerate() {
            data[[row, col]] = val;
        }
        rejected += row_rejected;
        undefined_pixels += row_undefined;
    }

    debug!(frames = n, rejected, "Sigma-clipped combination done");
    if undefined_pixels > 0 {
        warn!(
            undefined_pixels,
            "Sigma clipping rejected every sample for some pixels"
        );
    }

    Ok(CombinedFrame {
        data,
        rejected,
        undefined_pixels,
    })
}

/// Clip one pixel's stack column in place.
///
/// Returns the combined value (`None` if nothing survives) and the number of
/// samples that were dropped, including non-finite ones.
fn clip_pixel(
    column: &mut Vec<f32>,
    scratch: &mut Vec<f32>,
    params: &SigmaClipParams,
) -> (Option<f32>, usize) {
    let total = column.len();
    column.retain(|v| v.is_finite());

    for _ in 0..params.max_iterations {
        let Some((mean, stddev)) = mean_std(column) else {
            break;
        };
        if stddev <= 0.0 {
            break;
        }
        let center = match params.center {
            ClipCenter::Mean => mean,
            ClipCenter::Median => {
                scratch.clear();
                scratch.extend_from_slice(column);
                match median_in_place(scratch) {
                    Some(m) => m,
                    None => break,
                }
            }
        };
        let limit = params.sigma * stddev;
        let before = column.len();
        column.retain(|&v| (v - center).abs() <= limit);
        if column.len() == before {
            break;
        }
    }

    let dropped = total - column.len();
    let value = match params.combine {
        CombineMethod::Median => median_in_place(column),
        CombineMethod::Mean => mean_std(column).map(|(mean, _)| mean),
    };
    (value, dropped)
}
