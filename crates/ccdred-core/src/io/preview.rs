use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::ArrayView2;
use tracing::warn;

use crate::consts::{PREVIEW_HIGH_PERCENTILE, PREVIEW_LOW_PERCENTILE};
use crate::error::Result;
use crate::stats::finite_percentile;

/// Save a linear-stretched 8-bit PNG of a frame.
///
/// Values are mapped from the 0.5th..99.5th percentile onto 0..255. NaN pixels
/// are drawn black.
pub fn save_preview_png(data: &ArrayView2<f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let lo = finite_percentile(data, PREVIEW_LOW_PERCENTILE).unwrap_or(0.0);
    let hi = finite_percentile(data, PREVIEW_HIGH_PERCENTILE).unwrap_or(1.0);
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let v = data[[row, col]];
            let level = if v.is_finite() {
                (((v - lo) / span).clamp(0.0, 1.0) * 255.0) as u8
            } else {
                0
            };
            img.put_pixel(col as u32, row as u32, Luma([level]));
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Like [`save_preview_png`], but a failure is only logged.
pub fn save_preview_best_effort(data: &ArrayView2<f32>, path: &Path) {
    if let Err(e) = save_preview_png(data, path) {
        warn!(path = %path.display(), error = %e, "Preview not written");
    }
}
