use std::path::{Path, PathBuf};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ccdred_core::frame::{FrameKind, RawFrame};
use ccdred_core::io::fits::{write_image, HeaderCard};

/// Constant-valued frame of the given kind.
pub fn flat_frame(h: usize, w: usize, fill: f32, kind: FrameKind) -> RawFrame {
    RawFrame::new(Array2::from_elem((h, w), fill), kind)
}

/// Constant background plus a square plateau of `height` centred on
/// `(cx, cy)` with the given half-size.
pub fn plateau_image(
    h: usize,
    w: usize,
    background: f32,
    cx: usize,
    cy: usize,
    half: usize,
    height: f32,
) -> Array2<f32> {
    let mut data = Array2::from_elem((h, w), background);
    for row in cy - half..=cy + half {
        for col in cx - half..=cx + half {
            data[[row, col]] += height;
        }
    }
    data
}

/// Constant background plus a circular Gaussian star.
pub fn gaussian_star(
    h: usize,
    w: usize,
    background: f32,
    cx: f64,
    cy: f64,
    amplitude: f64,
    sigma: f64,
) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(row, col)| {
        let dx = col as f64 - cx;
        let dy = row as f64 - cy;
        let r2 = dx * dx + dy * dy;
        background + (amplitude * (-r2 / (2.0 * sigma * sigma)).exp()) as f32
    })
}

/// Seeded Gaussian noise around `mean` with standard deviation `sigma`.
pub fn noisy_image(h: usize, w: usize, mean: f64, sigma: f64, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((h, w), |_| {
        // Box-Muller
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        (mean + sigma * z) as f32
    })
}

/// Write a FITS exposure with the usual header keys and return its path.
pub fn write_exposure(
    dir: &Path,
    name: &str,
    data: &Array2<f32>,
    image_type: &str,
    exposure: Option<f64>,
    jd: Option<f64>,
) -> PathBuf {
    let path = dir.join(name);
    let mut cards = vec![HeaderCard::text("IMAGETYP", image_type)];
    if let Some(t) = exposure {
        cards.push(HeaderCard::float("EXPTIME", t));
    }
    if let Some(jd) = jd {
        cards.push(HeaderCard::float("JD-OBS", jd));
    }
    write_image(&path, &data.view(), &cards).unwrap();
    path
}
