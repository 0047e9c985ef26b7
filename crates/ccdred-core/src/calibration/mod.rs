//! Master calibration frames and how they are built.

mod builder;

pub use builder::CalibrationBuilder;

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{CALIBRATION_TYPE_KEY, DEFAULT_EXPOSURE_KEY, FLAT_NORMALIZATION_KEY};
use crate::error::{CcdError, Result};
use crate::io::fits::{self, HeaderCard};

/// FITS keyword holding the human-readable provenance line.
pub const PROVENANCE_KEY: &str = "PROVENAN";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasterKind {
    Bias,
    Dark,
    Flat,
}

impl MasterKind {
    /// Default output file name for this master.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Bias => "master_bias.fits",
            Self::Dark => "master_dark.fits",
            Self::Flat => "master_flat.fits",
        }
    }

    pub fn provenance(&self) -> &'static str {
        match self {
            Self::Bias => "Sigma-clipped median bias",
            Self::Dark => "Dark current with bias subtracted",
            Self::Flat => "Normalized flat image with bias subtracted",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Bias => "BIAS",
            Self::Dark => "DARK",
            Self::Flat => "FLAT",
        }
    }
}

impl std::fmt::Display for MasterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bias => write!(f, "Bias"),
            Self::Dark => write!(f, "Dark"),
            Self::Flat => write!(f, "Flat"),
        }
    }
}

/// A combined calibration frame, read-only once built.
#[derive(Clone, Debug)]
pub struct MasterFrame {
    pub kind: MasterKind,
    pub data: Array2<f32>,
    /// Exposure time (seconds) the dark current in a master dark corresponds to.
    pub reference_exposure: Option<f64>,
    /// Median divided out of a master flat.
    pub normalization: Option<f64>,
    /// Pixels left undefined (NaN) by sigma clipping.
    pub undefined_pixels: usize,
}

impl MasterFrame {
    pub fn new(kind: MasterKind, data: Array2<f32>) -> Self {
        Self {
            kind,
            data,
            reference_exposure: None,
            normalization: None,
            undefined_pixels: 0,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Scale factor to apply to this dark for an exposure of `exposure` seconds.
    pub fn dark_scale(&self, exposure: f64) -> Result<f32> {
        let reference = self.reference_exposure.ok_or_else(|| {
            CcdError::MissingExposure("master dark has no reference exposure".into())
        })?;
        if reference <= 0.0 {
            return Err(CcdError::PreconditionViolation(format!(
                "master dark reference exposure must be positive, got {reference}"
            )));
        }
        Ok((exposure / reference) as f32)
    }

    /// Persist as FITS with provenance keys.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut cards = vec![
            HeaderCard::text(CALIBRATION_TYPE_KEY, self.kind.tag()),
            HeaderCard::text(PROVENANCE_KEY, self.kind.provenance()),
        ];
        if let Some(exposure) = self.reference_exposure {
            cards.push(HeaderCard::float(DEFAULT_EXPOSURE_KEY, exposure));
        }
        if let Some(norm) = self.normalization {
            cards.push(HeaderCard::float(FLAT_NORMALIZATION_KEY, norm));
        }
        fits::write_image(path, &self.data.view(), &cards)
    }

    /// Load a master written by [`MasterFrame::save`].
    pub fn load(path: &Path, kind: MasterKind) -> Result<Self> {
        let (data, keys) =
            fits::read_image_with_keys(path, &[DEFAULT_EXPOSURE_KEY, FLAT_NORMALIZATION_KEY])?;
        if let Some(tag) = fits::read_text_key(path, CALIBRATION_TYPE_KEY)? {
            if tag.trim() != kind.tag() {
                return Err(CcdError::PreconditionViolation(format!(
                    "{} holds a {} master, expected {}",
                    path.display(),
                    tag.trim(),
                    kind.tag()
                )));
            }
        }
        let undefined_pixels = data.iter().filter(|v| !v.is_finite()).count();
        Ok(Self {
            kind,
            data,
            reference_exposure: keys[0],
            normalization: keys[1],
            undefined_pixels,
        })
    }
}
