//! FITS reading and writing for detector frames and calibration products.
//!
//! Frames are single 2D primary HDUs. Rows follow the file order, so pixel
//! `(x, y)` addresses `data[[y, x]]` exactly as other astronomy tools read it.

use std::path::Path;

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::headers::ReadsKey;
use fitsio::FitsFile;
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DEFAULT_EXPOSURE_KEY, DEFAULT_FILTER_KEY, DEFAULT_TIMESTAMP_KEY, IMAGE_TYPE_KEY,
};
use crate::error::{CcdError, Result};
use crate::frame::{FrameKind, FrameMetadata, RawFrame};

/// Header keywords consulted when reading frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderKeys {
    pub exposure: String,
    pub timestamp: String,
    pub filter: String,
}

impl Default for HeaderKeys {
    fn default() -> Self {
        Self {
            exposure: DEFAULT_EXPOSURE_KEY.to_string(),
            timestamp: DEFAULT_TIMESTAMP_KEY.to_string(),
            filter: DEFAULT_FILTER_KEY.to_string(),
        }
    }
}

/// Fixed detector window applied to every frame on load.
///
/// Ranges are half-open: rows `row_start..row_end`, columns `col_start..col_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimRegion {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl TrimRegion {
    pub fn dim(&self) -> (usize, usize) {
        (
            self.row_end.saturating_sub(self.row_start),
            self.col_end.saturating_sub(self.col_start),
        )
    }

    fn apply(&self, data: Array2<f32>, path: &Path) -> Result<Array2<f32>> {
        let (h, w) = data.dim();
        if self.row_start >= self.row_end
            || self.col_start >= self.col_end
            || self.row_end > h
            || self.col_end > w
        {
            return Err(CcdError::InvalidFits {
                path: path.to_path_buf(),
                reason: format!("trim region {self:?} does not fit a {h}x{w} image"),
            });
        }
        Ok(data
            .slice(s![self.row_start..self.row_end, self.col_start..self.col_end])
            .to_owned())
    }
}

/// Value of a header card written alongside an image.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Float(f64),
    Text(String),
}

/// A single keyword/value pair for [`write_image`].
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderCard {
    pub key: String,
    pub value: HeaderValue,
}

impl HeaderCard {
    pub fn float(key: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            value: HeaderValue::Float(value),
        }
    }

    pub fn text(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: HeaderValue::Text(value.into()),
        }
    }
}

/// Read a frame from the primary HDU of a FITS file.
///
/// `kind` is used when the file carries no recognizable `IMAGETYP`.
pub fn read_frame(
    path: &Path,
    kind: FrameKind,
    keys: &HeaderKeys,
    trim: Option<&TrimRegion>,
) -> Result<RawFrame> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;
    let data = read_pixels(&hdu, &mut fptr, path)?;
    let data = match trim {
        Some(region) => region.apply(data, path)?,
        None => data,
    };

    let header_kind = read_key_optional::<String>(&hdu, &mut fptr, IMAGE_TYPE_KEY)
        .and_then(|v| FrameKind::from_header(&v));
    let metadata = FrameMetadata {
        kind: header_kind.unwrap_or(kind),
        exposure_time: read_key_optional(&hdu, &mut fptr, &keys.exposure),
        timestamp: read_key_optional(&hdu, &mut fptr, &keys.timestamp),
        filter: read_key_optional::<String>(&hdu, &mut fptr, &keys.filter)
            .map(|f| f.trim().to_string()),
        source: Some(path.to_path_buf()),
        index: None,
    };
    debug!(
        path = %path.display(),
        height = data.nrows(),
        width = data.ncols(),
        "Read FITS frame"
    );
    Ok(RawFrame { data, metadata })
}

/// Read the pixel array of the primary HDU together with selected float keys.
///
/// Missing keys come back as `None`.
pub fn read_image_with_keys(
    path: &Path,
    float_keys: &[&str],
) -> Result<(Array2<f32>, Vec<Option<f64>>)> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;
    let data = read_pixels(&hdu, &mut fptr, path)?;
    let values = float_keys
        .iter()
        .map(|key| read_key_optional::<f64>(&hdu, &mut fptr, key))
        .collect();
    Ok((data, values))
}

/// Read a text key from the primary HDU, if present.
pub fn read_text_key(path: &Path, key: &str) -> Result<Option<String>> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;
    Ok(read_key_optional(&hdu, &mut fptr, key))
}

/// Write a 32-bit float image as the primary HDU, replacing any existing file.
pub fn write_image(path: &Path, data: &ArrayView2<f32>, cards: &[HeaderCard]) -> Result<()> {
    let (h, w) = data.dim();
    let dimensions = [h, w];
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &dimensions,
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;

    let pixels: Vec<f32> = data.iter().copied().collect();
    hdu.write_image(&mut fptr, &pixels)?;

    for card in cards {
        match &card.value {
            HeaderValue::Float(v) => hdu.write_key(&mut fptr, &card.key, *v)?,
            HeaderValue::Text(t) => hdu.write_key(&mut fptr, &card.key, t.clone())?,
        }
    }
    debug!(path = %path.display(), height = h, width = w, "Wrote FITS image");
    Ok(())
}

fn read_pixels(hdu: &FitsHdu, fptr: &mut FitsFile, path: &Path) -> Result<Array2<f32>> {
    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => shape.clone(),
        _ => {
            return Err(CcdError::InvalidFits {
                path: path.to_path_buf(),
                reason: "primary HDU is not an image".into(),
            })
        }
    };
    // fitsio reports the shape slowest axis first: [NAXIS2, NAXIS1].
    let (h, w) = match shape.as_slice() {
        [h, w] => (*h, *w),
        other => {
            return Err(CcdError::InvalidFits {
                path: path.to_path_buf(),
                reason: format!("expected a 2D image, found {} axes", other.len()),
            })
        }
    };
    let pixels: Vec<f32> = hdu.read_image(fptr)?;
    Array2::from_shape_vec((h, w), pixels).map_err(|e| CcdError::InvalidFits {
        path: path.to_path_buf(),
        reason: format!("pixel count does not match {h}x{w}: {e}"),
    })
}

fn read_key_optional<T: ReadsKey>(hdu: &FitsHdu, fptr: &mut FitsFile, key: &str) -> Option<T> {
    hdu.read_key::<T>(fptr, key).ok()
}
