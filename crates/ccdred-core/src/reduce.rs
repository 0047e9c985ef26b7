//! Science frame reduction: bias, scaled dark, flat.

use std::path::Path;

use ndarray::{Array2, Zip};
use tracing::{debug, warn};

use crate::calibration::{MasterFrame, MasterKind, PROVENANCE_KEY};
use crate::consts::{DEFAULT_EXPOSURE_KEY, DEFAULT_TIMESTAMP_KEY, FLAT_DIVISOR_FLOOR};
use crate::error::{CcdError, Result};
use crate::frame::FrameMetadata;
use crate::frame::RawFrame;
use crate::io::fits::{self, HeaderCard};

/// A science frame after calibration.
#[derive(Clone, Debug)]
pub struct CalibratedFrame {
    pub data: Array2<f32>,
    pub metadata: FrameMetadata,
    /// Pixels left NaN because the flat could not be divided by.
    pub guarded_pixels: usize,
}

impl CalibratedFrame {
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Persist as FITS, keeping exposure and timestamp.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut cards = vec![HeaderCard::text(
            PROVENANCE_KEY,
            "Reduced science frame: bias, dark and flat corrected",
        )];
        if let Some(t) = self.metadata.exposure_time {
            cards.push(HeaderCard::float(DEFAULT_EXPOSURE_KEY, t));
        }
        if let Some(ts) = self.metadata.timestamp {
            cards.push(HeaderCard::float(DEFAULT_TIMESTAMP_KEY, ts));
        }
        fits::write_image(path, &self.data.view(), &cards)
    }
}

/// Applies master calibrations to science exposures.
///
/// Holds shared references only, so one reducer can serve many worker threads.
#[derive(Clone, Copy, Debug)]
pub struct ScienceReducer<'a> {
    bias: &'a MasterFrame,
    flat: &'a MasterFrame,
    dark: Option<&'a MasterFrame>,
}

impl<'a> ScienceReducer<'a> {
    pub fn new(
        bias: &'a MasterFrame,
        flat: &'a MasterFrame,
        dark: Option<&'a MasterFrame>,
    ) -> Result<Self> {
        expect_kind(bias, MasterKind::Bias)?;
        expect_kind(flat, MasterKind::Flat)?;
        if let Some(d) = dark {
            expect_kind(d, MasterKind::Dark)?;
        }
        Ok(Self { bias, flat, dark })
    }

    /// Reduce one exposure.
    ///
    /// 1. subtract the master bias
    /// 2. subtract the master dark scaled by `exposure / dark reference exposure`
    /// 3. divide by the normalized flat
    ///
    /// Flat pixels that are non-finite or smaller in magnitude than
    /// [`FLAT_DIVISOR_FLOOR`] yield NaN and are counted in
    /// [`CalibratedFrame::guarded_pixels`].
    pub fn reduce(&self, frame: &RawFrame) -> Result<CalibratedFrame> {
        let dim = frame.dim();
        check_master_shape(self.bias, dim)?;
        check_master_shape(self.flat, dim)?;

        let mut data = &frame.data - &self.bias.data;

        if let Some(dark) = self.dark {
            check_master_shape(dark, dim)?;
            let exposure = frame.metadata.exposure_time.ok_or_else(|| {
                CcdError::MissingExposure(format!(
                    "science frame {} has no exposure time to scale the dark by",
                    describe(&frame.metadata)
                ))
            })?;
            let scale = dark.dark_scale(exposure)?;
            data.scaled_add(-scale, &dark.data);
        }

        let mut guarded_pixels = 0usize;
        Zip::from(&mut data).and(&self.flat.data).for_each(|v, &f| {
            if f.is_finite() && f.abs() >= FLAT_DIVISOR_FLOOR {
                *v /= f;
            } else {
                *v = f32::NAN;
                guarded_pixels += 1;
            }
        });

        if guarded_pixels > 0 {
            warn!(
                frame = %describe(&frame.metadata),
                guarded_pixels,
                "Flat field too small to divide by; pixels set to NaN"
            );
        }
        debug!(frame = %describe(&frame.metadata), "Reduced science frame");

        Ok(CalibratedFrame {
            data,
            metadata: frame.metadata.clone(),
            guarded_pixels,
        })
    }

    /// Reduce and write the calibrated frame to `path`.
    pub fn reduce_and_save(&self, frame: &RawFrame, path: &Path) -> Result<CalibratedFrame> {
        let calibrated = self.reduce(frame)?;
        calibrated.save(path)?;
        Ok(calibrated)
    }
}

fn expect_kind(master: &MasterFrame, kind: MasterKind) -> Result<()> {
    if master.kind != kind {
        return Err(CcdError::PreconditionViolation(format!(
            "expected a {kind} master, got {}",
            master.kind
        )));
    }
    Ok(())
}

fn check_master_shape(master: &MasterFrame, dim: (usize, usize)) -> Result<()> {
    if master.dim() != dim {
        return Err(CcdError::ShapeMismatch {
            index: 0,
            expected: master.dim(),
            found: dim,
        });
    }
    Ok(())
}

fn describe(metadata: &FrameMetadata) -> String {
    match (&metadata.source, metadata.index) {
        (Some(path), _) => path.display().to_string(),
        (None, Some(i)) => format!("#{i}"),
        (None, None) => "<memory>".into(),
    }
}
