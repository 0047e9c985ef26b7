use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};
use tracing::info;

use crate::consts::{EXPOSURE_TOLERANCE, FLAT_MEDIAN_FLOOR};
use crate::error::{CcdError, Result};
use crate::frame::RawFrame;
use crate::stack::sigma_clip::{sigma_clip_combine, CombinedFrame, SigmaClipParams};
use crate::stats::finite_median;

use super::{MasterFrame, MasterKind};

/// Builds bias, dark and flat masters from raw calibration exposures.
///
/// Every master is a sigma-clipped combination. When a persist directory is
/// set, each master is also written there under [`MasterKind::file_name`].
#[derive(Clone, Debug, Default)]
pub struct CalibrationBuilder {
    params: SigmaClipParams,
    persist_dir: Option<PathBuf>,
}

impl CalibrationBuilder {
    pub fn new(params: SigmaClipParams) -> Self {
        Self {
            params,
            persist_dir: None,
        }
    }

    pub fn persist_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    pub fn params(&self) -> &SigmaClipParams {
        &self.params
    }

    /// Path a master of `kind` is written to, if persisting.
    pub fn output_path(&self, kind: MasterKind) -> Option<PathBuf> {
        self.persist_dir.as_ref().map(|d| d.join(kind.file_name()))
    }

    /// Combine raw bias frames. No further correction is applied.
    pub fn build_bias(&self, bias_frames: &[RawFrame]) -> Result<MasterFrame> {
        if bias_frames.is_empty() {
            return Err(CcdError::EmptySequence);
        }
        let views: Vec<ArrayView2<f32>> = bias_frames.iter().map(|f| f.data.view()).collect();
        let combined = sigma_clip_combine(&views, &self.params)?;
        info!(
            frames = bias_frames.len(),
            rejected = combined.rejected,
            "Built master bias"
        );
        self.finish(MasterKind::Bias, combined, None, None)
    }

    /// Subtract the master bias from each dark and combine.
    ///
    /// The result is dark current at the reference exposure: `dark_exposure_time`
    /// if given, otherwise the exposure shared by all dark frames.
    pub fn build_dark(
        &self,
        dark_frames: &[RawFrame],
        master_bias: &MasterFrame,
        dark_exposure_time: Option<f64>,
    ) -> Result<MasterFrame> {
        if dark_frames.is_empty() {
            return Err(CcdError::EmptySequence);
        }
        let reference = match dark_exposure_time {
            Some(t) => t,
            None => common_exposure(dark_frames)?,
        };
        if reference <= 0.0 {
            return Err(CcdError::PreconditionViolation(format!(
                "dark reference exposure must be positive, got {reference}"
            )));
        }

        let corrected = dark_frames
            .iter()
            .enumerate()
            .map(|(i, f)| {
                check_shape(i, master_bias.dim(), f.dim())?;
                Ok(&f.data - &master_bias.data)
            })
            .collect::<Result<Vec<Array2<f32>>>>()?;

        let combined = combine_owned(&corrected, &self.params)?;
        info!(
            frames = dark_frames.len(),
            reference_exposure = reference,
            rejected = combined.rejected,
            "Built master dark"
        );
        self.finish(MasterKind::Dark, combined, Some(reference), None)
    }

    /// Bias- (and optionally dark-) correct each flat, combine, and normalize to
    /// a spatial median of 1.
    ///
    /// A supplied dark is scaled to each flat's exposure: `flat_exposure_time`
    /// when given, otherwise the flat's own header value.
    ///
    /// All flats must be taken through the same filter. When filter tags are
    /// present and differ, this fails with [`CcdError::FilterMismatch`].
    pub fn build_flat(
        &self,
        flat_frames: &[RawFrame],
        master_bias: &MasterFrame,
        master_dark: Option<&MasterFrame>,
        flat_exposure_time: Option<f64>,
    ) -> Result<MasterFrame> {
        if flat_frames.is_empty() {
            return Err(CcdError::EmptySequence);
        }
        check_single_filter(flat_frames)?;

        let corrected = flat_frames
            .iter()
            .enumerate()
            .map(|(i, f)| {
                check_shape(i, master_bias.dim(), f.dim())?;
                let mut data = &f.data - &master_bias.data;
                if let Some(dark) = master_dark {
                    check_shape(i, dark.dim(), f.dim())?;
                    let exposure = flat_exposure_time
                        .or(f.metadata.exposure_time)
                        .ok_or_else(|| {
                            CcdError::MissingExposure(format!(
                                "flat frame {i} has no exposure time to scale the dark by"
                            ))
                        })?;
                    let scale = dark.dark_scale(exposure)?;
                    data.scaled_add(-scale, &dark.data);
                }
                Ok(data)
            })
            .collect::<Result<Vec<Array2<f32>>>>()?;

        let mut combined = combine_owned(&corrected, &self.params)?;
        let median = finite_median(&combined.data.view()).unwrap_or(f64::NAN);
        if !median.is_finite() || median.abs() < FLAT_MEDIAN_FLOOR {
            return Err(CcdError::DegenerateFlat { median });
        }
        let inv = (1.0 / median) as f32;
        combined.data.mapv_inplace(|v| v * inv);

        info!(
            frames = flat_frames.len(),
            median,
            dark_corrected = master_dark.is_some(),
            rejected = combined.rejected,
            "Built normalized master flat"
        );
        self.finish(MasterKind::Flat, combined, None, Some(median))
    }

    fn finish(
        &self,
        kind: MasterKind,
        combined: CombinedFrame,
        reference_exposure: Option<f64>,
        normalization: Option<f64>,
    ) -> Result<MasterFrame> {
        let master = MasterFrame {
            kind,
            data: combined.data,
            reference_exposure,
            normalization,
            undefined_pixels: combined.undefined_pixels,
        };
        if let Some(path) = self.output_path(kind) {
            save_master(&master, &path)?;
        }
        Ok(master)
    }
}

fn save_master(master: &MasterFrame, path: &Path) -> Result<()> {
    master.save(path)?;
    info!(kind = %master.kind, path = %path.display(), "Saved master frame");
    Ok(())
}

fn combine_owned(frames: &[Array2<f32>], params: &SigmaClipParams) -> Result<CombinedFrame> {
    let views: Vec<ArrayView2<f32>> = frames.iter().map(|f| f.view()).collect();
    sigma_clip_combine(&views, params)
}

fn check_shape(index: usize, expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected != found {
        return Err(CcdError::ShapeMismatch {
            index,
            expected,
            found,
        });
    }
    Ok(())
}

/// Exposure time shared by every frame.
fn common_exposure(frames: &[RawFrame]) -> Result<f64> {
    let mut exposure: Option<f64> = None;
    for (i, frame) in frames.iter().enumerate() {
        let t = frame.metadata.exposure_time.ok_or_else(|| {
            CcdError::MissingExposure(format!("dark frame {i} has no exposure time"))
        })?;
        match exposure {
            None => exposure = Some(t),
            Some(first) if (first - t).abs() > EXPOSURE_TOLERANCE => {
                return Err(CcdError::PreconditionViolation(format!(
                    "dark frames mix exposure times {first} s and {t} s"
                )));
            }
            Some(_) => {}
        }
    }
    exposure.ok_or(CcdError::EmptySequence)
}

fn check_single_filter(frames: &[RawFrame]) -> Result<()> {
    let mut filters = frames.iter().filter_map(|f| f.metadata.filter.as_deref());
    if let Some(first) = filters.next() {
        if let Some(other) = filters.find(|f| *f != first) {
            return Err(CcdError::FilterMismatch {
                first: first.to_string(),
                other: other.to_string(),
            });
        }
    }
    Ok(())
}
