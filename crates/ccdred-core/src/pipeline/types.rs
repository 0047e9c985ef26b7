use std::path::PathBuf;

use serde::Serialize;

use crate::lightcurve::{FrameFailure, LightCurveReport};
use crate::noise::{GainEstimate, ReadoutNoiseEstimate};

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Discovering,
    BuildingBias,
    BuildingDark,
    BuildingFlat,
    NoiseEstimation,
    Reducing,
    Photometry,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovering => write!(f, "Discovering frames"),
            Self::BuildingBias => write!(f, "Building master bias"),
            Self::BuildingDark => write!(f, "Building master dark"),
            Self::BuildingFlat => write!(f, "Building master flat"),
            Self::NoiseEstimation => write!(f, "Estimating gain and noise"),
            Self::Reducing => write!(f, "Reducing science frames"),
            Self::Photometry => write!(f, "Reducing and measuring"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` work items within the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_pipeline` delegates.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Diagnostics from building the master frames.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CalibrationSummary {
    pub bias_frames: usize,
    pub dark_frames: usize,
    pub flat_frames: usize,
    /// Median divided out of the master flat.
    pub flat_normalization: Option<f64>,
    pub dark_reference_exposure: Option<f64>,
    /// NaN pixels across all masters from fully rejected stacks.
    pub undefined_pixels: usize,
    pub gain: Option<GainEstimate>,
    pub readout_noise: Option<ReadoutNoiseEstimate>,
    /// Calibration files that could not be read.
    pub skipped: Vec<FrameFailure>,
    pub master_paths: Vec<PathBuf>,
}

/// Outcome of reducing science frames without photometry.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ReductionSummary {
    pub calibration: CalibrationSummary,
    pub reduced: usize,
    pub failures: Vec<FrameFailure>,
    /// Pixels set to NaN by flat-division guarding, over all frames.
    pub guarded_pixels: usize,
    pub outputs: Vec<PathBuf>,
}

/// Outcome of the full reduction and photometry run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub calibration: CalibrationSummary,
    pub reduced: usize,
    pub guarded_pixels: usize,
    pub report: LightCurveReport,
    pub artifacts: Vec<PathBuf>,
}
