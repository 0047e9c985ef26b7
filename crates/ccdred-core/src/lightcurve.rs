//! Differential light curve assembly from calibrated frames.
//!
//! Each frame belongs to one acquisition sub-run, which supplies the nominal
//! target and comparison positions for that stretch of the night.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::centroid::{refine_positions, CentroidConfig};
use crate::consts::MINUTES_PER_DAY;
use crate::error::{CcdError, Result};
use crate::photometry::{ApertureSpec, Photometer, PixelPosition};
use crate::reduce::CalibratedFrame;

/// Half-open range of frame indices, `start..end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: usize,
    pub end: usize,
}

impl FrameRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }

    fn overlaps(&self, other: &FrameRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A stretch of frames sharing one telescope pointing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubRun {
    pub name: String,
    pub frames: FrameRange,
    pub target: PixelPosition,
    pub comparisons: Vec<PixelPosition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCurveConfig {
    pub sub_runs: Vec<SubRun>,
    /// Which aperture radius (index into the photometry radii) feeds the curve.
    pub radius_index: usize,
}

impl Default for LightCurveConfig {
    fn default() -> Self {
        Self {
            sub_runs: vec![
                SubRun {
                    name: "initial pointing".into(),
                    frames: FrameRange::new(0, 121),
                    target: PixelPosition::new(409.0, 408.0),
                    comparisons: vec![
                        PixelPosition::new(387.0, 520.0),
                        PixelPosition::new(570.0, 107.0),
                    ],
                },
                SubRun {
                    name: "re-pointed".into(),
                    frames: FrameRange::new(121, 143),
                    target: PixelPosition::new(485.0, 444.0),
                    comparisons: vec![
                        PixelPosition::new(463.0, 560.0),
                        PixelPosition::new(645.0, 148.0),
                    ],
                },
            ],
            radius_index: 0,
        }
    }
}

/// One light-curve sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightCurvePoint {
    pub frame_index: usize,
    /// Observation time, Julian date.
    pub timestamp: f64,
    pub target_flux: f64,
    /// Mean flux of the comparison stars.
    pub comparison_flux: f64,
    /// `target_flux / comparison_flux`.
    pub ratio: f64,
    pub target_position: PixelPosition,
    /// Set when any contributing measurement was not fully valid.
    pub flagged: bool,
}

/// A frame that produced no light-curve point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameFailure {
    pub index: usize,
    pub source: Option<PathBuf>,
    pub reason: String,
}

/// Time-ordered light curve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    pub points: Vec<LightCurvePoint>,
}

impl LightCurve {
    /// Build from unordered points, sorting by timestamp then frame index.
    pub fn from_points(mut points: Vec<LightCurvePoint>) -> Self {
        points.sort_by(|a, b| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then(a.frame_index.cmp(&b.frame_index))
        });
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn ratios(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.ratio).collect()
    }

    /// Minutes since the first observation.
    pub fn relative_minutes(&self) -> Vec<f64> {
        let Some(t0) = self.points.first().map(|p| p.timestamp) else {
            return Vec::new();
        };
        self.points
            .iter()
            .map(|p| (p.timestamp - t0) * MINUTES_PER_DAY)
            .collect()
    }
}

/// Light curve plus everything that went wrong producing it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurveReport {
    pub curve: LightCurve,
    pub failures: Vec<FrameFailure>,
    /// Points whose measurements carry a degeneracy marker.
    pub flagged: usize,
}

pub type FrameOutcome = std::result::Result<LightCurvePoint, FrameFailure>;

pub struct LightCurveAssembler {
    photometer: Photometer,
    centroid: CentroidConfig,
    config: LightCurveConfig,
}

impl LightCurveAssembler {
    pub fn new(
        aperture: ApertureSpec,
        centroid: CentroidConfig,
        config: LightCurveConfig,
    ) -> Result<Self> {
        validate(&aperture, &config)?;
        Ok(Self {
            photometer: Photometer::new(aperture),
            centroid,
            config,
        })
    }

    pub fn config(&self) -> &LightCurveConfig {
        &self.config
    }

    /// The sub-run covering frame `index`.
    pub fn sub_run_for(&self, index: usize) -> Option<&SubRun> {
        self.config
            .sub_runs
            .iter()
            .find(|run| run.frames.contains(index))
    }

    /// Centroid and measure the target and comparisons in one frame.
    pub fn measure_frame(&self, index: usize, frame: &CalibratedFrame) -> Result<LightCurvePoint> {
        let run = self.sub_run_for(index).ok_or_else(|| {
            CcdError::Config(format!("frame {index} is not covered by any sub-run"))
        })?;
        let timestamp = frame.metadata.timestamp.ok_or_else(|| {
            CcdError::PreconditionViolation(format!("frame {index} has no timestamp"))
        })?;

        let mut nominal = Vec::with_capacity(1 + run.comparisons.len());
        nominal.push(run.target);
        nominal.extend_from_slice(&run.comparisons);

        let view = frame.data.view();
        let refined = refine_positions(&view, &nominal, &self.centroid);
        let result = self.photometer.measure(&view, &refined.positions);

        let radius_index = self.config.radius_index;
        let pick = |i: usize| {
            result
                .get(i)
                .and_then(|p| p.measurements.get(radius_index))
                .ok_or_else(|| CcdError::Numerical(format!("missing measurement {i}")))
        };

        let target = pick(0)?;
        let mut comparison_sum = 0.0;
        let mut flagged = !target.status.is_valid() || refined.fallbacks > 0;
        for i in 1..nominal.len() {
            let m = pick(i)?;
            comparison_sum += m.flux;
            flagged |= !m.status.is_valid();
        }
        let comparison_flux = comparison_sum / run.comparisons.len() as f64;

        debug!(
            frame = index,
            sub_run = %run.name,
            target_flux = target.flux,
            comparison_flux,
            "Measured frame"
        );
        Ok(LightCurvePoint {
            frame_index: index,
            timestamp,
            target_flux: target.flux,
            comparison_flux,
            ratio: target.flux / comparison_flux,
            target_position: refined.positions[0],
            flagged,
        })
    }

    /// Collect per-frame outcomes into a timestamp-ordered report.
    pub fn assemble(&self, outcomes: Vec<FrameOutcome>) -> LightCurveReport {
        let mut points = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(point) => points.push(point),
                Err(failure) => {
                    warn!(frame = failure.index, reason = %failure.reason, "Frame skipped");
                    failures.push(failure);
                }
            }
        }
        let flagged = points.iter().filter(|p| p.flagged).count();
        let curve = LightCurve::from_points(points);
        info!(
            points = curve.len(),
            skipped = failures.len(),
            flagged,
            "Assembled light curve"
        );
        LightCurveReport {
            curve,
            failures,
            flagged,
        }
    }

    /// Measure in-memory frames in parallel and assemble them.
    ///
    /// A frame's index is its `metadata.index` when set, else its slice position.
    pub fn assemble_frames(&self, frames: &[CalibratedFrame]) -> LightCurveReport {
        let outcomes: Vec<FrameOutcome> = frames
            .par_iter()
            .enumerate()
            .map(|(pos, frame)| {
                let index = frame.metadata.index.unwrap_or(pos);
                self.measure_frame(index, frame).map_err(|e| FrameFailure {
                    index,
                    source: frame.metadata.source.clone(),
                    reason: e.to_string(),
                })
            })
            .collect();
        self.assemble(outcomes)
    }
}

fn validate(aperture: &ApertureSpec, config: &LightCurveConfig) -> Result<()> {
    if aperture.radii.is_empty() {
        return Err(CcdError::Config("at least one aperture radius is required".into()));
    }
    if config.radius_index >= aperture.radii.len() {
        return Err(CcdError::Config(format!(
            "radius index {} out of range for {} radii",
            config.radius_index,
            aperture.radii.len()
        )));
    }
    if config.sub_runs.is_empty() {
        return Err(CcdError::Config("at least one sub-run is required".into()));
    }
    for (i, run) in config.sub_runs.iter().enumerate() {
        if run.comparisons.is_empty() {
            return Err(CcdError::Config(format!(
                "sub-run '{}' has no comparison stars",
                run.name
            )));
        }
        if run.frames.start >= run.frames.end {
            return Err(CcdError::Config(format!(
                "sub-run '{}' has an empty frame range",
                run.name
            )));
        }
        if let Some(other) = config.sub_runs[i + 1..]
            .iter()
            .find(|o| o.frames.overlaps(&run.frames))
        {
            return Err(CcdError::Config(format!(
                "sub-runs '{}' and '{}' overlap",
                run.name, other.name
            )));
        }
    }
    Ok(())
}
