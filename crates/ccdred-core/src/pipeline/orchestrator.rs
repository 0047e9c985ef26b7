use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::calibration::{CalibrationBuilder, MasterFrame, MasterKind};
use crate::error::{CcdError, Result};
use crate::frame::{FrameKind, RawFrame};
use crate::io::discover::{discover_frames, DiscoveredFrames};
use crate::io::fits::read_frame;
use crate::io::lightcurve::{save_ratio_csv, save_report_json};
use crate::io::preview::save_preview_best_effort;
use crate::lightcurve::{FrameFailure, FrameOutcome, LightCurveAssembler};
use crate::noise::{estimate_gain, estimate_readout_noise};
use crate::reduce::{CalibratedFrame, ScienceReducer};

use super::config::RunConfig;
use super::types::{
    CalibrationSummary, NoOpReporter, PipelineStage, ProgressReporter, ReductionSummary,
    RunSummary,
};

/// The three masters of one run. The dark is absent when disabled or unavailable.
#[derive(Clone, Debug)]
pub struct Masters {
    pub bias: MasterFrame,
    pub dark: Option<MasterFrame>,
    pub flat: MasterFrame,
}

impl Masters {
    pub fn reducer(&self) -> Result<ScienceReducer<'_>> {
        ScienceReducer::new(&self.bias, &self.flat, self.dark.as_ref())
    }
}

/// Discover calibration frames, build and persist the masters, and estimate
/// gain and readout noise.
pub fn build_masters_reported(
    config: &RunConfig,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<(Masters, CalibrationSummary)> {
    reporter.begin_stage(PipelineStage::Discovering, None);
    let found = discover_frames(&config.data_dir, &config.patterns)?;
    reporter.finish_stage();
    build_masters_from(config, &found, reporter)
}

/// Build the masters without progress reporting.
pub fn build_masters(config: &RunConfig) -> Result<(Masters, CalibrationSummary)> {
    let reporter: Arc<dyn ProgressReporter> = Arc::new(NoOpReporter);
    build_masters_reported(config, &reporter)
}

fn build_masters_from(
    config: &RunConfig,
    found: &DiscoveredFrames,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<(Masters, CalibrationSummary)> {
    std::fs::create_dir_all(&config.output_dir)?;
    let builder =
        CalibrationBuilder::new(config.stacking.clone()).persist_to(&config.output_dir);
    let mut summary = CalibrationSummary::default();

    reporter.begin_stage(PipelineStage::BuildingBias, Some(found.bias.len()));
    let biases = load_calibration(&found.bias, FrameKind::Bias, config, &mut summary);
    if biases.is_empty() {
        return Err(CcdError::Config(format!(
            "no readable bias frames matching '{}' in {}",
            config.patterns.bias,
            config.data_dir.display()
        )));
    }
    let bias = builder.build_bias(&biases)?;
    summary.bias_frames = biases.len();
    reporter.finish_stage();

    let dark = if config.calibration.use_dark && !found.dark.is_empty() {
        reporter.begin_stage(PipelineStage::BuildingDark, Some(found.dark.len()));
        let darks = load_calibration(&found.dark, FrameKind::Dark, config, &mut summary);
        let dark = if darks.is_empty() {
            warn!("No readable dark frames, continuing without dark correction");
            None
        } else {
            summary.dark_frames = darks.len();
            Some(builder.build_dark(&darks, &bias, config.calibration.dark_exposure_time)?)
        };
        reporter.finish_stage();
        dark
    } else {
        if config.calibration.use_dark {
            warn!(
                pattern = %config.patterns.dark,
                "No dark frames found, continuing without dark correction"
            );
        }
        None
    };
    summary.dark_reference_exposure = dark.as_ref().and_then(|d| d.reference_exposure);

    reporter.begin_stage(PipelineStage::BuildingFlat, Some(found.flat.len()));
    let flats = load_calibration(&found.flat, FrameKind::Flat, config, &mut summary);
    if flats.is_empty() {
        return Err(CcdError::Config(format!(
            "no readable flat frames matching '{}' in {}",
            config.patterns.flat,
            config.data_dir.display()
        )));
    }
    let flat = builder.build_flat(
        &flats,
        &bias,
        dark.as_ref(),
        config.calibration.flat_exposure_time,
    )?;
    summary.flat_frames = flats.len();
    summary.flat_normalization = flat.normalization;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::NoiseEstimation, None);
    estimate_noise(config, &biases, &flats, &bias, &mut summary);
    reporter.finish_stage();

    let masters = Masters { bias, dark, flat };
    summary.undefined_pixels = masters.bias.undefined_pixels
        + masters.flat.undefined_pixels
        + masters.dark.as_ref().map_or(0, |d| d.undefined_pixels);
    if summary.undefined_pixels > 0 {
        warn!(
            pixels = summary.undefined_pixels,
            "Masters contain pixels rejected in every frame"
        );
    }
    summary.master_paths = [MasterKind::Bias, MasterKind::Dark, MasterKind::Flat]
        .into_iter()
        .filter(|k| *k != MasterKind::Dark || masters.dark.is_some())
        .filter_map(|k| builder.output_path(k))
        .collect();

    if config.output.previews {
        write_master_previews(&masters, &config.output_dir);
    }
    Ok((masters, summary))
}

/// Read calibration frames in parallel. Unreadable files are skipped and noted.
fn load_calibration(
    paths: &[PathBuf],
    kind: FrameKind,
    config: &RunConfig,
    summary: &mut CalibrationSummary,
) -> Vec<RawFrame> {
    let results: Vec<(usize, Result<RawFrame>)> = paths
        .par_iter()
        .enumerate()
        .map(|(i, path)| (i, load_frame(path, kind, i, config)))
        .collect();

    let mut frames = Vec::with_capacity(results.len());
    for (i, result) in results {
        match result {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                warn!(path = %paths[i].display(), error = %e, "Skipping calibration frame");
                summary.skipped.push(FrameFailure {
                    index: i,
                    source: Some(paths[i].clone()),
                    reason: e.to_string(),
                });
            }
        }
    }
    info!(kind = %kind, frames = frames.len(), "Loaded calibration frames");
    frames
}

fn load_frame(path: &Path, kind: FrameKind, index: usize, config: &RunConfig) -> Result<RawFrame> {
    let mut frame = read_frame(path, kind, &config.header, config.trim.as_ref())?;
    frame.metadata.index = Some(index);
    Ok(frame)
}

/// Gain from bias-subtracted flats, readout noise from raw biases.
/// Failures here are diagnostics only and never abort the run.
fn estimate_noise(
    config: &RunConfig,
    biases: &[RawFrame],
    flats: &[RawFrame],
    master_bias: &MasterFrame,
    summary: &mut CalibrationSummary,
) {
    let policy = config.calibration.noise_pairs;
    let corrected: Vec<RawFrame> = flats
        .iter()
        .filter(|f| f.dim() == master_bias.dim())
        .map(|f| RawFrame {
            data: &f.data - &master_bias.data,
            metadata: f.metadata.clone(),
        })
        .collect();

    match estimate_gain(&corrected, policy) {
        Ok(gain) => {
            match estimate_readout_noise(biases, gain.gain, policy) {
                Ok(noise) => summary.readout_noise = Some(noise),
                Err(e) => warn!(error = %e, "Readout noise not estimated"),
            }
            summary.gain = Some(gain);
        }
        Err(e) => warn!(error = %e, "Gain not estimated"),
    }
}

fn write_master_previews(masters: &Masters, dir: &Path) {
    save_preview_best_effort(&masters.bias.data.view(), &dir.join("master_bias.png"));
    if let Some(dark) = &masters.dark {
        save_preview_best_effort(&dark.data.view(), &dir.join("master_dark.png"));
    }
    save_preview_best_effort(&masters.flat.data.view(), &dir.join("master_flat.png"));
}

/// Output path of the calibrated science frame at `index` (0-based).
pub fn calibrated_path(config: &RunConfig, index: usize) -> PathBuf {
    config
        .output_dir
        .join(format!("{}{}.fits", config.output.calibrated_prefix, index + 1))
}

/// Load, reduce, and optionally persist one science frame.
fn reduce_one(
    path: &Path,
    index: usize,
    reducer: &ScienceReducer<'_>,
    config: &RunConfig,
) -> Result<(CalibratedFrame, Option<PathBuf>)> {
    let raw = load_frame(path, FrameKind::Science, index, config)?;
    let mut calibrated = reducer.reduce(&raw)?;
    calibrated.metadata.index = Some(index);
    let written = if config.output.save_calibrated {
        let out = calibrated_path(config, index);
        calibrated.save(&out)?;
        Some(out)
    } else {
        None
    };
    debug!(frame = index, guarded = calibrated.guarded_pixels, "Reduced science frame");
    Ok((calibrated, written))
}

fn failure(index: usize, path: &Path, error: &CcdError) -> FrameFailure {
    FrameFailure {
        index,
        source: Some(path.to_path_buf()),
        reason: error.to_string(),
    }
}

/// Build masters and reduce every science frame, without photometry.
pub fn reduce_science_reported(
    config: &RunConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<ReductionSummary> {
    reporter.begin_stage(PipelineStage::Discovering, None);
    let found = discover_frames(&config.data_dir, &config.patterns)?;
    reporter.finish_stage();

    let (masters, calibration) = build_masters_from(config, &found, &reporter)?;
    let reducer = masters.reducer()?;

    let total = found.science.len();
    reporter.begin_stage(PipelineStage::Reducing, Some(total));
    let done = AtomicUsize::new(0);
    let results: Vec<std::result::Result<(usize, Option<PathBuf>), FrameFailure>> = found
        .science
        .par_iter()
        .enumerate()
        .map(|(i, path)| {
            let result = reduce_one(path, i, &reducer, config)
                .map(|(frame, written)| (frame.guarded_pixels, written))
                .map_err(|e| failure(i, path, &e));
            reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
            result
        })
        .collect();
    reporter.finish_stage();

    let mut summary = ReductionSummary {
        calibration,
        ..Default::default()
    };
    for result in results {
        match result {
            Ok((guarded, written)) => {
                summary.reduced += 1;
                summary.guarded_pixels += guarded;
                summary.outputs.extend(written);
            }
            Err(f) => {
                warn!(frame = f.index, reason = %f.reason, "Science frame skipped");
                summary.failures.push(f);
            }
        }
    }
    info!(
        reduced = summary.reduced,
        skipped = summary.failures.len(),
        "Science reduction complete"
    );
    Ok(summary)
}

/// Run the full pipeline with a thread-safe progress reporter: masters,
/// noise diagnostics, per-frame reduction and photometry, light curve output.
pub fn run_pipeline_reported(
    config: &RunConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let assembler = LightCurveAssembler::new(
        config.photometry.clone(),
        config.centroid.clone(),
        config.lightcurve.clone(),
    )?;

    reporter.begin_stage(PipelineStage::Discovering, None);
    let found = discover_frames(&config.data_dir, &config.patterns)?;
    info!(
        bias = found.bias.len(),
        dark = found.dark.len(),
        flat = found.flat.len(),
        science = found.science.len(),
        "Discovered frames"
    );
    reporter.finish_stage();
    if found.science.is_empty() {
        return Err(CcdError::Config(format!(
            "no science frames matching '{}' in {}",
            config.patterns.science,
            config.data_dir.display()
        )));
    }

    let (masters, calibration) = build_masters_from(config, &found, &reporter)?;
    let reducer = masters.reducer()?;

    let total = found.science.len();
    reporter.begin_stage(PipelineStage::Photometry, Some(total));
    let done = AtomicUsize::new(0);
    let results: Vec<(FrameOutcome, Option<usize>)> = found
        .science
        .par_iter()
        .enumerate()
        .map(|(i, path)| {
            let result = match reduce_one(path, i, &reducer, config) {
                Ok((frame, _)) => (
                    assembler
                        .measure_frame(i, &frame)
                        .map_err(|e| failure(i, path, &e)),
                    Some(frame.guarded_pixels),
                ),
                Err(e) => (Err(failure(i, path, &e)), None),
            };
            reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
            result
        })
        .collect();
    reporter.finish_stage();

    let reduced = results.iter().filter(|(_, g)| g.is_some()).count();
    let guarded_pixels = results.iter().filter_map(|(_, g)| *g).sum();
    let report = assembler.assemble(results.into_iter().map(|(o, _)| o).collect());

    reporter.begin_stage(PipelineStage::Writing, None);
    let json_path = config.output_dir.join(&config.output.lightcurve_json);
    let csv_path = config.output_dir.join(&config.output.lightcurve_csv);
    save_report_json(&report, &json_path)?;
    save_ratio_csv(&report, &csv_path)?;
    info!(path = %json_path.display(), "Wrote light curve");
    reporter.finish_stage();

    Ok(RunSummary {
        calibration,
        reduced,
        guarded_pixels,
        report,
        artifacts: vec![json_path, csv_path],
    })
}

/// Run the full pipeline.
pub fn run_pipeline(config: &RunConfig) -> Result<RunSummary> {
    let reporter = Arc::new(NoOpReporter);
    run_pipeline_reported(config, reporter)
}
