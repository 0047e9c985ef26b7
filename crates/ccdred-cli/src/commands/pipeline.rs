use std::sync::Arc;

use anyhow::{Context, Result};
use ccdred_core::pipeline::run_pipeline_reported;
use clap::Args;

use super::SourceArgs;
use crate::progress::BarReporter;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Aperture radius in pixels (replaces the configured radii)
    #[arg(long)]
    pub radius: Option<f64>,

    /// Do not keep calibrated science frames on disk
    #[arg(long)]
    pub no_save_calibrated: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = args.source.resolve()?;
    if let Some(radius) = args.radius {
        config.photometry.radii = vec![radius];
        config.lightcurve.radius_index = 0;
    }
    if args.no_save_calibrated {
        config.output.save_calibrated = false;
    }
    crate::summary::print_run_header(&config);

    let summary = run_pipeline_reported(&config, Arc::new(BarReporter::new()))
        .with_context(|| format!("Pipeline failed for {}", config.data_dir.display()))?;

    crate::summary::print_calibration_summary(&summary.calibration);
    crate::summary::print_run_summary(&summary);
    Ok(())
}
