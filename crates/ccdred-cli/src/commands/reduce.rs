use std::sync::Arc;

use anyhow::{Context, Result};
use ccdred_core::pipeline::reduce_science_reported;
use clap::Args;

use super::SourceArgs;
use crate::progress::BarReporter;

#[derive(Args)]
pub struct ReduceArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn run(args: &ReduceArgs) -> Result<()> {
    let mut config = args.source.resolve()?;
    config.output.save_calibrated = true;
    crate::summary::print_run_header(&config);

    let summary = reduce_science_reported(&config, Arc::new(BarReporter::new()))
        .with_context(|| format!("Reduction of {} failed", config.data_dir.display()))?;

    crate::summary::print_calibration_summary(&summary.calibration);
    crate::summary::print_reduction_summary(&summary);
    Ok(())
}
