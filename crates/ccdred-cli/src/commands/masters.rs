use std::sync::Arc;

use anyhow::{Context, Result};
use ccdred_core::pipeline::{build_masters_reported, ProgressReporter};
use clap::Args;

use super::SourceArgs;
use crate::progress::BarReporter;

#[derive(Args)]
pub struct MastersArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn run(args: &MastersArgs) -> Result<()> {
    let config = args.source.resolve()?;
    crate::summary::print_run_header(&config);

    let reporter: Arc<dyn ProgressReporter> = Arc::new(BarReporter::new());
    let (_, summary) = build_masters_reported(&config, &reporter)
        .with_context(|| format!("Failed to build masters from {}", config.data_dir.display()))?;

    crate::summary::print_calibration_summary(&summary);
    Ok(())
}
