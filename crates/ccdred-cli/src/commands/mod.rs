pub mod config;
pub mod masters;
pub mod photometry;
pub mod pipeline;
pub mod reduce;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use ccdred_core::pipeline::RunConfig;
use clap::Args;
use tracing::debug;

/// Where frames come from and where results go, shared by the run-style commands.
#[derive(Args)]
pub struct SourceArgs {
    /// Directory holding the raw FITS exposures
    pub data_dir: Option<PathBuf>,

    /// Run config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output directory for masters, calibrated frames and the light curve
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Sigma threshold for master-frame clipping
    #[arg(long)]
    pub sigma: Option<f32>,

    /// Skip dark-current correction
    #[arg(long)]
    pub no_dark: bool,

    /// Write PNG previews of the masters
    #[arg(long)]
    pub previews: bool,
}

impl SourceArgs {
    /// Load the TOML config if given, then apply command-line overrides.
    pub fn resolve(&self) -> Result<RunConfig> {
        let mut config = match (&self.config, &self.data_dir) {
            (Some(path), _) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str::<RunConfig>(&contents).context("Invalid run config")?
            }
            (None, Some(dir)) => RunConfig::new(dir, "reduced"),
            (None, None) => bail!("Either a data directory or --config is required"),
        };

        if let (Some(_), Some(dir)) = (&self.config, &self.data_dir) {
            config.data_dir = dir.clone();
        }
        if let Some(ref out) = self.output_dir {
            config.output_dir = out.clone();
        }
        if let Some(sigma) = self.sigma {
            config.stacking.sigma = sigma;
        }
        if self.no_dark {
            config.calibration.use_dark = false;
        }
        if self.previews {
            config.output.previews = true;
        }
        debug!(
            data_dir = %config.data_dir.display(),
            output_dir = %config.output_dir.display(),
            "Resolved run config"
        );
        Ok(config)
    }
}
