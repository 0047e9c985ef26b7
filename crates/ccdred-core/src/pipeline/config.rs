use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::centroid::CentroidConfig;
use crate::io::discover::FramePatterns;
use crate::io::fits::{HeaderKeys, TrimRegion};
use crate::lightcurve::LightCurveConfig;
use crate::noise::PairPolicy;
use crate::photometry::ApertureSpec;
use crate::stack::SigmaClipParams;

/// Everything one reduction run needs, passed explicitly to each stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub patterns: FramePatterns,
    #[serde(default)]
    pub header: HeaderKeys,
    /// Fixed detector window applied to every frame on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimRegion>,
    #[serde(default)]
    pub stacking: SigmaClipParams,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub photometry: ApertureSpec,
    #[serde(default)]
    pub centroid: CentroidConfig,
    #[serde(default)]
    pub lightcurve: LightCurveConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
            patterns: FramePatterns::default(),
            header: HeaderKeys::default(),
            trim: None,
            stacking: SigmaClipParams::default(),
            calibration: CalibrationConfig::default(),
            photometry: ApertureSpec::default(),
            centroid: CentroidConfig::default(),
            lightcurve: LightCurveConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Subtract dark current when dark frames are available.
    pub use_dark: bool,
    /// Reference exposure of the darks; header value when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark_exposure_time: Option<f64>,
    /// Exposure to scale the dark to for flats; each flat's header when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flat_exposure_time: Option<f64>,
    pub noise_pairs: PairPolicy,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            use_dark: true,
            dark_exposure_time: None,
            flat_exposure_time: None,
            noise_pairs: PairPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write each calibrated science frame as FITS.
    pub save_calibrated: bool,
    /// File name prefix for calibrated frames; the 1-based index is appended.
    pub calibrated_prefix: String,
    /// Write PNG previews of the masters.
    pub previews: bool,
    pub lightcurve_json: String,
    pub lightcurve_csv: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_calibrated: true,
            calibrated_prefix: "reduced_science".into(),
            previews: false,
            lightcurve_json: "lightcurve.json".into(),
            lightcurve_csv: "lightcurve.csv".into(),
        }
    }
}
