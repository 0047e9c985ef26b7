use std::path::PathBuf;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A single detector exposure.
/// Pixel values are raw counts (ADU) stored as f32.
#[derive(Clone, Debug)]
pub struct RawFrame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    pub metadata: FrameMetadata,
}

impl RawFrame {
    pub fn new(data: Array2<f32>, kind: FrameKind) -> Self {
        Self {
            data,
            metadata: FrameMetadata {
                kind,
                ..Default::default()
            },
        }
    }

    pub fn with_exposure(mut self, seconds: f64) -> Self {
        self.metadata.exposure_time = Some(seconds);
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.metadata.timestamp = Some(timestamp);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.metadata.filter = Some(filter.into());
        self
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    pub kind: FrameKind,
    /// Exposure time in seconds (`EXPTIME`).
    pub exposure_time: Option<f64>,
    /// Observation time, Julian date in days.
    pub timestamp: Option<f64>,
    pub filter: Option<String>,
    /// File the frame was read from, if any.
    pub source: Option<PathBuf>,
    /// Position in the discovered file sequence.
    pub index: Option<usize>,
}

/// Exposure type of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Bias,
    Dark,
    Flat,
    #[default]
    Science,
}

impl FrameKind {
    /// Guess the kind from an `IMAGETYP` header value.
    pub fn from_header(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.contains("bias") || v.contains("zero") {
            Some(Self::Bias)
        } else if v.contains("dark") {
            Some(Self::Dark)
        } else if v.contains("flat") {
            Some(Self::Flat)
        } else if v.contains("light") || v.contains("object") || v.contains("science") {
            Some(Self::Science)
        } else {
            None
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bias => write!(f, "Bias"),
            Self::Dark => write!(f, "Dark"),
            Self::Flat => write!(f, "Flat"),
            Self::Science => write!(f, "Science"),
        }
    }
}
