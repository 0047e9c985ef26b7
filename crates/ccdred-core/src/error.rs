use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CcdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("Invalid FITS file {path}: {reason}")]
    InvalidFits { path: PathBuf, reason: String },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Frame {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Flat frames mix filters: {first} and {other}")]
    FilterMismatch { first: String, other: String },

    #[error("Missing exposure time: {0}")]
    MissingExposure(String),

    #[error("Flat field cannot be normalized (median = {median})")]
    DegenerateFlat { median: f64 },

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CcdError>;
