/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum number of positions to measure in parallel.
pub const PARALLEL_POSITION_THRESHOLD: usize = 8;

/// Default rejection threshold for sigma-clipped stacking.
pub const DEFAULT_CLIP_SIGMA: f32 = 3.0;

/// Default upper bound on sigma-clipping iterations.
pub const DEFAULT_CLIP_ITERATIONS: usize = 5;

/// Flat-field pixels with a magnitude below this are not divided by.
pub const FLAT_DIVISOR_FLOOR: f32 = 1e-6;

/// Smallest usable flat median before normalization.
pub const FLAT_MEDIAN_FLOOR: f64 = 1e-12;

/// Exposure times closer than this (seconds) are considered equal.
pub const EXPOSURE_TOLERANCE: f64 = 1e-6;

/// Minutes per day, for converting Julian-date offsets.
pub const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Default FITS keyword carrying the exposure time in seconds.
pub const DEFAULT_EXPOSURE_KEY: &str = "EXPTIME";

/// Default FITS keyword carrying the observation Julian date.
pub const DEFAULT_TIMESTAMP_KEY: &str = "JD-OBS";

/// Default FITS keyword carrying the optical filter name.
pub const DEFAULT_FILTER_KEY: &str = "FILTER";

/// FITS keyword carrying the frame type.
pub const IMAGE_TYPE_KEY: &str = "IMAGETYP";

/// FITS keyword recording which master a file holds.
pub const CALIBRATION_TYPE_KEY: &str = "CALTYPE";

/// FITS keyword recording the flat median divided out during normalization.
pub const FLAT_NORMALIZATION_KEY: &str = "FLATNORM";

/// Default centroid search box edge length in pixels.
pub const DEFAULT_CENTROID_BOX: usize = 15;

/// Lower percentile for preview stretching.
pub const PREVIEW_LOW_PERCENTILE: f32 = 0.5;

/// Upper percentile for preview stretching.
pub const PREVIEW_HIGH_PERCENTILE: f32 = 99.5;
