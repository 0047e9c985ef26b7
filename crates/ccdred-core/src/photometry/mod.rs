//! Circular aperture photometry with sky-annulus background subtraction.

mod measure;
pub mod overlap;

pub use measure::Photometer;

use serde::{Deserialize, Serialize};

/// A point in a frame's pixel grid. `x` is the column, `y` the row; pixel
/// centres sit on integer coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
}

impl PixelPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for PixelPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Aperture radii and sky annulus geometry, all in pixels.
///
/// The annulus spans `sky_radius_in ..= sky_radius_in + sky_annulus_width` and
/// is shared by every radius. It should lie outside the largest aperture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApertureSpec {
    pub radii: Vec<f64>,
    pub sky_radius_in: f64,
    pub sky_annulus_width: f64,
}

impl Default for ApertureSpec {
    fn default() -> Self {
        Self {
            radii: vec![10.0],
            sky_radius_in: 18.0,
            sky_annulus_width: 4.0,
        }
    }
}

impl ApertureSpec {
    pub fn sky_radius_out(&self) -> f64 {
        self.sky_radius_in + self.sky_annulus_width
    }

    pub fn max_radius(&self) -> f64 {
        self.radii.iter().copied().fold(0.0, f64::max)
    }

    /// Whether the annulus starts beyond the largest aperture.
    pub fn annulus_clears_apertures(&self) -> bool {
        self.sky_radius_in > self.max_radius()
    }
}

/// Confidence marker for a single measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementStatus {
    Valid,
    /// The aperture extends past the frame edge; the raw sum is low.
    ApertureTruncated,
    /// The annulus extends past the frame edge; the background used the
    /// in-frame part only.
    AnnulusTruncated,
    /// A non-finite pixel fell inside the aperture or annulus.
    NonFinite,
}

impl MeasurementStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl std::fmt::Display for MeasurementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::ApertureTruncated => write!(f, "aperture truncated"),
            Self::AnnulusTruncated => write!(f, "annulus truncated"),
            Self::NonFinite => write!(f, "non-finite pixels"),
        }
    }
}

/// Photometry at one position and one radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApertureMeasurement {
    pub radius: f64,
    /// Weighted pixel sum inside the aperture.
    pub raw_flux: f64,
    /// `raw_flux - background_per_pixel * aperture_area`.
    pub flux: f64,
    pub aperture_area: f64,
    pub annulus_area: f64,
    pub background_per_pixel: f64,
    pub status: MeasurementStatus,
}

/// All radii measured at one position, in the order the radii were given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionPhotometry {
    pub position: PixelPosition,
    pub measurements: Vec<ApertureMeasurement>,
}

impl PositionPhotometry {
    pub fn radii(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.radius).collect()
    }

    pub fn fluxes(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.flux).collect()
    }

    pub fn raw_fluxes(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.raw_flux).collect()
    }

    /// `(radius, flux / raw_flux)` pairs, for judging flux convergence.
    pub fn radial_profile(&self) -> Vec<(f64, f64)> {
        self.measurements
            .iter()
            .map(|m| (m.radius, m.flux / m.raw_flux))
            .collect()
    }
}

/// Measurements for every requested position, in request order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotometryResult {
    pub positions: Vec<PositionPhotometry>,
}

impl PhotometryResult {
    pub fn get(&self, index: usize) -> Option<&PositionPhotometry> {
        self.positions.get(index)
    }

    /// Look up the entry for an exact position.
    pub fn find(&self, position: &PixelPosition) -> Option<&PositionPhotometry> {
        self.positions.iter().find(|p| p.position == *position)
    }

    /// Number of measurements that are not [`MeasurementStatus::Valid`].
    pub fn degenerate_count(&self) -> usize {
        self.positions
            .iter()
            .flat_map(|p| &p.measurements)
            .filter(|m| !m.status.is_valid())
            .count()
    }
}
