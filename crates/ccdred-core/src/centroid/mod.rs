//! Star position refinement inside a search box around a nominal position.
//!
//! Strategies are interchangeable through the [`Centroider`] trait; the frame
//! median is used as the background reference for all of them.

mod com;
mod quadratic;

pub use com::CenterOfMass;
pub use quadratic::Quadratic;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::DEFAULT_CENTROID_BOX;
use crate::photometry::PixelPosition;
use crate::stats::finite_median;

/// A centroiding strategy.
pub trait Centroider: Send + Sync {
    /// Refine `nominal` inside a `box_size` x `box_size` window of
    /// `data - background`. Returns `None` when the window holds no usable
    /// signal.
    fn refine(
        &self,
        data: &ArrayView2<f32>,
        background: f32,
        nominal: PixelPosition,
        box_size: usize,
    ) -> Option<PixelPosition>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CentroidMethod {
    /// Intensity-weighted centre of mass.
    CenterOfMass,
    /// Quadratic surface fit around the brightest pixel.
    #[default]
    Quadratic,
}

impl CentroidMethod {
    pub fn centroider(&self) -> Box<dyn Centroider> {
        match self {
            Self::CenterOfMass => Box::new(CenterOfMass),
            Self::Quadratic => Box::new(Quadratic),
        }
    }
}

impl std::fmt::Display for CentroidMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CenterOfMass => write!(f, "Center of Mass"),
            Self::Quadratic => write!(f, "Quadratic"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentroidConfig {
    pub method: CentroidMethod,
    /// Search box edge length in pixels (odd values centre on the nominal pixel).
    pub box_size: usize,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            method: CentroidMethod::default(),
            box_size: DEFAULT_CENTROID_BOX,
        }
    }
}

/// Refined positions plus how many fell back to their nominal value.
#[derive(Clone, Debug, Default)]
pub struct RefinedPositions {
    pub positions: Vec<PixelPosition>,
    pub fallbacks: usize,
}

/// Refine every nominal position in a frame with the configured strategy.
///
/// Positions the strategy cannot refine keep their nominal value.
pub fn refine_positions(
    data: &ArrayView2<f32>,
    nominal: &[PixelPosition],
    config: &CentroidConfig,
) -> RefinedPositions {
    let background = finite_median(data).unwrap_or(0.0) as f32;
    let centroider = config.method.centroider();
    let mut fallbacks = 0;
    let positions = nominal
        .iter()
        .map(|&p| match centroider.refine(data, background, p, config.box_size) {
            Some(refined) => refined,
            None => {
                warn!(position = %p, method = %config.method, "Centroid failed; using nominal position");
                fallbacks += 1;
                p
            }
        })
        .collect();
    RefinedPositions {
        positions,
        fallbacks,
    }
}

/// Half-open pixel window `[row0, row1) x [col0, col1)` clipped to the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SearchBox {
    pub row0: usize,
    pub row1: usize,
    pub col0: usize,
    pub col1: usize,
}

impl SearchBox {
    pub(crate) fn around(
        nominal: PixelPosition,
        box_size: usize,
        dim: (usize, usize),
    ) -> Option<Self> {
        let (h, w) = dim;
        let half = (box_size.max(1) / 2) as f64;
        let cx = nominal.x.round();
        let cy = nominal.y.round();
        if !(cx.is_finite() && cy.is_finite()) {
            return None;
        }
        let col0 = (cx - half).max(0.0) as usize;
        let row0 = (cy - half).max(0.0) as usize;
        let col1 = ((cx + half + 1.0).max(0.0) as usize).min(w);
        let row1 = ((cy + half + 1.0).max(0.0) as usize).min(h);
        if col0 >= col1 || row0 >= row1 {
            return None;
        }
        Some(Self {
            row0,
            row1,
            col0,
            col1,
        })
    }
}
