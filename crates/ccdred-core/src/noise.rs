//! Detector gain and readout noise from calibration frame pairs.
//!
//! Differencing two frames of the same illumination cancels fixed-pattern
//! structure, leaving shot noise (flats) or read noise (biases).

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CcdError, Result};
use crate::frame::RawFrame;

/// Which frame pairs feed an estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairPolicy {
    /// Only frames 0 and 1.
    #[default]
    FirstPair,
    /// Disjoint consecutive pairs (0,1), (2,3), ..., averaged.
    AllPairs,
}

impl std::fmt::Display for PairPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstPair => write!(f, "First pair"),
            Self::AllPairs => write!(f, "All pairs"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GainEstimate {
    /// Electrons per ADU.
    pub gain: f64,
    pub pairs_used: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadoutNoiseEstimate {
    /// Readout noise in electrons.
    pub electrons: f64,
    /// Readout noise in ADU, before applying the gain.
    pub adu: f64,
    pub pairs_used: usize,
}

/// Photon-transfer gain estimate from flat pairs.
///
/// Per pair: `signal = (mean(a) + mean(b)) / 2`,
/// `gain = signal / (var(a - b) / 2)`.
pub fn estimate_gain(flats: &[RawFrame], policy: PairPolicy) -> Result<GainEstimate> {
    let pairs = select_pairs(flats, policy, "flat")?;
    let mut total = 0.0;
    for (a, b) in &pairs {
        let stats = pair_stats(a, b)?;
        if stats.diff_variance <= 0.0 {
            return Err(CcdError::Numerical(
                "flat pair difference has zero variance".into(),
            ));
        }
        total += stats.signal / (stats.diff_variance / 2.0);
    }
    let gain = total / pairs.len() as f64;
    info!(gain, pairs = pairs.len(), "Estimated gain (e-/ADU)");
    Ok(GainEstimate {
        gain,
        pairs_used: pairs.len(),
    })
}

/// Readout noise from bias pairs: `std(a - b) / sqrt(2)`, times the gain.
pub fn estimate_readout_noise(
    biases: &[RawFrame],
    gain: f64,
    policy: PairPolicy,
) -> Result<ReadoutNoiseEstimate> {
    if !(gain.is_finite() && gain > 0.0) {
        return Err(CcdError::PreconditionViolation(format!(
            "gain must be positive, got {gain}"
        )));
    }
    let pairs = select_pairs(biases, policy, "bias")?;
    let adu = pairs
        .iter()
        .map(|(a, b)| pair_stats(a, b).map(|s| s.diff_variance.sqrt() / std::f64::consts::SQRT_2))
        .sum::<Result<f64>>()?
        / pairs.len() as f64;
    let electrons = adu * gain;
    info!(electrons, adu, pairs = pairs.len(), "Estimated readout noise");
    Ok(ReadoutNoiseEstimate {
        electrons,
        adu,
        pairs_used: pairs.len(),
    })
}

struct PairStats {
    signal: f64,
    diff_variance: f64,
}

fn select_pairs<'a>(
    frames: &'a [RawFrame],
    policy: PairPolicy,
    what: &str,
) -> Result<Vec<(&'a RawFrame, &'a RawFrame)>> {
    if frames.len() < 2 {
        return Err(CcdError::PreconditionViolation(format!(
            "need at least two {what} frames, got {}",
            frames.len()
        )));
    }
    let pairs = match policy {
        PairPolicy::FirstPair => vec![(&frames[0], &frames[1])],
        PairPolicy::AllPairs => frames.chunks_exact(2).map(|c| (&c[0], &c[1])).collect(),
    };
    Ok(pairs)
}

/// Mean signal of the pair and variance of their difference, over pixels
/// finite in both frames.
fn pair_stats(a: &RawFrame, b: &RawFrame) -> Result<PairStats> {
    if a.dim() != b.dim() {
        return Err(CcdError::ShapeMismatch {
            index: 1,
            expected: a.dim(),
            found: b.dim(),
        });
    }
    let mut n = 0usize;
    let mut sum_a = 0.0f64;
    let mut sum_b = 0.0f64;
    let mut sum_d = 0.0f64;
    let mut sum_d2 = 0.0f64;
    for (&va, &vb) in a.data.iter().zip(b.data.iter()) {
        if !(va.is_finite() && vb.is_finite()) {
            continue;
        }
        let (va, vb) = (va as f64, vb as f64);
        let d = va - vb;
        n += 1;
        sum_a += va;
        sum_b += vb;
        sum_d += d;
        sum_d2 += d * d;
    }
    if n == 0 {
        return Err(CcdError::Numerical("frame pair has no finite pixels".into()));
    }
    let nf = n as f64;
    let mean_d = sum_d / nf;
    Ok(PairStats {
        signal: (sum_a / nf + sum_b / nf) / 2.0,
        diff_variance: (sum_d2 / nf - mean_d * mean_d).max(0.0),
    })
}
