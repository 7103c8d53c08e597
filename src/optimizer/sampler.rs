//! Clipped-normal draws from a bounded estimate.
//!
//! The bounds are treated as ±2σ: `std = (upper - lower) / 4`. Draws outside the
//! interval are clipped to the nearest bound rather than resampled, so a wide
//! interval piles some mass onto its edges.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::errors::OptimizerError;
use crate::types::BoundedEstimate;

/// Reusable sampler for one estimate (built once per channel and metric).
#[derive(Debug, Clone, Copy)]
pub struct ParamSampler {
    normal: Normal<f64>,
    lower: f64,
    upper: f64,
}

impl ParamSampler {
    pub fn new(estimate: &BoundedEstimate) -> Result<Self, OptimizerError> {
        let normal = Normal::new(estimate.mean(), estimate.std_dev()).map_err(|e| {
            OptimizerError::invalid_estimate(
                estimate.lower(),
                estimate.mean(),
                estimate.upper(),
                e.to_string(),
            )
        })?;
        Ok(Self {
            normal,
            lower: estimate.lower(),
            upper: estimate.upper(),
        })
    }

    /// One draw, always within `[lower, upper]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.normal.sample(rng).clamp(self.lower, self.upper)
    }
}

/// Draw one value from `estimate`.
pub fn sample<R: Rng + ?Sized>(estimate: &BoundedEstimate, rng: &mut R) -> Result<f64, OptimizerError> {
    Ok(ParamSampler::new(estimate)?.sample(rng))
}
