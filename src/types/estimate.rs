//! Bounded estimate of a funnel metric.

use serde::{Deserialize, Serialize};

use crate::errors::OptimizerError;

/// Elicited belief about a metric: `lower <= mean <= upper`.
///
/// The bounds are read as an approximate ±2σ interval around the mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEstimate")]
pub struct BoundedEstimate {
    lower: f64,
    upper: f64,
    mean: f64,
}

/// Unvalidated wire form.
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawEstimate {
    lower: f64,
    upper: f64,
    mean: f64,
}

impl TryFrom<RawEstimate> for BoundedEstimate {
    type Error = OptimizerError;

    fn try_from(raw: RawEstimate) -> Result<Self, Self::Error> {
        BoundedEstimate::new(raw.lower, raw.upper, raw.mean)
    }
}

impl BoundedEstimate {
    /// Validate and build an estimate.
    ///
    /// Bounds must be finite and non-negative with `lower <= mean <= upper`.
    pub fn new(lower: f64, upper: f64, mean: f64) -> Result<Self, OptimizerError> {
        if !(lower.is_finite() && upper.is_finite() && mean.is_finite()) {
            return Err(OptimizerError::invalid_estimate(
                lower,
                mean,
                upper,
                "non-finite value",
            ));
        }
        if upper < lower {
            return Err(OptimizerError::invalid_estimate(
                lower,
                mean,
                upper,
                "upper < lower",
            ));
        }
        if mean < lower || mean > upper {
            return Err(OptimizerError::invalid_estimate(
                lower,
                mean,
                upper,
                "mean outside [lower, upper]",
            ));
        }
        if lower < 0.0 {
            return Err(OptimizerError::invalid_estimate(
                lower,
                mean,
                upper,
                "negative bound",
            ));
        }
        Ok(Self { lower, upper, mean })
    }

    /// Degenerate estimate with no uncertainty.
    pub fn exact(value: f64) -> Result<Self, OptimizerError> {
        Self::new(value, value, value)
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sampling standard deviation: `(upper - lower) / 4`.
    pub fn std_dev(&self) -> f64 {
        (self.upper - self.lower) / 4.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}
