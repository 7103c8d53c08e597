//! Summary statistics over Monte Carlo draws.

use crate::consts::{LOWER_PERCENTILE, UPPER_PERCENTILE};
use crate::types::PercentileBand;

/// Arithmetic mean (0 for no samples).
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Percentile of ascending-sorted samples, `p` in [0, 1].
///
/// Linear interpolation between the two nearest order statistics.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = idx - lo as f64;
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}

/// P10 / mean / P90 of `samples`. Sorts in place.
pub fn summarize(samples: &mut [f64]) -> PercentileBand {
    samples.sort_by(f64::total_cmp);
    PercentileBand {
        p10: percentile(samples, LOWER_PERCENTILE),
        mean: mean(samples),
        p90: percentile(samples, UPPER_PERCENTILE),
    }
}
