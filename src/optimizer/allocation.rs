//! Minimum-floor-constrained softmax allocation.
//!
//! ```text
//! min[ch]   = fraction[ch] * budget          (rescaled to sum to budget if over)
//! remaining = budget - Σ min
//! w         = softmax(mean_convs)            (max-subtracted, shift invariant)
//! alloc[ch] = min[ch] + remaining * w[ch]
//! ```

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::consts::EPSILON;
use crate::errors::OptimizerError;
use crate::types::{AllocationResult, Channel, Constraints};

/// Intermediate values of one allocation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    /// Minimum dollars per channel after any rescaling
    pub min_budgets: BTreeMap<Channel, f64>,
    /// Softmax weight per channel (sums to 1)
    pub weights: BTreeMap<Channel, f64>,
    /// Budget left after minimums, distributed by weight
    pub remaining: f64,
    /// Whether the minimums exceeded the budget and were scaled down
    pub rescaled: bool,
    /// Final dollars per channel
    pub allocation: AllocationResult,
}

/// Numerically stable softmax: `exp(x - max) / Σ exp(x - max)`.
///
/// Adding a constant to every score leaves the weights unchanged.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return vec![];
    }

    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();

    if !(sum > EPSILON) || !sum.is_finite() {
        // Degenerate scores, fall back to uniform
        let n = scores.len() as f64;
        return vec![1.0 / n; scores.len()];
    }

    exp.iter().map(|&e| e / sum).collect()
}

/// Softmax over per-channel scores, keyed by channel.
pub fn softmax_weights(scores: &BTreeMap<Channel, f64>) -> BTreeMap<Channel, f64> {
    let values: Vec<f64> = scores.values().copied().collect();
    scores.keys().copied().zip(softmax(&values)).collect()
}

/// Dollar allocation for the given stage-1 scores.
pub fn allocate(
    mean_convs: &BTreeMap<Channel, f64>,
    total_budget: f64,
    constraints: &Constraints,
) -> Result<AllocationResult, OptimizerError> {
    plan_allocation(mean_convs, total_budget, constraints).map(|plan| plan.allocation)
}

/// Full allocation plan for the given stage-1 scores.
///
/// Fails with `MissingChannelData` if a constraint names a channel that has no
/// score.
pub fn plan_allocation(
    mean_convs: &BTreeMap<Channel, f64>,
    total_budget: f64,
    constraints: &Constraints,
) -> Result<AllocationPlan, OptimizerError> {
    if !(total_budget > 0.0 && total_budget.is_finite()) {
        return Err(OptimizerError::InvalidBudget(total_budget));
    }
    if mean_convs.is_empty() {
        return Err(OptimizerError::NoChannels);
    }
    if let Some(channel) = constraints.channels().find(|ch| !mean_convs.contains_key(ch)) {
        return Err(OptimizerError::missing_channel(
            channel,
            "constraint references a channel without priors",
        ));
    }

    // 1. Minimum budgets
    let mut min_budgets: BTreeMap<Channel, f64> = mean_convs
        .keys()
        .map(|&ch| (ch, constraints.min_fraction(ch) * total_budget))
        .collect();
    let sum_min: f64 = min_budgets.values().sum();

    // 2-3. Rescale if over-committed, otherwise leave the rest to softmax
    let rescaled = sum_min > total_budget;
    let remaining = if rescaled {
        let scale = total_budget / sum_min;
        for min in min_budgets.values_mut() {
            *min *= scale;
        }
        warn!(
            sum_min,
            total_budget,
            scale,
            "Minimum spend exceeds budget, rescaling minimums"
        );
        0.0
    } else {
        let rest = total_budget - sum_min;
        // Fractions that sum to 1 up to rounding leave nothing to distribute
        if rest <= total_budget * 1e-12 {
            0.0
        } else {
            rest
        }
    };

    // 4. Stable softmax weights
    let weights = softmax_weights(mean_convs);

    // 5. Final allocation
    let amounts: BTreeMap<Channel, f64> = min_budgets
        .iter()
        .map(|(&ch, &min)| (ch, min + remaining * weights[&ch]))
        .collect();

    debug!(
        channels = amounts.len(),
        remaining,
        rescaled,
        "Computed softmax allocation"
    );

    Ok(AllocationPlan {
        min_budgets,
        weights,
        remaining,
        rescaled,
        allocation: AllocationResult::new(amounts),
    })
}
