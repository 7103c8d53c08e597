//! Optimizer outputs: dollar allocation and conversion uncertainty bands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Channel;
use crate::consts::EPSILON;

/// Recommended dollars per channel. Sums to the total budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationResult {
    amounts: BTreeMap<Channel, f64>,
}

impl AllocationResult {
    pub fn new(amounts: BTreeMap<Channel, f64>) -> Self {
        Self { amounts }
    }

    /// Dollars for `channel`, 0 when the channel is not allocated.
    pub fn get(&self, channel: Channel) -> f64 {
        self.amounts.get(&channel).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Fraction of the allocated total going to `channel`.
    pub fn share(&self, channel: Channel) -> f64 {
        let total = self.total();
        if total < EPSILON {
            return 0.0;
        }
        self.get(channel) / total
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.amounts.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.amounts.iter().map(|(ch, v)| (*ch, *v))
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }
}

/// 10th percentile, mean and 90th percentile of simulated conversions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    #[serde(rename = "P10")]
    pub p10: f64,
    pub mean: f64,
    #[serde(rename = "P90")]
    pub p90: f64,
}

impl PercentileBand {
    /// Width of the 80% band.
    pub fn spread(&self) -> f64 {
        self.p90 - self.p10
    }

    /// Whether `p10 <= mean <= p90` holds within `tolerance`.
    pub fn is_ordered(&self, tolerance: f64) -> bool {
        self.p10 <= self.mean + tolerance && self.mean <= self.p90 + tolerance
    }
}

/// Per-channel bands plus the aggregate across channels.
///
/// Serializes as one flat map: `{"google": {...}, ..., "total": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionSummary {
    #[serde(flatten)]
    pub channels: BTreeMap<Channel, PercentileBand>,
    pub total: PercentileBand,
}

impl ConversionSummary {
    pub fn channel(&self, channel: Channel) -> Option<&PercentileBand> {
        self.channels.get(&channel)
    }
}
