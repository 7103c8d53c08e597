//! Per-channel priors, minimum-spend constraints and response-curve constants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BoundedEstimate, Channel, Metric};
use crate::errors::OptimizerError;

// ============================================================================
// Performance Priors
// ============================================================================

/// Funnel priors for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelPriors {
    #[serde(rename = "CVR")]
    pub cvr: BoundedEstimate,
    #[serde(rename = "CPM")]
    pub cpm: BoundedEstimate,
    #[serde(rename = "CTR")]
    pub ctr: BoundedEstimate,
}

impl ChannelPriors {
    pub fn metric(&self, metric: Metric) -> &BoundedEstimate {
        match metric {
            Metric::Cvr => &self.cvr,
            Metric::Cpm => &self.cpm,
            Metric::Ctr => &self.ctr,
        }
    }
}

/// Priors for every channel that will be allocated. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Channel, ChannelPriors>",
    into = "BTreeMap<Channel, ChannelPriors>"
)]
pub struct PerformancePriors {
    channels: BTreeMap<Channel, ChannelPriors>,
}

impl PerformancePriors {
    pub fn new(channels: BTreeMap<Channel, ChannelPriors>) -> Result<Self, OptimizerError> {
        if channels.is_empty() {
            return Err(OptimizerError::NoChannels);
        }
        Ok(Self { channels })
    }

    pub fn get(&self, channel: Channel) -> Option<&ChannelPriors> {
        self.channels.get(&channel)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.channels.contains_key(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &ChannelPriors)> {
        self.channels.iter().map(|(ch, p)| (*ch, p))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl TryFrom<BTreeMap<Channel, ChannelPriors>> for PerformancePriors {
    type Error = OptimizerError;

    fn try_from(channels: BTreeMap<Channel, ChannelPriors>) -> Result<Self, Self::Error> {
        Self::new(channels)
    }
}

impl From<PerformancePriors> for BTreeMap<Channel, ChannelPriors> {
    fn from(priors: PerformancePriors) -> Self {
        priors.channels
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Minimum budget fraction per channel. Absent channels have a minimum of 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Channel, f64>", into = "BTreeMap<Channel, f64>")]
pub struct Constraints {
    min_fractions: BTreeMap<Channel, f64>,
}

impl Constraints {
    /// No minimums.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(min_fractions: BTreeMap<Channel, f64>) -> Result<Self, OptimizerError> {
        for (&channel, &fraction) in &min_fractions {
            validate_fraction(channel, fraction)?;
        }
        Ok(Self { min_fractions })
    }

    /// Add or replace one channel's minimum.
    pub fn with_min(mut self, channel: Channel, fraction: f64) -> Result<Self, OptimizerError> {
        validate_fraction(channel, fraction)?;
        self.min_fractions.insert(channel, fraction);
        Ok(self)
    }

    /// Minimum fraction for `channel`, 0 when unconstrained.
    pub fn min_fraction(&self, channel: Channel) -> f64 {
        self.min_fractions.get(&channel).copied().unwrap_or(0.0)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.min_fractions.keys().copied()
    }

    pub fn total_fraction(&self) -> f64 {
        self.min_fractions.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.min_fractions.is_empty()
    }
}

fn validate_fraction(channel: Channel, fraction: f64) -> Result<(), OptimizerError> {
    if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
        return Err(OptimizerError::InvalidConstraint { channel, fraction });
    }
    Ok(())
}

impl TryFrom<BTreeMap<Channel, f64>> for Constraints {
    type Error = OptimizerError;

    fn try_from(min_fractions: BTreeMap<Channel, f64>) -> Result<Self, Self::Error> {
        Self::new(min_fractions)
    }
}

impl From<Constraints> for BTreeMap<Channel, f64> {
    fn from(constraints: Constraints) -> Self {
        constraints.min_fractions
    }
}

// ============================================================================
// Saturation Parameters
// ============================================================================

/// Diminishing-returns response curve: `max_conv * spend / (spend + K)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationParams {
    /// Conversion ceiling as spend grows without bound
    pub max_conv: f64,
    /// Spend at which half of `max_conv` is reached
    #[serde(rename = "K")]
    pub k: f64,
}

impl SaturationParams {
    pub const fn new(max_conv: f64, k: f64) -> Self {
        Self { max_conv, k }
    }

    pub fn validate(&self, channel: Channel) -> Result<(), OptimizerError> {
        let ok = self.max_conv.is_finite() && self.k.is_finite() && self.max_conv > 0.0 && self.k > 0.0;
        if !ok {
            return Err(OptimizerError::InvalidSaturation {
                channel,
                max_conv: self.max_conv,
                k: self.k,
            });
        }
        Ok(())
    }

    /// Noise-free expected conversions at `spend`.
    pub fn response(&self, spend: f64) -> f64 {
        let spend = spend.max(0.0);
        self.max_conv * spend / (spend + self.k)
    }
}

/// Per-channel response-curve constants.
///
/// Operator configuration, never request-supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct SaturationTable {
    params: BTreeMap<Channel, SaturationParams>,
}

impl SaturationTable {
    pub fn new(params: BTreeMap<Channel, SaturationParams>) -> Result<Self, OptimizerError> {
        let table = Self { params };
        table.validate()?;
        Ok(table)
    }

    pub fn get(&self, channel: Channel) -> Option<&SaturationParams> {
        self.params.get(&channel)
    }

    pub fn set(&mut self, channel: Channel, params: SaturationParams) {
        self.params.insert(channel, params);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &SaturationParams)> {
        self.params.iter().map(|(ch, p)| (*ch, p))
    }

    /// Check every curve.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        for (&channel, params) in &self.params {
            params.validate(channel)?;
        }
        Ok(())
    }
}

impl Default for SaturationTable {
    fn default() -> Self {
        let params = [
            (Channel::Google, SaturationParams::new(600.0, 2000.0)),
            (Channel::LinkedIn, SaturationParams::new(200.0, 1000.0)),
            (Channel::Meta, SaturationParams::new(150.0, 800.0)),
            (Channel::TikTok, SaturationParams::new(100.0, 500.0)),
        ]
        .into_iter()
        .collect();
        Self { params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est(lower: f64, upper: f64, mean: f64) -> BoundedEstimate {
        BoundedEstimate::new(lower, upper, mean).unwrap()
    }

    fn sample_priors() -> ChannelPriors {
        ChannelPriors {
            cvr: est(0.02, 0.06, 0.04),
            cpm: est(8.0, 16.0, 12.0),
            ctr: est(0.01, 0.03, 0.02),
        }
    }

    #[test]
    fn test_metric_lookup_matches_fields() {
        let p = sample_priors();
        assert_eq!(*p.metric(Metric::Cvr), p.cvr);
        assert_eq!(p.metric(Metric::Cpm).mean(), 12.0);
        assert_eq!(p.metric(Metric::Ctr).upper(), 0.03);
    }

    #[test]
    fn test_empty_priors_rejected() {
        assert_eq!(
            PerformancePriors::new(BTreeMap::new()).unwrap_err(),
            OptimizerError::NoChannels
        );
    }

    #[test]
    fn test_priors_deserialize_wire_keys() {
        let json = r#"{
            "google": {
                "CVR": {"lower": 0.02, "upper": 0.06, "mean": 0.04},
                "CPM": {"lower": 8.0, "upper": 16.0, "mean": 12.0},
                "CTR": {"lower": 0.01, "upper": 0.03, "mean": 0.02}
            }
        }"#;
        let priors: PerformancePriors = serde_json::from_str(json).unwrap();
        assert_eq!(priors.len(), 1);
        assert_eq!(priors.get(Channel::Google).unwrap(), &sample_priors());
    }

    #[test]
    fn test_priors_deserialize_rejects_bad_estimate() {
        let json = r#"{
            "meta": {
                "CVR": {"lower": 0.06, "upper": 0.02, "mean": 0.04},
                "CPM": {"lower": 8.0, "upper": 16.0, "mean": 12.0},
                "CTR": {"lower": 0.01, "upper": 0.03, "mean": 0.02}
            }
        }"#;
        assert!(serde_json::from_str::<PerformancePriors>(json).is_err());
    }

    #[test]
    fn test_constraints_default_zero() {
        let c = Constraints::none().with_min(Channel::Meta, 0.2).unwrap();
        assert_eq!(c.min_fraction(Channel::Meta), 0.2);
        assert_eq!(c.min_fraction(Channel::Google), 0.0);
    }

    #[test]
    fn test_constraint_out_of_range_rejected() {
        let err = Constraints::none().with_min(Channel::Google, 1.2).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidConstraint { .. }));
        assert!(Constraints::none().with_min(Channel::Google, -0.1).is_err());
        assert!(Constraints::none().with_min(Channel::Google, f64::NAN).is_err());
    }

    #[test]
    fn test_default_saturation_table() {
        let table = SaturationTable::default();
        assert!(table.validate().is_ok());
        let google = table.get(Channel::Google).unwrap();
        assert_eq!(google.max_conv, 600.0);
        assert_eq!(google.k, 2000.0);
        // Half saturation at spend == K
        assert!((google.response(2000.0) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_saturation_rejected() {
        let mut table = SaturationTable::default();
        table.set(Channel::Meta, SaturationParams::new(150.0, 0.0));
        assert!(matches!(
            table.validate(),
            Err(OptimizerError::InvalidSaturation { .. })
        ));
    }

    #[test]
    fn test_response_non_decreasing() {
        let params = SaturationParams::new(200.0, 1000.0);
        let mut prev = params.response(0.0);
        assert_eq!(prev, 0.0);
        for i in 1..=200 {
            let r = params.response(i as f64 * 50.0);
            assert!(r >= prev, "response decreased at spend {}", i * 50);
            assert!(r < params.max_conv);
            prev = r;
        }
    }
}
