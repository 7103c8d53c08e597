//! Optimizer settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CHUNK_SIZE, DEFAULT_NOISE_FRACTION, DEFAULT_SIMULATIONS};
use crate::errors::OptimizerError;
use crate::types::{Channel, SaturationParams, SaturationTable};

/// Configuration for the two-stage optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Trials per channel in the equal-split estimation stage.
    /// Default: 5000
    #[serde(default = "default_simulations")]
    pub estimation_trials: usize,

    /// Trials in the saturating-response stage.
    /// Default: 5000
    #[serde(default = "default_simulations")]
    pub saturation_trials: usize,

    /// Saturation noise std as a fraction of the point estimate.
    /// Default: 0.05
    #[serde(default = "default_noise_fraction")]
    pub noise_fraction: f64,

    /// Base seed (0 = draw from OS entropy).
    /// Default: 0
    #[serde(default)]
    pub random_seed: u64,

    /// Run channels / trial chunks on the rayon pool.
    /// Default: false
    #[serde(default)]
    pub parallel: bool,

    /// Saturation trials per seeded stream.
    /// Default: 1000
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Response curve per channel name.
    /// Default: google 600/2000, linkedin 200/1000, meta 150/800, tiktok 100/500
    #[serde(default = "default_saturation")]
    pub saturation: BTreeMap<String, SaturationParams>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            estimation_trials: default_simulations(),
            saturation_trials: default_simulations(),
            noise_fraction: default_noise_fraction(),
            random_seed: 0,
            parallel: false,
            chunk_size: default_chunk_size(),
            saturation: default_saturation(),
        }
    }
}

fn default_simulations() -> usize {
    DEFAULT_SIMULATIONS
}
fn default_noise_fraction() -> f64 {
    DEFAULT_NOISE_FRACTION
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_saturation() -> BTreeMap<String, SaturationParams> {
    SaturationTable::default()
        .iter()
        .map(|(ch, params)| (ch.as_str().to_string(), *params))
        .collect()
}

impl OptimizerConfig {
    /// Reject settings that cannot produce a result.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        if self.estimation_trials == 0 {
            return Err(OptimizerError::invalid_config("estimation_trials must be > 0"));
        }
        if self.saturation_trials == 0 {
            return Err(OptimizerError::invalid_config("saturation_trials must be > 0"));
        }
        if self.chunk_size == 0 {
            return Err(OptimizerError::invalid_config("chunk_size must be > 0"));
        }
        if !(self.noise_fraction >= 0.0 && self.noise_fraction.is_finite()) {
            return Err(OptimizerError::invalid_config(format!(
                "noise_fraction must be non-negative, got {}",
                self.noise_fraction
            )));
        }
        self.saturation_table().map(|_| ())
    }

    /// Typed, validated response-curve table.
    pub fn saturation_table(&self) -> Result<SaturationTable, OptimizerError> {
        let mut params = BTreeMap::new();
        for (name, curve) in &self.saturation {
            let channel: Channel = name.parse().map_err(|_| {
                OptimizerError::invalid_config(format!("unknown channel in saturation table: {name}"))
            })?;
            params.insert(channel, *curve);
        }
        SaturationTable::new(params)
    }
}
