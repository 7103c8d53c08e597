//! Stage-1 Monte Carlo: expected conversions per channel at a probe spend.
//!
//! The budget is split equally across channels and each channel is simulated
//! through a linear funnel:
//!
//! ```text
//! impressions = spend / cpm * 1000
//! clicks      = impressions * ctr
//! conversions = clicks * cvr
//! ```
//!
//! There are no diminishing returns here. The result only ranks channel
//! efficiency at a common reference spend; it does not predict outcomes at the
//! final allocation.

use std::collections::BTreeMap;

use rand::Rng;
use rayon::prelude::*;
use tracing::debug;

use super::sampler::ParamSampler;
use super::streams::{SeedStreams, Stage};
use crate::consts::IMPRESSIONS_PER_CPM;
use crate::errors::OptimizerError;
use crate::types::{Channel, ChannelPriors, Metric, PerformancePriors};

/// Stream lane shared by all channels in the estimation stage.
const COMMON_LANE: u64 = 0;

/// Equal-split spend per channel used for ranking.
pub fn probe_budget(priors: &PerformancePriors, total_budget: f64) -> f64 {
    total_budget / priors.len() as f64
}

/// Mean conversions per channel, all channels drawing from one RNG.
pub fn estimate<R: Rng + ?Sized>(
    priors: &PerformancePriors,
    total_budget: f64,
    n_simulations: usize,
    rng: &mut R,
) -> Result<BTreeMap<Channel, f64>, OptimizerError> {
    check_inputs(total_budget, n_simulations)?;
    let spend = probe_budget(priors, total_budget);

    let mut mean_convs = BTreeMap::new();
    for (channel, channel_priors) in priors.iter() {
        let mean = estimate_channel(channel, channel_priors, spend, n_simulations, rng)?;
        mean_convs.insert(channel, mean);
    }
    Ok(mean_convs)
}

/// Mean conversions per channel using common random numbers.
///
/// Every channel replays the same seeded stream, so channels with identical
/// priors get identical estimates and ranking differences come from the priors
/// alone. With `parallel` the channels run on the rayon pool. Results are
/// identical either way.
pub fn estimate_with_streams(
    priors: &PerformancePriors,
    total_budget: f64,
    n_simulations: usize,
    streams: &SeedStreams,
    parallel: bool,
) -> Result<BTreeMap<Channel, f64>, OptimizerError> {
    check_inputs(total_budget, n_simulations)?;
    let spend = probe_budget(priors, total_budget);
    let channels: Vec<(Channel, &ChannelPriors)> = priors.iter().collect();

    let run = |&(channel, channel_priors): &(Channel, &ChannelPriors)| {
        let mut rng = streams.stream(Stage::Estimation, COMMON_LANE);
        estimate_channel(channel, channel_priors, spend, n_simulations, &mut rng)
            .map(|mean| (channel, mean))
    };

    let means: Vec<(Channel, f64)> = if parallel {
        channels.par_iter().map(run).collect::<Result<_, _>>()?
    } else {
        channels.iter().map(run).collect::<Result<_, _>>()?
    };

    Ok(means.into_iter().collect())
}

/// Mean conversions for one channel over `n_simulations` trials.
pub fn estimate_channel<R: Rng + ?Sized>(
    channel: Channel,
    priors: &ChannelPriors,
    spend: f64,
    n_simulations: usize,
    rng: &mut R,
) -> Result<f64, OptimizerError> {
    let cpm_sampler = ParamSampler::new(priors.metric(Metric::Cpm))?;
    let ctr_sampler = ParamSampler::new(priors.metric(Metric::Ctr))?;
    let cvr_sampler = ParamSampler::new(priors.metric(Metric::Cvr))?;

    let mut sum = 0.0;
    for _ in 0..n_simulations {
        let cpm = cpm_sampler.sample(rng);
        let ctr = ctr_sampler.sample(rng);
        let cvr = cvr_sampler.sample(rng);

        // Division by a zero CPM would produce infinite impressions
        if !(cpm > 0.0 && cpm.is_finite()) {
            return Err(OptimizerError::InvalidSample {
                channel,
                metric: Metric::Cpm,
                value: cpm,
            });
        }

        sum += funnel_conversions(spend, cpm, ctr, cvr);
    }

    let mean = sum / n_simulations as f64;
    debug!(
        channel = %channel,
        spend,
        trials = n_simulations,
        mean_conversions = mean,
        "Estimated channel conversions"
    );
    Ok(mean)
}

/// Linear funnel: spend → impressions → clicks → conversions.
pub fn funnel_conversions(spend: f64, cpm: f64, ctr: f64, cvr: f64) -> f64 {
    let impressions = spend / cpm * IMPRESSIONS_PER_CPM;
    let clicks = impressions * ctr;
    clicks * cvr
}

fn check_inputs(total_budget: f64, n_simulations: usize) -> Result<(), OptimizerError> {
    if !(total_budget > 0.0 && total_budget.is_finite()) {
        return Err(OptimizerError::InvalidBudget(total_budget));
    }
    if n_simulations == 0 {
        return Err(OptimizerError::invalid_config(
            "estimation requires at least one trial",
        ));
    }
    Ok(())
}
