//! Stage-2 Monte Carlo: conversions under the chosen allocation.
//!
//! # Model
//!
//! For each trial and channel:
//! 1. `point = max_conv * spend / (spend + K)`
//! 2. Add Normal(0, noise_fraction * point) noise
//! 3. Floor at 0 (a clamp, not a truncated distribution: the negative tail is
//!    discarded each trial, which nudges the mean up slightly)
//!
//! The per-trial total is the sum over channels. P10 / mean / P90 are then
//! reported per channel and for the total.
//!
//! # Streams
//!
//! Trials are cut into fixed-size chunks, each drawing from its own seeded
//! stream. Chunks may run on the rayon pool; their draws are concatenated in
//! chunk order, so the summary does not depend on scheduling.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::debug;

use super::stats::summarize;
use super::streams::{SeedStreams, Stage};
use crate::consts::{DEFAULT_CHUNK_SIZE, DEFAULT_NOISE_FRACTION};
use crate::errors::OptimizerError;
use crate::types::{AllocationResult, Channel, ConversionSummary, SaturationParams, SaturationTable};

/// One channel's curve evaluated at its allocated spend.
#[derive(Debug, Clone, Copy)]
struct ChannelCurve {
    channel: Channel,
    point: f64,
    noise: Option<Normal<f64>>,
}

impl ChannelCurve {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let noisy = match &self.noise {
            Some(noise) => self.point + noise.sample(rng),
            None => self.point,
        };
        noisy.max(0.0)
    }
}

/// Raw draws for a run of trials.
#[derive(Debug, Default)]
struct TrialDraws {
    /// One vector per channel, in curve order
    per_channel: Vec<Vec<f64>>,
    totals: Vec<f64>,
}

impl TrialDraws {
    fn with_capacity(n_channels: usize, n_trials: usize) -> Self {
        Self {
            per_channel: (0..n_channels).map(|_| Vec::with_capacity(n_trials)).collect(),
            totals: Vec::with_capacity(n_trials),
        }
    }

    fn extend(&mut self, other: TrialDraws) {
        for (mine, theirs) in self.per_channel.iter_mut().zip(other.per_channel) {
            mine.extend(theirs);
        }
        self.totals.extend(other.totals);
    }
}

/// Saturating-response simulator.
#[derive(Debug, Clone)]
pub struct SaturationSimulator {
    table: SaturationTable,
    noise_fraction: f64,
    chunk_size: usize,
}

impl SaturationSimulator {
    /// Simulator over `table` with the reference 5% noise.
    pub fn new(table: SaturationTable) -> Self {
        Self {
            table,
            noise_fraction: DEFAULT_NOISE_FRACTION,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Noise standard deviation as a fraction of the point estimate (0 = off).
    pub fn with_noise_fraction(mut self, noise_fraction: f64) -> Self {
        self.noise_fraction = noise_fraction;
        self
    }

    /// Trials per seeded stream.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn table(&self) -> &SaturationTable {
        &self.table
    }

    pub fn noise_fraction(&self) -> f64 {
        self.noise_fraction
    }

    /// Noise-free response for `channel` at `spend`.
    pub fn expected_conversions(&self, channel: Channel, spend: f64) -> Result<f64, OptimizerError> {
        Ok(self.params_for(channel)?.response(spend))
    }

    /// Simulate `n_simulations` trials drawing from one RNG.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        allocation: &AllocationResult,
        n_simulations: usize,
        rng: &mut R,
    ) -> Result<ConversionSummary, OptimizerError> {
        let curves = self.prepare(allocation, n_simulations)?;
        let draws = run_trials(&curves, n_simulations, rng);
        Ok(summarize_draws(&curves, draws))
    }

    /// Simulate `n_simulations` trials on chunked seeded streams.
    pub fn simulate_with_streams(
        &self,
        allocation: &AllocationResult,
        n_simulations: usize,
        streams: &SeedStreams,
        parallel: bool,
    ) -> Result<ConversionSummary, OptimizerError> {
        if self.chunk_size == 0 {
            return Err(OptimizerError::invalid_config("chunk_size must be positive"));
        }
        let curves = self.prepare(allocation, n_simulations)?;

        let chunk_size = self.chunk_size;
        let n_chunks = n_simulations.div_ceil(chunk_size);
        let run_chunk = |chunk: usize| {
            let start = chunk * chunk_size;
            let len = chunk_size.min(n_simulations - start);
            let mut rng = streams.stream(Stage::Saturation, chunk as u64);
            run_trials(&curves, len, &mut rng)
        };

        let chunks: Vec<TrialDraws> = if parallel {
            (0..n_chunks).into_par_iter().map(run_chunk).collect()
        } else {
            (0..n_chunks).map(run_chunk).collect()
        };

        let mut draws = TrialDraws::with_capacity(curves.len(), n_simulations);
        for chunk in chunks {
            draws.extend(chunk);
        }

        debug!(
            trials = n_simulations,
            chunks = n_chunks,
            parallel,
            "Simulated saturating response"
        );
        Ok(summarize_draws(&curves, draws))
    }

    fn params_for(&self, channel: Channel) -> Result<&SaturationParams, OptimizerError> {
        self.table.get(channel).ok_or_else(|| {
            OptimizerError::missing_channel(channel, "no saturation parameters")
        })
    }

    /// Validate inputs and evaluate each curve at its spend.
    fn prepare(
        &self,
        allocation: &AllocationResult,
        n_simulations: usize,
    ) -> Result<Vec<ChannelCurve>, OptimizerError> {
        if n_simulations == 0 {
            return Err(OptimizerError::invalid_config(
                "saturation simulation requires at least one trial",
            ));
        }
        if !(self.noise_fraction >= 0.0 && self.noise_fraction.is_finite()) {
            return Err(OptimizerError::invalid_config(format!(
                "noise_fraction must be non-negative, got {}",
                self.noise_fraction
            )));
        }
        if allocation.is_empty() {
            return Err(OptimizerError::NoChannels);
        }

        allocation
            .iter()
            .map(|(channel, spend)| -> Result<ChannelCurve, OptimizerError> {
                let params = self.params_for(channel)?;
                params.validate(channel)?;
                let point = params.response(spend);
                let std = self.noise_fraction * point;
                let noise = if std > 0.0 {
                    Some(Normal::new(0.0, std).map_err(|e| {
                        OptimizerError::invalid_config(format!("noise for {channel}: {e}"))
                    })?)
                } else {
                    None
                };
                Ok(ChannelCurve {
                    channel,
                    point,
                    noise,
                })
            })
            .collect()
    }
}

fn run_trials<R: Rng + ?Sized>(curves: &[ChannelCurve], n_trials: usize, rng: &mut R) -> TrialDraws {
    let mut draws = TrialDraws::with_capacity(curves.len(), n_trials);
    for _ in 0..n_trials {
        let mut total = 0.0;
        for (curve, samples) in curves.iter().zip(draws.per_channel.iter_mut()) {
            let conv = curve.draw(rng);
            samples.push(conv);
            total += conv;
        }
        draws.totals.push(total);
    }
    draws
}

fn summarize_draws(curves: &[ChannelCurve], mut draws: TrialDraws) -> ConversionSummary {
    let channels: BTreeMap<Channel, _> = curves
        .iter()
        .zip(draws.per_channel.iter_mut())
        .map(|(curve, samples)| (curve.channel, summarize(samples)))
        .collect();
    let total = summarize(&mut draws.totals);
    ConversionSummary { channels, total }
}
