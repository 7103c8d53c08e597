//! Two-stage optimizer pipeline.
//!
//! ```text
//! priors ─▶ estimate (equal split) ─▶ allocate (floored softmax) ─▶ simulate (saturating)
//!                                            │                              │
//!                                            ▼                              ▼
//!                                     AllocationResult              ConversionSummary
//! ```
//!
//! The allocation is chosen against the linear funnel; the reported uncertainty
//! is re-simulated against the saturating curve. The softmax is not
//! re-optimized against the nonlinear objective.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use super::allocation::{plan_allocation, AllocationPlan};
use super::config::OptimizerConfig;
use super::estimator::{estimate_with_streams, probe_budget};
use super::saturation::SaturationSimulator;
use super::streams::SeedStreams;
use crate::errors::OptimizerError;
use crate::types::{AllocationResult, Channel, Constraints, ConversionSummary, PerformancePriors};

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    pub summary: ConversionSummary,
    pub allocation: AllocationResult,
    /// Stage-1 mean conversions at the equal-split probe spend
    pub mean_conversions: BTreeMap<Channel, f64>,
    /// Softmax weight per channel
    pub weights: BTreeMap<Channel, f64>,
    /// Minimum dollars per channel after rescaling
    pub min_budgets: BTreeMap<Channel, f64>,
    pub remaining_budget: f64,
    pub minimums_rescaled: bool,
    /// Base seed used; re-running with it reproduces the report
    pub seed: u64,
}

/// Budget optimizer over a fixed configuration.
#[derive(Debug, Clone)]
pub struct BudgetOptimizer {
    config: OptimizerConfig,
    simulator: SaturationSimulator,
}

impl BudgetOptimizer {
    /// Create an optimizer, validating the configuration.
    pub fn new(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        config.validate()?;
        let simulator = SaturationSimulator::new(config.saturation_table()?)
            .with_noise_fraction(config.noise_fraction)
            .with_chunk_size(config.chunk_size);
        Ok(Self { config, simulator })
    }

    /// Create with default configuration.
    pub fn default_config() -> Self {
        let config = OptimizerConfig::default();
        let simulator = SaturationSimulator::new(Default::default())
            .with_noise_fraction(config.noise_fraction)
            .with_chunk_size(config.chunk_size);
        Self { config, simulator }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Allocation and conversion summary for `total_budget`.
    pub fn run(
        &self,
        priors: &PerformancePriors,
        total_budget: f64,
        constraints: &Constraints,
    ) -> Result<(ConversionSummary, AllocationResult), OptimizerError> {
        let report = self.run_detailed(priors, total_budget, constraints)?;
        Ok((report.summary, report.allocation))
    }

    /// Run with the configured seed (0 = entropy) and keep diagnostics.
    pub fn run_detailed(
        &self,
        priors: &PerformancePriors,
        total_budget: f64,
        constraints: &Constraints,
    ) -> Result<OptimizationReport, OptimizerError> {
        let streams = SeedStreams::from_config_seed(self.config.random_seed);
        self.run_with_streams(priors, total_budget, constraints, &streams)
    }

    /// Run with an explicit base seed, ignoring the configured one.
    pub fn run_seeded(
        &self,
        priors: &PerformancePriors,
        total_budget: f64,
        constraints: &Constraints,
        seed: u64,
    ) -> Result<OptimizationReport, OptimizerError> {
        self.run_with_streams(priors, total_budget, constraints, &SeedStreams::new(seed))
    }

    fn run_with_streams(
        &self,
        priors: &PerformancePriors,
        total_budget: f64,
        constraints: &Constraints,
        streams: &SeedStreams,
    ) -> Result<OptimizationReport, OptimizerError> {
        self.validate_inputs(priors, total_budget, constraints)?;

        debug!(
            channels = priors.len(),
            total_budget,
            probe_budget = probe_budget(priors, total_budget),
            seed = streams.base_seed(),
            "Starting budget optimization"
        );

        let mean_conversions = estimate_with_streams(
            priors,
            total_budget,
            self.config.estimation_trials,
            streams,
            self.config.parallel,
        )?;

        let AllocationPlan {
            min_budgets,
            weights,
            remaining,
            rescaled,
            allocation,
        } = plan_allocation(&mean_conversions, total_budget, constraints)?;

        let summary = self.simulator.simulate_with_streams(
            &allocation,
            self.config.saturation_trials,
            streams,
            self.config.parallel,
        )?;

        info!(
            total_budget,
            expected_conversions = summary.total.mean,
            p10 = summary.total.p10,
            p90 = summary.total.p90,
            seed = streams.base_seed(),
            "Budget optimization complete"
        );

        Ok(OptimizationReport {
            summary,
            allocation,
            mean_conversions,
            weights,
            min_budgets,
            remaining_budget: remaining,
            minimums_rescaled: rescaled,
            seed: streams.base_seed(),
        })
    }

    /// Checks done before any sampling.
    fn validate_inputs(
        &self,
        priors: &PerformancePriors,
        total_budget: f64,
        constraints: &Constraints,
    ) -> Result<(), OptimizerError> {
        if !(total_budget > 0.0 && total_budget.is_finite()) {
            return Err(OptimizerError::InvalidBudget(total_budget));
        }
        if let Some(channel) = constraints.channels().find(|&ch| !priors.contains(ch)) {
            return Err(OptimizerError::missing_channel(
                channel,
                "constraint references a channel without priors",
            ));
        }
        for channel in priors.channels() {
            let params = self.simulator.table().get(channel).ok_or_else(|| {
                OptimizerError::missing_channel(channel, "no saturation parameters")
            })?;
            params.validate(channel)?;
        }
        Ok(())
    }
}

impl Default for BudgetOptimizer {
    fn default() -> Self {
        Self::default_config()
    }
}
