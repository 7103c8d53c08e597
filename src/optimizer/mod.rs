//! Two-stage Monte Carlo budget optimizer.
//!
//! - **sampler**: clipped-normal draws from bounded estimates
//! - **estimator**: stage-1 linear-funnel conversions at an equal-split probe
//! - **allocation**: minimum-floor-constrained softmax
//! - **saturation**: stage-2 saturating-response simulation and percentiles
//! - **orchestrator**: sequences the stages
//!
//! All randomness is injected. The free functions take `&mut impl Rng`; the
//! orchestrator derives per-lane streams from one base seed (see `streams`).

pub mod allocation;
mod config;
pub mod estimator;
mod orchestrator;
pub mod sampler;
pub mod saturation;
pub mod stats;
pub mod streams;

#[cfg(test)]
mod tests;

pub use allocation::{allocate, plan_allocation, softmax, softmax_weights, AllocationPlan};
pub use config::OptimizerConfig;
pub use estimator::{estimate, estimate_channel, estimate_with_streams};
pub use orchestrator::{BudgetOptimizer, OptimizationReport};
pub use sampler::{sample, ParamSampler};
pub use saturation::SaturationSimulator;
pub use streams::{SeedStreams, Stage};
