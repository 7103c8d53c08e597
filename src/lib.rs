//! Monte Carlo budget allocation across advertising channels.
//!
//! Given uncertain per-channel funnel metrics (CVR, CPM, CTR as bounded
//! estimates) and a total budget, the optimizer
//! 1. ranks channels by simulated conversions at an equal-split probe spend,
//! 2. splits the budget with a softmax on top of per-channel minimum floors,
//! 3. re-simulates the chosen split against saturating response curves and
//!    reports P10 / mean / P90 conversions.
//!
//! The `service` layer wraps this with tolerant parsing of collaborator answers,
//! a bounded priors cache and retrying acquisition.

// Core modules
mod consts;
mod errors;

pub mod optimizer;
pub mod service;
pub mod types;

// Re-exports
pub use consts::{
    DEFAULT_CHUNK_SIZE, DEFAULT_NOISE_FRACTION, DEFAULT_SIMULATIONS, EPSILON, IMPRESSIONS_PER_CPM,
    LOWER_PERCENTILE, UPPER_PERCENTILE,
};
pub use errors::{ErrorKind, OptimizerError, PriorsError, ServiceError};
pub use optimizer::{BudgetOptimizer, OptimizationReport, OptimizerConfig};
pub use types::*;
