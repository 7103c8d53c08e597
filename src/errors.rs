use thiserror::Error;

use crate::types::{Channel, Metric};

/// Machine-readable classification of optimizer failures.
///
/// The calling layer maps these to client-facing messages; the string codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidEstimate,
    InvalidBudget,
    InvalidSample,
    MissingChannelData,
    InvalidConstraint,
    InvalidSaturation,
    NoChannels,
    InvalidConfig,
}

impl ErrorKind {
    /// Stable snake_case code for transport.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidEstimate => "invalid_estimate",
            ErrorKind::InvalidBudget => "invalid_budget",
            ErrorKind::InvalidSample => "invalid_sample",
            ErrorKind::MissingChannelData => "missing_channel_data",
            ErrorKind::InvalidConstraint => "invalid_constraint",
            ErrorKind::InvalidSaturation => "invalid_saturation",
            ErrorKind::NoChannels => "no_channels",
            ErrorKind::InvalidConfig => "invalid_config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Core optimizer error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// Estimate violates `lower <= mean <= upper` or holds a non-finite value
    #[error("Invalid estimate (lower: {lower}, mean: {mean}, upper: {upper}): {reason}")]
    InvalidEstimate {
        lower: f64,
        mean: f64,
        upper: f64,
        reason: String,
    },

    /// Total budget is not a positive finite number
    #[error("Invalid budget: {0} (must be positive and finite)")]
    InvalidBudget(f64),

    /// A sampled metric would make the funnel arithmetic undefined
    #[error("Invalid sample for {channel} {metric}: {value}")]
    InvalidSample {
        channel: Channel,
        metric: Metric,
        value: f64,
    },

    /// Constraint, saturation parameter or allocation references a channel with no data
    #[error("Missing data for channel {channel}: {context}")]
    MissingChannelData { channel: Channel, context: String },

    /// Minimum-spend fraction outside [0, 1]
    #[error("Invalid constraint for {channel}: {fraction} (must be within [0, 1])")]
    InvalidConstraint { channel: Channel, fraction: f64 },

    /// Saturation curve with non-positive ceiling or half-saturation point
    #[error("Invalid saturation params for {channel} (max_conv: {max_conv}, K: {k})")]
    InvalidSaturation {
        channel: Channel,
        max_conv: f64,
        k: f64,
    },

    /// Priors contain no channels
    #[error("No channels in priors")]
    NoChannels,

    /// Optimizer settings that cannot produce a result
    #[error("Invalid optimizer config: {0}")]
    InvalidConfig(String),
}

impl OptimizerError {
    /// Create an invalid-estimate error
    pub fn invalid_estimate(lower: f64, mean: f64, upper: f64, reason: impl Into<String>) -> Self {
        OptimizerError::InvalidEstimate {
            lower,
            mean,
            upper,
            reason: reason.into(),
        }
    }

    /// Create a missing-channel error
    pub fn missing_channel(channel: Channel, context: impl Into<String>) -> Self {
        OptimizerError::MissingChannelData {
            channel,
            context: context.into(),
        }
    }

    /// Create a config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        OptimizerError::InvalidConfig(msg.into())
    }

    /// Classification for the calling layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OptimizerError::InvalidEstimate { .. } => ErrorKind::InvalidEstimate,
            OptimizerError::InvalidBudget(_) => ErrorKind::InvalidBudget,
            OptimizerError::InvalidSample { .. } => ErrorKind::InvalidSample,
            OptimizerError::MissingChannelData { .. } => ErrorKind::MissingChannelData,
            OptimizerError::InvalidConstraint { .. } => ErrorKind::InvalidConstraint,
            OptimizerError::InvalidSaturation { .. } => ErrorKind::InvalidSaturation,
            OptimizerError::NoChannels => ErrorKind::NoChannels,
            OptimizerError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

/// Errors from turning collaborator text into typed priors.
#[derive(Error, Debug, Clone)]
pub enum PriorsError {
    #[error("No JSON object found in text")]
    NoJsonObject,
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Priors failed validation: {0}")]
    Validation(#[from] OptimizerError),
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Unknown goal: {0}")]
    UnknownGoal(String),
}

impl PriorsError {
    /// Create a JSON parse error
    pub fn json(msg: impl Into<String>) -> Self {
        PriorsError::Json(msg.into())
    }
}

/// Service-level error: acquisition, parsing or optimization.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
    #[error("Priors error: {0}")]
    Priors(#[from] PriorsError),
    #[error("Priors source failed after {attempts} attempts: {last_error}")]
    AcquisitionFailed { attempts: u32, last_error: String },
    #[error("Priors source error: {0}")]
    Source(String),
}

impl ServiceError {
    /// Stable code for the failure, distinguishing every optimizer kind.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Optimizer(e) => e.kind().code(),
            ServiceError::Priors(PriorsError::Validation(e)) => e.kind().code(),
            ServiceError::Priors(PriorsError::UnknownChannel(_)) => "unknown_channel",
            ServiceError::Priors(PriorsError::UnknownGoal(_)) => "unknown_goal",
            ServiceError::Priors(_) => "malformed_priors",
            ServiceError::AcquisitionFailed { .. } => "acquisition_failed",
            ServiceError::Source(_) => "source_error",
        }
    }
}
