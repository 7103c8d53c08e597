/// Floating-point guard for sums and divisions.
pub const EPSILON: f64 = 1e-12;

/// Trials per Monte Carlo stage in the reference configuration.
pub const DEFAULT_SIMULATIONS: usize = 5000;

/// Standard deviation of the saturation-stage noise, as a fraction of the point estimate.
pub const DEFAULT_NOISE_FRACTION: f64 = 0.05;

/// Trials per RNG stream in the saturation stage.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// CPM is priced per thousand impressions.
pub const IMPRESSIONS_PER_CPM: f64 = 1000.0;

/// Lower uncertainty band reported for conversions.
pub const LOWER_PERCENTILE: f64 = 0.10;

/// Upper uncertainty band reported for conversions.
pub const UPPER_PERCENTILE: f64 = 0.90;
