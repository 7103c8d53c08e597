//! Strongly typed inputs and outputs of the optimizer.
//!
//! Every invariant on priors, constraints and saturation parameters is enforced
//! when the value is constructed (or deserialized), so the algorithms downstream
//! never re-check them.

mod channel;
mod estimate;
mod priors;
mod results;

pub use channel::*;
pub use estimate::*;
pub use priors::*;
pub use results::*;
