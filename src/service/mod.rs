//! Request-facing layer around the optimizer.
//!
//! - **source**: the external priors source seam, goals and retries
//! - **priors**: tolerant parsing of collaborator answers
//! - **cache**: bounded TTL cache of acquired priors
//! - **handler**: request → priors → optimizer → response

mod cache;
mod handler;
mod priors;
mod source;

pub use cache::{CacheConfig, CacheKey, CachedPriors, PriorsCache};
pub use handler::{parse_constraints, AllocationRequest, AllocationResponse, AllocationService};
pub use priors::{extract_citation_numbers, extract_source_urls, parse_priors_response, PriorsResponse};
pub use source::{with_retries, Goal, PriorsQuery, PriorsSource, RetryConfig, SourceResponse};
