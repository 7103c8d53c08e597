//! Bounded in-memory cache of acquired priors.
//!
//! Keyed by `(company, budget, goal)`. Entries expire after a TTL and the
//! cache is capped by entry count, so a long-running service never grows
//! without bound.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use super::priors::PriorsResponse;
use super::source::{Goal, PriorsQuery};

/// Cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached priors sets.
    /// Default: 256
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Seconds an entry lives after insertion.
    /// Default: 3600
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_entries() -> u64 {
    256
}
fn default_ttl_secs() -> u64 {
    3600
}

/// Identity of a priors request.
///
/// The budget is keyed by its bit pattern, so `5000.0` and `5000.000001` are
/// distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    company: String,
    budget_bits: u64,
    goal: Goal,
}

impl CacheKey {
    pub fn new(company: impl Into<String>, budget: f64, goal: Goal) -> Self {
        Self {
            company: company.into(),
            budget_bits: budget.to_bits(),
            goal,
        }
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn budget(&self) -> f64 {
        f64::from_bits(self.budget_bits)
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }
}

impl From<&PriorsQuery> for CacheKey {
    fn from(query: &PriorsQuery) -> Self {
        Self::new(query.company.clone(), query.monthly_budget, query.goal)
    }
}

/// Everything kept from one successful acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPriors {
    pub response: PriorsResponse,
    /// URLs found in the answer text
    pub citations: Vec<String>,
    /// URLs the source reported as grounding
    pub grounding_urls: Vec<String>,
}

/// Priors cache owned by the service.
#[derive(Clone)]
pub struct PriorsCache {
    cache: Cache<CacheKey, Arc<CachedPriors>>,
}

impl PriorsCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self { cache }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedPriors>> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: CacheKey, priors: Arc<CachedPriors>) {
        self.cache.insert(key, priors);
    }

    /// Drop one entry. Other keys are untouched.
    pub fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }

    /// Approximate entry count; pending maintenance may lag behind.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn sync(&self) {
        self.cache.run_pending_tasks();
    }
}

impl std::fmt::Debug for PriorsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorsCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl Default for PriorsCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
