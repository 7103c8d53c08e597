//! Allocation request handling: acquire priors, optimize, assemble the answer.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::{CacheConfig, CacheKey, CachedPriors, PriorsCache};
use super::priors::{extract_citation_numbers, extract_source_urls, parse_priors_response};
use super::source::{with_retries, Goal, PriorsQuery, PriorsSource, RetryConfig};
use crate::errors::{OptimizerError, ServiceError};
use crate::optimizer::{BudgetOptimizer, OptimizerConfig};
use crate::types::{AllocationResult, Channel, Constraints, ConversionSummary};

/// Suffix on request constraint keys, e.g. `linkedin_min`.
const MIN_SUFFIX: &str = "_min";

/// Incoming allocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub company_name: String,
    pub monthly_budget: f64,
    pub primary_goal: Goal,
    /// Minimum budget fractions keyed `<channel>_min`
    #[serde(default)]
    pub constraints: BTreeMap<String, f64>,
}

/// Answer to an allocation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResponse {
    pub allocation: AllocationResult,
    pub confidence_intervals: ConversionSummary,
    pub explanation: String,
    pub citations: Vec<String>,
    /// Grounding URLs not already present in `citations`
    pub additional_info: Vec<String>,
}

impl AllocationResponse {
    pub fn new(
        priors: &CachedPriors,
        summary: ConversionSummary,
        allocation: AllocationResult,
    ) -> Self {
        let cited: BTreeSet<&str> = priors.citations.iter().map(String::as_str).collect();
        let additional_info: BTreeSet<String> = priors
            .grounding_urls
            .iter()
            .filter(|url| !cited.contains(url.as_str()))
            .cloned()
            .collect();

        Self {
            allocation,
            confidence_intervals: summary,
            explanation: priors.response.reasoning.clone(),
            citations: priors.citations.clone(),
            additional_info: additional_info.into_iter().collect(),
        }
    }
}

/// Parse `<channel>_min` keyed fractions into typed constraints.
///
/// Keys without the suffix are read as bare channel names.
pub fn parse_constraints(raw: &BTreeMap<String, f64>) -> Result<Constraints, ServiceError> {
    let mut constraints = Constraints::none();
    for (key, &fraction) in raw {
        let name = key.strip_suffix(MIN_SUFFIX).unwrap_or(key);
        let channel: Channel = name.parse()?;
        constraints = constraints.with_min(channel, fraction)?;
    }
    Ok(constraints)
}

/// Allocation service: priors source, priors cache and optimizer.
pub struct AllocationService<S> {
    optimizer: BudgetOptimizer,
    cache: PriorsCache,
    retry: RetryConfig,
    source: S,
}

impl<S: PriorsSource> AllocationService<S> {
    pub fn new(
        optimizer: OptimizerConfig,
        cache: &CacheConfig,
        retry: RetryConfig,
        source: S,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            optimizer: BudgetOptimizer::new(optimizer)?,
            cache: PriorsCache::new(cache),
            retry,
            source,
        })
    }

    pub fn cache(&self) -> &PriorsCache {
        &self.cache
    }

    pub fn optimizer(&self) -> &BudgetOptimizer {
        &self.optimizer
    }

    /// Handle one request.
    ///
    /// The budget is checked before any priors are acquired. A cached priors
    /// set that fails to optimize is evicted so the next request re-acquires it.
    pub fn allocate(&self, request: &AllocationRequest) -> Result<AllocationResponse, ServiceError> {
        let budget = request.monthly_budget;
        if !(budget > 0.0 && budget.is_finite()) {
            return Err(OptimizerError::InvalidBudget(budget).into());
        }
        let constraints = parse_constraints(&request.constraints)?;
        let query = PriorsQuery::new(
            request.company_name.clone(),
            request.monthly_budget,
            request.primary_goal,
        );
        let key = CacheKey::from(&query);
        let priors = self.priors_for(&key, &query)?;

        match self
            .optimizer
            .run(&priors.response.priors, request.monthly_budget, &constraints)
        {
            Ok((summary, allocation)) => {
                info!(
                    company = %request.company_name,
                    goal = %request.primary_goal,
                    budget = request.monthly_budget,
                    expected_conversions = summary.total.mean,
                    "Allocation served"
                );
                Ok(AllocationResponse::new(&priors, summary, allocation))
            }
            Err(e) => {
                warn!(
                    company = %request.company_name,
                    goal = %request.primary_goal,
                    error = %e,
                    "Optimization failed, evicting cached priors"
                );
                self.cache.invalidate(&key);
                Err(e.into())
            }
        }
    }

    fn priors_for(
        &self,
        key: &CacheKey,
        query: &PriorsQuery,
    ) -> Result<Arc<CachedPriors>, ServiceError> {
        if let Some(hit) = self.cache.get(key) {
            debug!(company = %query.company, goal = %query.goal, "Using cached priors");
            return Ok(hit);
        }

        let fetched = Arc::new(with_retries(&self.retry, |_| self.acquire(query))?);
        self.cache.insert(key.clone(), Arc::clone(&fetched));
        debug!(
            company = %query.company,
            goal = %query.goal,
            channels = fetched.response.priors.len(),
            "Fetched new priors"
        );
        Ok(fetched)
    }

    /// One fetch-and-parse attempt.
    fn acquire(&self, query: &PriorsQuery) -> Result<CachedPriors, ServiceError> {
        let answer = self.source.fetch(query)?;
        let response = parse_priors_response(&answer.text)?;
        let citations = extract_source_urls(&answer.text);
        debug!(
            markers = extract_citation_numbers(&response.reasoning).len(),
            urls = citations.len(),
            "Parsed priors answer"
        );
        Ok(CachedPriors {
            response,
            citations,
            grounding_urls: answer.grounding_urls,
        })
    }
}
