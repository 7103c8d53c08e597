//! External priors source seam and bounded retries.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{PriorsError, ServiceError};

/// Marketing objective the priors are elicited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    GenerateLeads,
    BrandAwareness,
    IncreaseSales,
    WebsiteTraffic,
}

impl Goal {
    pub const ALL: [Goal; 4] = [
        Goal::GenerateLeads,
        Goal::BrandAwareness,
        Goal::IncreaseSales,
        Goal::WebsiteTraffic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::GenerateLeads => "generate_leads",
            Goal::BrandAwareness => "brand_awareness",
            Goal::IncreaseSales => "increase_sales",
            Goal::WebsiteTraffic => "website_traffic",
        }
    }

    /// Long-form objective handed to the knowledge source.
    pub fn description(&self) -> &'static str {
        match self {
            Goal::GenerateLeads => {
                "Attract and capture potential customers through targeted ads, landing pages, \
                 gated content, and lead magnets to grow the customer base."
            }
            Goal::BrandAwareness => {
                "Increase recognition and visibility of the brand using social media, \
                 influencer partnerships, PR, and content marketing."
            }
            Goal::IncreaseSales => {
                "Boost revenue through promotional offers, retargeting ads, upselling, \
                 cross-selling, and optimized sales funnels."
            }
            Goal::WebsiteTraffic => {
                "Drive more visitors to the website using SEO, paid search, content marketing, \
                 and social media campaigns."
            }
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Goal {
    type Err = PriorsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Goal::ALL
            .into_iter()
            .find(|g| g.as_str() == normalized)
            .ok_or(PriorsError::UnknownGoal(normalized))
    }
}

/// What the priors are requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorsQuery {
    pub company: String,
    pub monthly_budget: f64,
    pub goal: Goal,
}

impl PriorsQuery {
    pub fn new(company: impl Into<String>, monthly_budget: f64, goal: Goal) -> Self {
        Self {
            company: company.into(),
            monthly_budget,
            goal,
        }
    }

    /// User-facing request text for the knowledge source.
    pub fn prompt(&self) -> String {
        format!(
            "Please help me find the budget for Company: {} , with monthly_budget: {} \
             who want to optimize for marketing_goal : {}",
            self.company,
            self.monthly_budget,
            self.goal.description()
        )
    }
}

/// Raw answer from a priors source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceResponse {
    /// Free text holding the priors object and a trailing sources list
    pub text: String,
    /// URLs the source reports having grounded its answer on
    pub grounding_urls: Vec<String>,
}

/// External knowledge source for channel priors.
///
/// Implementations are blocking; callers pick the thread.
pub trait PriorsSource: Send + Sync {
    fn fetch(&self, query: &PriorsQuery) -> Result<SourceResponse, ServiceError>;
}

impl<S: PriorsSource + ?Sized> PriorsSource for Box<S> {
    fn fetch(&self, query: &PriorsQuery) -> Result<SourceResponse, ServiceError> {
        (**self).fetch(query)
    }
}

/// Retry policy for priors acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    /// Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff in milliseconds, doubling per retry (0 = no wait).
    /// Default: 0
    #[serde(default)]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

impl RetryConfig {
    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }
}

/// Run `op` until it succeeds or the attempts run out.
///
/// `op` receives the zero-based attempt number. The final failure is reported
/// as [`ServiceError::AcquisitionFailed`].
pub fn with_retries<T, F>(config: &RetryConfig, mut op: F) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Result<T, ServiceError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_error = e.to_string();
                if attempt + 1 < max_attempts {
                    let backoff = config.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Priors acquisition failed, retrying"
                    );
                    if !backoff.is_zero() {
                        std::thread::sleep(backoff);
                    }
                }
            }
        }
    }

    warn!(attempts = max_attempts, error = %last_error, "Priors acquisition exhausted retries");
    Err(ServiceError::AcquisitionFailed {
        attempts: max_attempts,
        last_error,
    })
}
