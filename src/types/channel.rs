//! Advertising channel and funnel metric identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PriorsError;

/// Advertising channel.
///
/// Ordering follows declaration order, which keeps every per-channel map
/// iterating deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Google,
    LinkedIn,
    Meta,
    TikTok,
}

impl Channel {
    /// All supported channels, in order.
    pub const ALL: [Channel; 4] = [
        Channel::Google,
        Channel::LinkedIn,
        Channel::Meta,
        Channel::TikTok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Google => "google",
            Channel::LinkedIn => "linkedin",
            Channel::Meta => "meta",
            Channel::TikTok => "tiktok",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = PriorsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Channel::Google),
            "linkedin" => Ok(Channel::LinkedIn),
            "meta" => Ok(Channel::Meta),
            "tiktok" => Ok(Channel::TikTok),
            other => Err(PriorsError::UnknownChannel(other.to_string())),
        }
    }
}

/// Funnel metric carried by a channel's priors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Conversion rate (conversions per click)
    #[serde(rename = "CVR")]
    Cvr,
    /// Cost per thousand impressions
    #[serde(rename = "CPM")]
    Cpm,
    /// Click-through rate (clicks per impression)
    #[serde(rename = "CTR")]
    Ctr,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Cvr => "CVR",
            Metric::Cpm => "CPM",
            Metric::Ctr => "CTR",
        })
    }
}
