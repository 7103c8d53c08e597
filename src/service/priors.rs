//! Parsing collaborator free text into typed priors.
//!
//! The expected answer is one JSON-like object
//!
//! ```text
//! {"channel": {"google": {"CVR": {...}, "CPM": {...}, "CTR": {...}}, ...}, "reasoning": "..."}
//! ```
//!
//! followed by a numbered sources list. Generated JSON is often sloppy
//! (single quotes, bare keys, trailing commas, comments), so the object is
//! read as JSON5.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::PriorsError;
use crate::types::{BoundedEstimate, Channel, ChannelPriors, PerformancePriors};

/// Outermost `{...}` span: first opening brace to last closing brace.
static RE_JSON_BLOCK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());
/// Bracketed citation marker, e.g. `[3]`.
static RE_CITATION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").ok());
static RE_URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"https?://\S+").ok());

/// Priors plus the collaborator's explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorsResponse {
    pub priors: PerformancePriors,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    channel: BTreeMap<String, WireChannel>,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    #[serde(rename = "CVR")]
    cvr: WireEstimate,
    #[serde(rename = "CPM")]
    cpm: WireEstimate,
    #[serde(rename = "CTR")]
    ctr: WireEstimate,
}

#[derive(Debug, Deserialize)]
struct WireEstimate {
    lower: f64,
    upper: f64,
    mean: f64,
}

impl WireEstimate {
    fn into_estimate(self) -> Result<BoundedEstimate, PriorsError> {
        Ok(BoundedEstimate::new(self.lower, self.upper, self.mean)?)
    }
}

impl WireChannel {
    fn into_priors(self) -> Result<ChannelPriors, PriorsError> {
        Ok(ChannelPriors {
            cvr: self.cvr.into_estimate()?,
            cpm: self.cpm.into_estimate()?,
            ctr: self.ctr.into_estimate()?,
        })
    }
}

/// Extract and validate the priors object embedded in `text`.
pub fn parse_priors_response(text: &str) -> Result<PriorsResponse, PriorsError> {
    let block = extract_json_block(text).ok_or(PriorsError::NoJsonObject)?;
    let wire: WireResponse =
        json5::from_str(block).map_err(|e| PriorsError::json(e.to_string()))?;

    let mut channels = BTreeMap::new();
    for (name, channel_priors) in wire.channel {
        let channel: Channel = name.parse()?;
        channels.insert(channel, channel_priors.into_priors()?);
    }

    Ok(PriorsResponse {
        priors: PerformancePriors::new(channels)?,
        reasoning: wire.reasoning,
    })
}

fn extract_json_block(text: &str) -> Option<&str> {
    let re = RE_JSON_BLOCK.as_ref()?;
    re.find(text).map(|m| m.as_str())
}

/// Numbers cited in the text as `[n]`, in order of appearance.
pub fn extract_citation_numbers(text: &str) -> Vec<u32> {
    let Some(re) = RE_CITATION.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|s| s.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Every `http(s)://` URL in the text, in order of appearance.
pub fn extract_source_urls(text: &str) -> Vec<String> {
    let Some(re) = RE_URL.as_ref() else {
        return Vec::new();
    };
    re.find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ')', ']', '"', '\''])
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OptimizerError;

    const ANSWER: &str = r#"Here is the recommended split.

{
    "channel": {
        "google": {'CVR' : {'lower': 0.03, 'upper': 0.06, 'mean': 0.045}, 'CPM' : {'lower': 20, 'upper': 40, 'mean': 30}, 'CTR' : {'lower': 0.02, 'upper': 0.05, 'mean': 0.035}},
        "linkedin": {'CVR' : {'lower': 0.02, 'upper': 0.08, 'mean': 0.05}, 'CPM' : {'lower': 30, 'upper': 80, 'mean': 50}, 'CTR' : {'lower': 0.004, 'upper': 0.01, 'mean': 0.006},},
    },
    "reasoning": "LinkedIn performs well for B2B lead generation [2]. Google's intent signal is strong [1].",
}

**Sources**
[1] https://example.com/google-benchmarks.
[2] https://example.org/linkedin-b2b
"#;

    #[test]
    fn test_parses_loose_answer() {
        let parsed = parse_priors_response(ANSWER).unwrap();
        assert_eq!(parsed.priors.len(), 2);
        let google = parsed.priors.get(Channel::Google).unwrap();
        assert_eq!(google.cpm.mean(), 30.0);
        assert_eq!(google.ctr.upper(), 0.05);
        assert!(parsed.reasoning.contains("Google's intent"));
    }

    #[test]
    fn test_strict_json_passes_through() {
        let text = r#"{"channel": {"meta": {"CVR": {"lower": 0.01, "upper": 0.04, "mean": 0.025},
            "CPM": {"lower": 7, "upper": 15, "mean": 11},
            "CTR": {"lower": 0.008, "upper": 0.015, "mean": 0.011}}}}"#;
        let parsed = parse_priors_response(text).unwrap();
        assert!(parsed.priors.contains(Channel::Meta));
        assert_eq!(parsed.reasoning, "");
    }

    #[test]
    fn test_json5_relaxations_accepted() {
        let text = r#"{
            channel: {
                // typical B2C benchmarks
                meta: {
                    CVR: {lower: .01, upper: .04, mean: +.025},
                    CPM: {lower: 7, upper: 15, mean: 11,},
                    CTR: {lower: 0.008, upper: 0.015, mean: 0.011},
                },
            },
            reasoning: 'Cheap reach \
across feeds',
        }"#;
        let parsed = parse_priors_response(text).unwrap();
        let meta = parsed.priors.get(Channel::Meta).unwrap();
        assert_eq!(meta.cvr.lower(), 0.01);
        assert_eq!(meta.cvr.mean(), 0.025);
        assert!(parsed.reasoning.starts_with("Cheap reach"));
    }

    #[test]
    fn test_no_object_rejected() {
        assert!(matches!(
            parse_priors_response("I could not find any data."),
            Err(PriorsError::NoJsonObject)
        ));
    }

    #[test]
    fn test_garbage_object_rejected() {
        assert!(matches!(
            parse_priors_response("{ not even close }"),
            Err(PriorsError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_channel_rejected() {
        let text = r#"{"channel": {"snapchat": {"CVR": {"lower": 0.01, "upper": 0.04, "mean": 0.025},
            "CPM": {"lower": 7, "upper": 15, "mean": 11},
            "CTR": {"lower": 0.008, "upper": 0.015, "mean": 0.011}}}}"#;
        assert!(matches!(
            parse_priors_response(text),
            Err(PriorsError::UnknownChannel(name)) if name == "snapchat"
        ));
    }

    #[test]
    fn test_invalid_estimate_surfaces_as_validation() {
        let text = r#"{"channel": {"tiktok": {"CVR": {"lower": 0.05, "upper": 0.01, "mean": 0.02},
            "CPM": {"lower": 5, "upper": 12, "mean": 9},
            "CTR": {"lower": 0.008, "upper": 0.02, "mean": 0.012}}}}"#;
        assert!(matches!(
            parse_priors_response(text),
            Err(PriorsError::Validation(OptimizerError::InvalidEstimate { .. }))
        ));
    }

    #[test]
    fn test_empty_channel_map_rejected() {
        assert!(matches!(
            parse_priors_response(r#"{"channel": {}}"#),
            Err(PriorsError::Validation(OptimizerError::NoChannels))
        ));
    }

    #[test]
    fn test_citation_numbers() {
        assert_eq!(extract_citation_numbers(ANSWER), vec![2, 1, 1, 2]);
        assert_eq!(extract_citation_numbers("see [note] and [3a] and [7]"), vec![7]);
    }

    #[test]
    fn test_source_urls() {
        assert_eq!(
            extract_source_urls(ANSWER),
            vec![
                "https://example.com/google-benchmarks".to_string(),
                "https://example.org/linkedin-b2b".to_string(),
            ]
        );
        assert!(extract_source_urls("no links here").is_empty());
    }

    #[test]
    fn test_patterns_compile() {
        assert!(RE_JSON_BLOCK.is_some());
        assert!(RE_CITATION.is_some());
        assert!(RE_URL.is_some());
    }
}
