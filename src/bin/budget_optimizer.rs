//! Channel budget optimizer CLI.
//!
//! - Reads channel priors from a file (collaborator free text or plain JSON)
//! - Optimizes the budget split and simulates conversion uncertainty
//! - TOML config file support with CLI overrides
//! - Structured logging with tracing

use std::collections::BTreeMap;
use std::path::Path;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use budget_optimizer::service::{
    extract_source_urls, parse_constraints, parse_priors_response, AllocationResponse,
    CacheConfig, CachedPriors, PriorsResponse, RetryConfig,
};
use budget_optimizer::{BudgetOptimizer, OptimizerConfig, PerformancePriors};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "budget_optimizer")]
#[command(version, about = "Monte Carlo advertising budget optimizer", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "budget_optimizer.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate a budget from a priors file
    Run {
        /// Priors file: collaborator answer text or a JSON channel map
        #[arg(short, long)]
        priors: String,

        /// Total budget in dollars
        #[arg(short, long)]
        budget: f64,

        /// Minimum budget fraction, e.g. `linkedin=0.2` (repeatable)
        #[arg(long = "constraint", value_name = "CHANNEL=FRACTION")]
        constraints: Vec<String>,

        /// Base seed (overrides config; 0 = entropy)
        #[arg(long)]
        seed: Option<u64>,

        /// Run trial batches on the thread pool
        #[arg(long)]
        parallel: bool,

        /// Write the JSON result here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "budget_optimizer.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: pretty, json, compact
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::GenerateConfig { output } = &cli.command {
        generate_sample_config(output)?;
        return Ok(());
    }

    let config = load_config(&cli)?;
    setup_logging(&config, &cli);

    match &cli.command {
        Commands::ValidateConfig => {
            BudgetOptimizer::new(config.optimizer.clone())?;
            println!("Configuration is valid:\n{:#?}", config);
        }
        Commands::Run {
            priors,
            budget,
            constraints,
            seed,
            parallel,
            output,
        } => {
            let mut optimizer_config = config.optimizer.clone();
            optimizer_config.parallel |= *parallel;
            if let Some(seed) = seed {
                optimizer_config.random_seed = *seed;
            }
            let optimizer = BudgetOptimizer::new(optimizer_config)?;

            let text = std::fs::read_to_string(priors)?;
            let cached = load_priors(&text)?;
            let constraints = parse_constraints(&parse_constraint_args(constraints)?)?;

            let report = optimizer.run_detailed(&cached.response.priors, *budget, &constraints)?;
            info!(seed = report.seed, "Re-run with --seed to reproduce");

            let response = AllocationResponse::new(&cached, report.summary, report.allocation);
            let json = serde_json::to_string_pretty(&response)?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    info!(path = %path, "Result written");
                }
                None => println!("{}", json),
            }
        }
        Commands::GenerateConfig { .. } => {}
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config_path = &cli.config;
    if Path::new(config_path).exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    } else {
        // Return default config if file doesn't exist
        Ok(AppConfig::default())
    }
}

fn setup_logging(config: &AppConfig, cli: &Cli) {
    let level = cli.log_level.as_ref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let format = cli
        .log_format
        .as_deref()
        .unwrap_or(match config.logging.format {
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
        });

    // Logs go to stderr so stdout stays clean JSON
    match format {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
    }
}

/// Plain JSON channel map or collaborator answer text.
///
/// A JSON object without a `channel` key is a bare channel map, and its
/// validation errors are reported as-is.
fn load_priors(text: &str) -> Result<CachedPriors, Box<dyn std::error::Error>> {
    let response = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) if !map.contains_key("channel") => {
            let priors: PerformancePriors =
                serde_json::from_value(serde_json::Value::Object(map))?;
            PriorsResponse {
                priors,
                reasoning: String::new(),
            }
        }
        _ => parse_priors_response(text)?,
    };
    Ok(CachedPriors {
        response,
        citations: extract_source_urls(text),
        grounding_urls: Vec::new(),
    })
}

fn parse_constraint_args(args: &[String]) -> Result<BTreeMap<String, f64>, Box<dyn std::error::Error>> {
    let mut parsed = BTreeMap::new();
    for arg in args {
        let (channel, fraction) = arg
            .split_once('=')
            .ok_or_else(|| format!("Invalid constraint '{}'. Use: channel=fraction", arg))?;
        let fraction: f64 = fraction
            .trim()
            .parse()
            .map_err(|e| format!("Invalid fraction in '{}': {}", arg, e))?;
        parsed.insert(channel.trim().to_string(), fraction);
    }
    Ok(parsed)
}

fn generate_sample_config(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sample = AppConfig::default();
    let content = toml::to_string_pretty(&sample)?;

    let with_comments = format!(
        r#"# Budget Optimizer Configuration
# See: cargo run --bin budget_optimizer -- --help
#
# optimizer.random_seed = 0 draws a fresh seed per run; the seed used is logged.
# optimizer.saturation holds operator-tuned response curves:
#   conversions = max_conv * spend / (spend + K)

{}
"#,
        content
    );

    std::fs::write(path, with_comments)?;
    println!("Sample config written to: {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use budget_optimizer::Channel;

    #[test]
    fn test_load_plain_channel_map() {
        let text = r#"{"meta": {"CVR": {"lower": 0.01, "upper": 0.04, "mean": 0.025},
            "CPM": {"lower": 7, "upper": 15, "mean": 11},
            "CTR": {"lower": 0.008, "upper": 0.015, "mean": 0.011}}}"#;
        let cached = load_priors(text).unwrap();
        assert!(cached.response.priors.contains(Channel::Meta));
        assert!(cached.response.reasoning.is_empty());
    }

    #[test]
    fn test_plain_map_validation_error_kept() {
        let text = r#"{"google": {"CVR": {"lower": 0.03, "upper": 0.06, "mean": 0.045},
            "CPM": {"lower": 40, "upper": 20, "mean": 30},
            "CTR": {"lower": 0.02, "upper": 0.05, "mean": 0.035}}}"#;
        let err = load_priors(text).unwrap_err().to_string();
        assert!(err.contains("upper < lower"), "{}", err);
    }

    #[test]
    fn test_load_collaborator_answer() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/sample_priors.txt");
        let text = std::fs::read_to_string(path).unwrap();
        let cached = load_priors(&text).unwrap();
        assert_eq!(cached.response.priors.len(), 4);
        assert!(cached.response.reasoning.contains("high-intent"));
        assert_eq!(cached.citations.len(), 3);
    }
}
