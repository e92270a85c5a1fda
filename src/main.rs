//! Oracle Consensus - one-shot aggregation from the command line
//!
//! Usage: oracle-consensus <category> <sources> [key=value ...] [--method <method>]

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use oracle_consensus::config::{AppConfig, LoggingConfig};
use oracle_consensus::{CollectRequest, ConsensusMethod, OracleAggregator};

#[derive(Parser)]
#[command(name = "oracle-consensus")]
#[command(about = "Aggregate one value from several oracle data sources")]
struct Cli {
    /// Data category (price_feed, weather, space)
    category: String,

    /// Comma-separated source names (e.g. chainlink,coinbase)
    sources: String,

    /// Category parameters as key=value (symbol=ETH/USD, city=London, type=apod)
    params: Vec<String>,

    /// Consensus method (majority_vote, weighted_average, median, ai_consensus)
    #[arg(short, long)]
    method: Option<ConsensusMethod>,
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the JSON result
    if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    }
}

fn parse_params(raw: &[String]) -> Result<serde_json::Map<String, Value>> {
    let mut params = serde_json::Map::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("parameter {:?} is not key=value", pair);
        };
        if key.trim().is_empty() {
            bail!("parameter {:?} has an empty key", pair);
        }
        params.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(params)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    init_logging(&config.logging);
    info!(config = %config, "configuration loaded");

    let aggregator =
        OracleAggregator::from_config(&config).context("Failed to build oracle aggregator")?;

    let request = CollectRequest {
        category: cli.category,
        source_names: cli
            .sources
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        parameters: parse_params(&cli.params)?,
        method: cli.method,
    };

    // Ctrl-C drops the in-flight request and every adapter call with it
    let outcome = tokio::select! {
        outcome = aggregator.collect_data(request) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, request abandoned");
            std::process::exit(130);
        }
    };

    match outcome {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure)?);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let raw = vec!["symbol=ETH/USD".to_string(), "lat = 51.5".to_string()];
        let params = parse_params(&raw).unwrap();
        assert_eq!(params["symbol"], "ETH/USD");
        assert_eq!(params["lat"], "51.5");

        assert!(parse_params(&["symbol".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_method() {
        let cli = Cli::try_parse_from([
            "oracle-consensus",
            "price_feed",
            "chainlink,coinbase",
            "symbol=ETH/USD",
            "--method",
            "median",
        ])
        .unwrap();
        assert_eq!(cli.method, Some(ConsensusMethod::Median));
        assert_eq!(cli.params, vec!["symbol=ETH/USD"]);
    }
}
