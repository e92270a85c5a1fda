//! Configuration management for the oracle engine
//!
//! Loads built-in defaults, optional `config/default` and `config/local`
//! files, then environment variables (`ORACLE__SECTION__KEY`) via .env

mod types;

pub use types::*;

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

use crate::oracle::sources::{
    COINBASE_API_URL, NASA_API_URL, OPENWEATHER_API_URL, OPEN_METEO_API_URL,
};

pub const DEFAULT_ETH_RPC_URL: &str = "https://ethereum-rpc.publicnode.com";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub sources: SourcesConfig,
    /// Source name -> trust weight overrides
    #[serde(default)]
    pub reliability: HashMap<String, f64>,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (ORACLE__*)
            .add_source(Environment::with_prefix("ORACLE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            // Engine defaults
            .set_default("engine.default_method", "weighted_average")?
            .set_default("engine.persistence_timeout_ms", 5000)?
            // Source defaults
            .set_default("sources.request_timeout_ms", 10_000)?
            .set_default("sources.chainlink.rpc_url", DEFAULT_ETH_RPC_URL)?
            .set_default("sources.coinbase.base_url", COINBASE_API_URL)?
            .set_default("sources.openweather.base_url", OPENWEATHER_API_URL)?
            .set_default("sources.open_meteo.base_url", OPEN_METEO_API_URL)?
            .set_default("sources.nasa.base_url", NASA_API_URL)?
            // Persistence defaults
            .set_default("persistence.enabled", true)?
            .set_default("persistence.data_dir", "./data")?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "method={} timeout_ms={} openweather_key={} nasa_key={} reliability_overrides={} persistence={} data_dir={}",
            self.engine.default_method,
            self.sources.request_timeout_ms,
            self.sources.openweather.api_key.is_some(),
            self.sources.nasa.api_key.is_some(),
            self.reliability.len(),
            self.persistence.enabled,
            self.persistence.data_dir
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConsensusMethod;

    fn defaults_only() -> AppConfig {
        AppConfig::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_deserialize() {
        let config = defaults_only();
        assert_eq!(config.engine.default_method, ConsensusMethod::WeightedAverage);
        assert_eq!(config.engine.persistence_timeout().as_millis(), 5000);
        assert_eq!(config.sources.coinbase.base_url, COINBASE_API_URL);
        assert!(config.sources.openweather.api_key.is_none());
        assert!(config.sources.chainlink.feeds.is_empty());
        assert!(config.reliability.is_empty());
        assert!(config.persistence.enabled);
    }

    #[test]
    fn test_overrides_layer_on_defaults() {
        let config: AppConfig = AppConfig::defaults()
            .unwrap()
            .set_override("engine.default_method", "median")
            .unwrap()
            .set_override("reliability.coinbase", 0.4)
            .unwrap()
            .set_override("sources.nasa.api_key", "secret-key")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.engine.default_method, ConsensusMethod::Median);
        assert_eq!(config.reliability.get("coinbase"), Some(&0.4));
        assert!(!config.digest().contains("secret-key"));
        assert!(config.digest().contains("nasa_key=true"));
    }
}
