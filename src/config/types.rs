//! Configuration section types

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::types::ConsensusMethod;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Method used when a request does not name one
    pub default_method: ConsensusMethod,
    /// Upper bound on one persistence submit in milliseconds
    pub persistence_timeout_ms: u64,
}

impl EngineConfig {
    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Per-request HTTP timeout shared by all adapters
    pub request_timeout_ms: u64,
    pub chainlink: ChainlinkConfig,
    pub coinbase: EndpointConfig,
    pub openweather: KeyedEndpointConfig,
    pub open_meteo: EndpointConfig,
    pub nasa: KeyedEndpointConfig,
}

impl SourcesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainlinkConfig {
    /// Ethereum JSON-RPC endpoint
    pub rpc_url: String,
    /// Extra pair -> aggregator address entries, merged over the mainnet defaults
    #[serde(default)]
    pub feeds: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyedEndpointConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Enable the CSV ledger sink
    pub enabled: bool,
    /// Data directory
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}
