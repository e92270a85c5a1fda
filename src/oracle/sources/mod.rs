//! Source adapters (Chainlink, Coinbase, OpenWeather, Open-Meteo, NASA)

pub(crate) mod chainlink;
mod coinbase;
mod nasa;
mod open_meteo;
mod openweather;

pub use chainlink::ChainlinkAdapter;
pub use coinbase::{CoinbaseAdapter, COINBASE_API_URL};
pub use nasa::{NasaAdapter, NASA_API_URL};
pub use open_meteo::{OpenMeteoAdapter, OPEN_METEO_API_URL};
pub use openweather::{OpenWeatherAdapter, OPENWEATHER_API_URL};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::types::{DataCategory, SpaceQuery, SourceId};

/// Parameters for one adapter call, reduced to what that adapter reads
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterParams {
    /// Trading pair such as `ETH/USD`
    Symbol(String),
    City(String),
    Coordinates { lat: f64, lon: f64 },
    Space(SpaceQuery),
}

/// Payload returned by an adapter before the collector stamps it
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReading {
    pub value: Value,
    pub confidence: Option<f64>,
    pub metadata: HashMap<String, String>,
}

impl SourceReading {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            confidence: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Trait for oracle data sources
///
/// Implementations own their transport, credentials and timeouts.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source this adapter serves
    fn id(&self) -> SourceId;

    /// Categories this adapter can produce
    fn categories(&self) -> &'static [DataCategory];

    /// Fetch one reading
    async fn fetch(&self, params: &AdapterParams) -> Result<SourceReading>;
}

/// Shared HTTP client with the adapter's request timeout
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("oracle-consensus/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Split a pair like `ETH/USD`, `eth-usd` or `ETHUSD` into base and quote
pub(crate) fn split_symbol(symbol: &str) -> Option<(String, String)> {
    let upper = symbol.trim().to_uppercase();
    if let Some((base, quote)) = upper.split_once(&['/', '-', '_'][..]) {
        if !base.is_empty() && !quote.is_empty() {
            return Some((base.to_string(), quote.to_string()));
        }
        return None;
    }
    ["USDT", "USDC", "USD", "EUR", "BTC", "ETH"]
        .iter()
        .find(|q| upper.len() > q.len() && upper.ends_with(*q))
        .map(|q| (upper[..upper.len() - q.len()].to_string(), q.to_string()))
}
