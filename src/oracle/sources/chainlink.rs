//! Chainlink price feed adapter
//!
//! Reads `latestRoundData()` from an aggregator contract through a plain
//! JSON-RPC `eth_call`. Feeds are USD-quoted with 8 decimals.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

use crate::oracle::sources::{http_client, split_symbol, AdapterParams, SourceAdapter, SourceReading};
use crate::types::{DataCategory, SourceId};

/// `latestRoundData()` selector
const LATEST_ROUND_DATA: &str = "0xfeaf968c";
const FEED_DECIMALS: i32 = 8;
const WORD: usize = 32;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Decoded `latestRoundData()` return tuple
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RoundData {
    pub round_id: u128,
    pub answer: i128,
    pub updated_at: u64,
}

pub struct ChainlinkAdapter {
    client: reqwest::Client,
    rpc_url: String,
    /// Upper-cased pair (e.g. `ETH/USD`) -> aggregator address
    feeds: HashMap<String, String>,
}

impl ChainlinkAdapter {
    pub fn new(rpc_url: impl Into<String>, feeds: HashMap<String, String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            rpc_url: rpc_url.into(),
            feeds: feeds
                .into_iter()
                .map(|(pair, address)| (normalize_pair(&pair), address))
                .collect(),
        }
    }

    /// Ethereum mainnet aggregators
    pub fn default_feeds() -> HashMap<String, String> {
        [
            ("ETH/USD", "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"),
            ("BTC/USD", "0xF4030086522a5bEEa4988F8cA5B36dbC97BeE88c"),
            ("LINK/USD", "0x2c1d072e956AFFC0D435Cb7AC38EF18d24d9127c"),
        ]
        .into_iter()
        .map(|(pair, address)| (pair.to_string(), address.to_string()))
        .collect()
    }

    async fn latest_round(&self, feed: &str) -> Result<RoundData> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": feed, "data": LATEST_ROUND_DATA }, "latest"],
        });

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .context("Chainlink RPC request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Chainlink RPC response was not JSON-RPC")?;

        if let Some(err) = response.error {
            bail!("eth_call error {}: {}", err.code, err.message);
        }
        let data = response.result.context("eth_call returned no result")?;
        decode_latest_round(&data)
    }
}

#[async_trait]
impl SourceAdapter for ChainlinkAdapter {
    fn id(&self) -> SourceId {
        SourceId::Chainlink
    }

    fn categories(&self) -> &'static [DataCategory] {
        &[DataCategory::PriceFeed]
    }

    async fn fetch(&self, params: &AdapterParams) -> Result<SourceReading> {
        let AdapterParams::Symbol(symbol) = params else {
            bail!("Chainlink expects a symbol, got {:?}", params);
        };
        let pair = normalize_pair(symbol);
        let feed = self
            .feeds
            .get(&pair)
            .with_context(|| format!("no Chainlink feed configured for {}", pair))?;

        let round = self.latest_round(feed).await?;
        if round.answer <= 0 {
            bail!("feed {} reported non-positive answer {}", feed, round.answer);
        }
        if round.updated_at == 0 {
            bail!("feed {} round {} is incomplete", feed, round.round_id);
        }

        let price = round.answer as f64 / 10f64.powi(FEED_DECIMALS);
        let currency = split_symbol(&pair).map(|(_, q)| q).unwrap_or_else(|| "USD".to_string());

        Ok(SourceReading::new(json!({
            "symbol": pair,
            "price": price,
            "currency": currency,
            "change24h": null,
        }))
        .with_confidence(0.95)
        .with_metadata("feed", feed)
        .with_metadata("round_id", round.round_id)
        .with_metadata("updated_at", round.updated_at))
    }
}

pub(crate) fn normalize_pair(symbol: &str) -> String {
    match split_symbol(symbol) {
        Some((base, quote)) => format!("{}/{}", base, quote),
        None => symbol.trim().to_uppercase(),
    }
}

/// Decode the ABI-encoded `(uint80, int256, uint256, uint256, uint80)` tuple
pub(crate) fn decode_latest_round(data: &str) -> Result<RoundData> {
    let bytes = hex::decode(data.trim_start_matches("0x")).context("eth_call result is not hex")?;
    if bytes.len() < 5 * WORD {
        bail!("latestRoundData returned {} bytes, expected {}", bytes.len(), 5 * WORD);
    }

    let word = |i: usize| &bytes[i * WORD..(i + 1) * WORD];

    let answer_word = word(1);
    let sign_fill = if answer_word[16] & 0x80 != 0 { 0xff } else { 0x00 };
    if answer_word[..16].iter().any(|b| *b != sign_fill) {
        bail!("answer does not fit in 128 bits");
    }

    let mut low = [0u8; 16];
    low.copy_from_slice(&answer_word[16..]);
    let answer = i128::from_be_bytes(low);

    let mut round = [0u8; 16];
    round.copy_from_slice(&word(0)[16..]);

    let mut updated = [0u8; 8];
    updated.copy_from_slice(&word(3)[24..]);

    Ok(RoundData {
        round_id: u128::from_be_bytes(round),
        answer,
        updated_at: u64::from_be_bytes(updated),
    })
}
