//! Coinbase spot price adapter

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::oracle::sources::{http_client, split_symbol, AdapterParams, SourceAdapter, SourceReading};
use crate::types::{DataCategory, SourceId};

pub const COINBASE_API_URL: &str = "https://api.coinbase.com";

#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotPrice,
}

#[derive(Debug, Deserialize)]
struct SpotPrice {
    amount: String,
    base: String,
    currency: String,
}

pub struct CoinbaseAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl CoinbaseAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for CoinbaseAdapter {
    fn id(&self) -> SourceId {
        SourceId::Coinbase
    }

    fn categories(&self) -> &'static [DataCategory] {
        &[DataCategory::PriceFeed]
    }

    async fn fetch(&self, params: &AdapterParams) -> Result<SourceReading> {
        let AdapterParams::Symbol(symbol) = params else {
            bail!("Coinbase expects a symbol, got {:?}", params);
        };
        let (base, quote) =
            split_symbol(symbol).with_context(|| format!("cannot parse pair {}", symbol))?;

        let url = format!("{}/v2/prices/{}-{}/spot", self.base_url, base, quote);
        let spot: SpotResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("Coinbase request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Coinbase spot response")?;

        parse_spot(spot.data)
    }
}

fn parse_spot(spot: SpotPrice) -> Result<SourceReading> {
    let price: f64 = spot
        .amount
        .parse()
        .with_context(|| format!("invalid Coinbase amount {:?}", spot.amount))?;
    if !price.is_finite() || price <= 0.0 {
        bail!("Coinbase returned non-positive price {}", price);
    }

    Ok(SourceReading::new(json!({
        "symbol": format!("{}/{}", spot.base, spot.currency),
        "price": price,
        "currency": spot.currency,
        "change24h": null,
    }))
    .with_confidence(0.9))
}
