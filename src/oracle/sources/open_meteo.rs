//! Open-Meteo current weather adapter

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::oracle::sources::{http_client, AdapterParams, SourceAdapter, SourceReading};
use crate::types::{DataCategory, SourceId};

pub const OPEN_METEO_API_URL: &str = "https://api.open-meteo.com";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: Option<f64>,
    weathercode: Option<i64>,
    time: Option<String>,
}

pub struct OpenMeteoAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for OpenMeteoAdapter {
    fn id(&self) -> SourceId {
        SourceId::OpenMeteo
    }

    fn categories(&self) -> &'static [DataCategory] {
        &[DataCategory::Weather]
    }

    async fn fetch(&self, params: &AdapterParams) -> Result<SourceReading> {
        let AdapterParams::Coordinates { lat, lon } = params else {
            bail!("Open-Meteo expects coordinates, got {:?}", params);
        };

        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current_weather=true",
            self.base_url, lat, lon
        );
        let forecast: ForecastResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("Open-Meteo request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Open-Meteo response")?;

        Ok(to_reading(forecast.current_weather, *lat, *lon))
    }
}

fn to_reading(current: CurrentWeather, lat: f64, lon: f64) -> SourceReading {
    let mut reading = SourceReading::new(json!({
        "location": format!("{:.4},{:.4}", lat, lon),
        "temperature": current.temperature,
        "wind_speed": current.windspeed,
        "weather_code": current.weathercode,
    }))
    .with_confidence(0.8);

    if let Some(time) = current.time {
        reading = reading.with_metadata("forecast_time", time);
    }
    reading
}
