//! OpenWeatherMap current conditions adapter

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::oracle::sources::{http_client, AdapterParams, SourceAdapter, SourceReading};
use crate::types::{DataCategory, SourceId};

pub const OPENWEATHER_API_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: Option<String>,
    main: MainBlock,
    #[serde(default)]
    weather: Vec<Condition>,
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

pub struct OpenWeatherAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherAdapter {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl SourceAdapter for OpenWeatherAdapter {
    fn id(&self) -> SourceId {
        SourceId::OpenWeather
    }

    fn categories(&self) -> &'static [DataCategory] {
        &[DataCategory::Weather]
    }

    async fn fetch(&self, params: &AdapterParams) -> Result<SourceReading> {
        let api_key = self
            .api_key
            .as_deref()
            .context("OpenWeather API key not configured")?;

        let mut query: Vec<(&str, String)> = vec![
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
        ];
        match params {
            AdapterParams::City(city) => query.push(("q", city.clone())),
            AdapterParams::Coordinates { lat, lon } => {
                query.push(("lat", lat.to_string()));
                query.push(("lon", lon.to_string()));
            }
            other => bail!("OpenWeather expects a city or coordinates, got {:?}", other),
        }

        let url = format!("{}/data/2.5/weather", self.base_url);
        let weather: CurrentWeather = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("OpenWeather request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse OpenWeather response")?;

        let fallback = match params {
            AdapterParams::City(city) => city.clone(),
            AdapterParams::Coordinates { lat, lon } => format!("{:.4},{:.4}", lat, lon),
            _ => String::new(),
        };
        Ok(to_reading(weather, fallback))
    }
}

fn to_reading(weather: CurrentWeather, fallback_location: String) -> SourceReading {
    let location = weather
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback_location);

    SourceReading::new(json!({
        "location": location,
        "temperature": weather.main.temp,
        "humidity": weather.main.humidity,
        "description": weather.weather.first().map(|c| c.description.clone()),
        "wind_speed": weather.wind.map(|w| w.speed),
    }))
    .with_confidence(0.85)
    .with_metadata("units", "metric")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_reading() {
        let weather: CurrentWeather = serde_json::from_value(json!({
            "name": "London",
            "main": { "temp": 14.2, "humidity": 71 },
            "weather": [{ "description": "light rain" }],
            "wind": { "speed": 4.1 }
        }))
        .unwrap();

        let reading = to_reading(weather, "ignored".to_string());
        assert_eq!(reading.value["location"], "London");
        assert_eq!(reading.value["temperature"], 14.2);
        assert_eq!(reading.value["description"], "light rain");
        assert_eq!(reading.confidence, Some(0.85));
    }

    #[test]
    fn test_to_reading_uses_fallback_name() {
        let weather: CurrentWeather = serde_json::from_value(json!({
            "name": "",
            "main": { "temp": -3.0 }
        }))
        .unwrap();
        let reading = to_reading(weather, "51.5000,-0.1200".to_string());
        assert_eq!(reading.value["location"], "51.5000,-0.1200");
        assert!(reading.value["wind_speed"].is_null());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_call() {
        let adapter = OpenWeatherAdapter::new(OPENWEATHER_API_URL, None, Duration::from_secs(1));
        let err = adapter
            .fetch(&AdapterParams::City("London".to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
