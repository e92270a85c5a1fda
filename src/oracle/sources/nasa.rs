//! NASA open API adapter (APOD, NeoWs, Mars rover photos, Earth imagery)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::oracle::sources::{http_client, AdapterParams, SourceAdapter, SourceReading};
use crate::types::{DataCategory, SourceId, SpaceQuery};

pub const NASA_API_URL: &str = "https://api.nasa.gov";
pub const NASA_DEMO_KEY: &str = "DEMO_KEY";

pub struct NasaAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NasaAdapter {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| NASA_DEMO_KEY.to_string()),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .with_context(|| format!("NASA request to {} failed", path))?
            .error_for_status()?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse NASA response from {}", path))
    }
}

#[async_trait]
impl SourceAdapter for NasaAdapter {
    fn id(&self) -> SourceId {
        SourceId::Nasa
    }

    fn categories(&self) -> &'static [DataCategory] {
        &[DataCategory::Space]
    }

    async fn fetch(&self, params: &AdapterParams) -> Result<SourceReading> {
        let AdapterParams::Space(query) = params else {
            bail!("NASA expects a space query, got {:?}", params);
        };

        let value = match query {
            SpaceQuery::PictureOfDay { date } => {
                let mut q = Vec::new();
                if let Some(date) = date {
                    q.push(("date", date.clone()));
                }
                picture_of_day(&self.get_json("/planetary/apod", &q).await?)
            }
            SpaceQuery::Asteroids {
                start_date,
                end_date,
            } => {
                let start = start_date.clone().unwrap_or_else(today);
                let mut q = vec![("start_date", start)];
                if let Some(end) = end_date {
                    q.push(("end_date", end.clone()));
                }
                asteroids(&self.get_json("/neo/rest/v1/feed", &q).await?)?
            }
            SpaceQuery::Rover { rover, sol } => {
                let path = format!("/mars-photos/api/v1/rovers/{}/photos", rover);
                let q = vec![("sol", sol.to_string())];
                rover_photos(&self.get_json(&path, &q).await?, rover, *sol)?
            }
            SpaceQuery::Imagery { lat, lon, date } => {
                let q = vec![
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("date", date.clone().unwrap_or_else(today)),
                    ("dim", "0.15".to_string()),
                ];
                earth_imagery(&self.get_json("/planetary/earth/assets", &q).await?, *lat, *lon)
            }
        };

        Ok(SourceReading::new(value)
            .with_confidence(0.9)
            .with_metadata("kind", query.kind()))
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn picture_of_day(body: &Value) -> Value {
    json!({
        "kind": "apod",
        "title": body["title"],
        "date": body["date"],
        "url": body["url"],
        "media_type": body["media_type"],
    })
}

fn asteroids(body: &Value) -> Result<Value> {
    let by_date = body["near_earth_objects"]
        .as_object()
        .context("NeoWs response missing near_earth_objects")?;

    let objects: Vec<&Value> = by_date
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .collect();
    let hazardous = objects
        .iter()
        .filter(|o| o["is_potentially_hazardous_asteroid"].as_bool() == Some(true))
        .count();

    Ok(json!({
        "kind": "asteroids",
        "element_count": body["element_count"].as_u64().unwrap_or(objects.len() as u64),
        "hazardous_count": hazardous,
    }))
}

fn rover_photos(body: &Value, rover: &str, sol: u32) -> Result<Value> {
    let photos = body["photos"]
        .as_array()
        .context("rover response missing photos")?;

    Ok(json!({
        "kind": "rover",
        "rover": rover,
        "sol": sol,
        "photo_count": photos.len(),
        "earth_date": photos.first().map(|p| p["earth_date"].clone()),
        "first_photo": photos.first().map(|p| p["img_src"].clone()),
    }))
}

fn earth_imagery(body: &Value, lat: f64, lon: f64) -> Value {
    json!({
        "kind": "imagery",
        "lat": lat,
        "lon": lon,
        "date": body["date"],
        "url": body["url"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picture_of_day() {
        let body = json!({
            "title": "Pillars of Creation",
            "date": "2024-05-01",
            "url": "https://apod.nasa.gov/apod/image/pillars.jpg",
            "media_type": "image",
            "explanation": "long text"
        });
        let value = picture_of_day(&body);
        assert_eq!(value["title"], "Pillars of Creation");
        assert!(value.get("explanation").is_none());
    }

    #[test]
    fn test_asteroids_counts_hazardous() {
        let body = json!({
            "element_count": 3,
            "near_earth_objects": {
                "2024-05-01": [
                    { "name": "a", "is_potentially_hazardous_asteroid": false },
                    { "name": "b", "is_potentially_hazardous_asteroid": true }
                ],
                "2024-05-02": [
                    { "name": "c", "is_potentially_hazardous_asteroid": true }
                ]
            }
        });
        let value = asteroids(&body).unwrap();
        assert_eq!(value["element_count"], 3);
        assert_eq!(value["hazardous_count"], 2);
        assert!(asteroids(&json!({})).is_err());
    }

    #[test]
    fn test_rover_photos() {
        let body = json!({
            "photos": [
                { "id": 1, "img_src": "http://mars/1.jpg", "earth_date": "2015-05-30" },
                { "id": 2, "img_src": "http://mars/2.jpg", "earth_date": "2015-05-30" }
            ]
        });
        let value = rover_photos(&body, "curiosity", 1000).unwrap();
        assert_eq!(value["photo_count"], 2);
        assert_eq!(value["first_photo"], "http://mars/1.jpg");

        let empty = rover_photos(&json!({ "photos": [] }), "curiosity", 1).unwrap();
        assert!(empty["first_photo"].is_null());
    }

    #[test]
    fn test_demo_key_default() {
        let adapter = NasaAdapter::new(NASA_API_URL, Some(String::new()), Duration::from_secs(1));
        assert_eq!(adapter.api_key, NASA_DEMO_KEY);
    }
}
