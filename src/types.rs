//! Core types used throughout the oracle engine
//!
//! Defines data categories, source identifiers, observations, requests and
//! aggregated results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::OracleError;

/// Confidence assumed for observations that do not report one
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Data category an observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    PriceFeed,
    Weather,
    Space,
}

impl DataCategory {
    pub const ALL: [DataCategory; 3] = [
        DataCategory::PriceFeed,
        DataCategory::Weather,
        DataCategory::Space,
    ];

    /// Name of the numeric payload field consensus reads, if the category has one
    pub fn numeric_field(&self) -> Option<&'static str> {
        match self {
            DataCategory::PriceFeed => Some("price"),
            DataCategory::Weather => Some("temperature"),
            DataCategory::Space => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::PriceFeed => "price_feed",
            DataCategory::Weather => "weather",
            DataCategory::Space => "space",
        }
    }
}

impl FromStr for DataCategory {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price_feed" | "price" | "pricefeed" => Ok(DataCategory::PriceFeed),
            "weather" => Ok(DataCategory::Weather),
            "space" => Ok(DataCategory::Space),
            other => Err(OracleError::InvalidRequest(format!(
                "unrecognized category: {other}"
            ))),
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognized data source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Chainlink,
    Coinbase,
    OpenWeather,
    OpenMeteo,
    Nasa,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Chainlink,
        SourceId::Coinbase,
        SourceId::OpenWeather,
        SourceId::OpenMeteo,
        SourceId::Nasa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Chainlink => "chainlink",
            SourceId::Coinbase => "coinbase",
            SourceId::OpenWeather => "open_weather",
            SourceId::OpenMeteo => "open_meteo",
            SourceId::Nasa => "nasa",
        }
    }
}

impl FromStr for SourceId {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chainlink" => Ok(SourceId::Chainlink),
            "coinbase" => Ok(SourceId::Coinbase),
            "openweather" | "open_weather" | "weather" => Ok(SourceId::OpenWeather),
            "openmeteo" | "open_meteo" => Ok(SourceId::OpenMeteo),
            "nasa" | "space" => Ok(SourceId::Nasa),
            other => Err(OracleError::InvalidRequest(format!(
                "unrecognized source: {other}"
            ))),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm used to reduce observations to one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMethod {
    MajorityVote,
    #[default]
    WeightedAverage,
    Median,
    /// Reserved for an AI-backed reducer; currently computed as `WeightedAverage`
    AiConsensus,
}

impl FromStr for ConsensusMethod {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "majority_vote" | "majority" => Ok(ConsensusMethod::MajorityVote),
            "weighted_average" | "weighted" => Ok(ConsensusMethod::WeightedAverage),
            "median" => Ok(ConsensusMethod::Median),
            "ai_consensus" | "ai" => Ok(ConsensusMethod::AiConsensus),
            other => Err(OracleError::InvalidRequest(format!(
                "unrecognized consensus method: {other}"
            ))),
        }
    }
}

impl fmt::Display for ConsensusMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusMethod::MajorityVote => write!(f, "majority_vote"),
            ConsensusMethod::WeightedAverage => write!(f, "weighted_average"),
            ConsensusMethod::Median => write!(f, "median"),
            ConsensusMethod::AiConsensus => write!(f, "ai_consensus"),
        }
    }
}

/// One normalized reading from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleDataPoint {
    pub source: SourceId,
    pub category: DataCategory,
    /// Category-specific payload (e.g. `{symbol, price, currency, change24h}`)
    pub value: Value,
    /// Collection time in epoch milliseconds
    pub observed_at: i64,
    /// Self-reported confidence, clamped to [0, 1] when the point is built
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl OracleDataPoint {
    pub fn effective_confidence(&self) -> f64 {
        self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
    }

    /// Numeric consensus field for this point's category, if present and finite
    pub fn numeric_value(&self) -> Option<f64> {
        let field = self.category.numeric_field()?;
        numeric_field(&self.value, field)
    }
}

/// Read a numeric field from a JSON object, accepting numbers or numeric strings
pub fn numeric_field(value: &Value, field: &str) -> Option<f64> {
    value.get(field).and_then(as_number)
}

fn as_number(raw: &Value) -> Option<f64> {
    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Weather location as requested by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl Location {
    /// Resolve to coordinates, using the built-in gazetteer for city names
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match self {
            Location::Coordinates { lat, lon } => Some((*lat, *lon)),
            Location::City(city) => city_coordinates(city),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::City(city) => write!(f, "{city}"),
            Location::Coordinates { lat, lon } => write!(f, "{lat:.4},{lon:.4}"),
        }
    }
}

fn city_coordinates(city: &str) -> Option<(f64, f64)> {
    let coords = match city.trim().to_lowercase().as_str() {
        "london" => (51.5074, -0.1278),
        "new york" | "nyc" => (40.7128, -74.0060),
        "chicago" => (41.8781, -87.6298),
        "seoul" => (37.5665, 126.9780),
        "tokyo" => (35.6762, 139.6503),
        "paris" => (48.8566, 2.3522),
        "berlin" => (52.5200, 13.4050),
        "singapore" => (1.3521, 103.8198),
        "sydney" => (-33.8688, 151.2093),
        "san francisco" => (37.7749, -122.4194),
        _ => return None,
    };
    Some(coords)
}

/// Space data sub-type with its own parameters
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceQuery {
    Asteroids {
        start_date: Option<String>,
        end_date: Option<String>,
    },
    Imagery {
        lat: f64,
        lon: f64,
        date: Option<String>,
    },
    Rover {
        rover: String,
        sol: u32,
    },
    PictureOfDay {
        date: Option<String>,
    },
}

impl SpaceQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            SpaceQuery::Asteroids { .. } => "asteroids",
            SpaceQuery::Imagery { .. } => "imagery",
            SpaceQuery::Rover { .. } => "rover",
            SpaceQuery::PictureOfDay { .. } => "apod",
        }
    }
}

/// Typed, validated category parameters
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryParams {
    Price { symbol: String },
    Weather { location: Location },
    Space { query: SpaceQuery },
}

impl CategoryParams {
    /// Parse raw request parameters against the category's required-field contract
    pub fn parse(category: DataCategory, raw: &Map<String, Value>) -> Result<Self, OracleError> {
        match category {
            DataCategory::PriceFeed => {
                let symbol = string_param(raw, "symbol")
                    .ok_or_else(|| invalid("price_feed requires a non-empty 'symbol'"))?;
                Ok(CategoryParams::Price {
                    symbol: symbol.to_uppercase(),
                })
            }
            DataCategory::Weather => {
                if let Some(city) = string_param(raw, "city") {
                    return Ok(CategoryParams::Weather {
                        location: Location::City(city),
                    });
                }
                match coordinates_param(raw)? {
                    Some((lat, lon)) => Ok(CategoryParams::Weather {
                        location: Location::Coordinates { lat, lon },
                    }),
                    None => Err(invalid("weather requires 'city' or both 'lat' and 'lon'")),
                }
            }
            DataCategory::Space => {
                let kind = string_param(raw, "type").unwrap_or_else(|| "apod".to_string());
                let query = match kind.to_lowercase().as_str() {
                    "asteroid" | "asteroids" | "neo" => SpaceQuery::Asteroids {
                        start_date: string_param(raw, "start_date"),
                        end_date: string_param(raw, "end_date"),
                    },
                    "imagery" | "earth" => {
                        let (lat, lon) = coordinates_param(raw)?
                            .ok_or_else(|| invalid("space imagery requires 'lat' and 'lon'"))?;
                        SpaceQuery::Imagery {
                            lat,
                            lon,
                            date: string_param(raw, "date"),
                        }
                    }
                    "rover" | "mars" => {
                        let sol = match number_param(raw, "sol")? {
                            Some(sol)
                                if sol >= 0.0 && sol.fract() == 0.0 && sol <= u32::MAX as f64 =>
                            {
                                sol as u32
                            }
                            Some(_) => {
                                return Err(invalid("'sol' must be an integer in 0..=4294967295"))
                            }
                            None => 1000,
                        };
                        let rover = string_param(raw, "rover")
                            .map(|r| r.to_lowercase())
                            .unwrap_or_else(|| "curiosity".to_string());
                        if !MARS_ROVERS.contains(&rover.as_str()) {
                            return Err(invalid(&format!(
                                "unknown rover '{rover}', expected one of {}",
                                MARS_ROVERS.join(", ")
                            )));
                        }
                        SpaceQuery::Rover { rover, sol }
                    }
                    "apod" | "picture_of_day" => SpaceQuery::PictureOfDay {
                        date: string_param(raw, "date"),
                    },
                    other => return Err(invalid(&format!("unknown space data type: {other}"))),
                };
                Ok(CategoryParams::Space { query })
            }
        }
    }
}

/// Rovers served by the Mars photos API
pub const MARS_ROVERS: [&str; 4] = ["curiosity", "opportunity", "spirit", "perseverance"];

fn invalid(msg: &str) -> OracleError {
    OracleError::InvalidRequest(msg.to_string())
}

fn string_param(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn number_param(raw: &Map<String, Value>, key: &str) -> Result<Option<f64>, OracleError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_number(v)
            .map(Some)
            .ok_or_else(|| invalid(&format!("'{key}' must be numeric"))),
    }
}

fn coordinates_param(raw: &Map<String, Value>) -> Result<Option<(f64, f64)>, OracleError> {
    match (number_param(raw, "lat")?, number_param(raw, "lon")?) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(invalid("coordinates out of range"));
            }
            Ok(Some((lat, lon)))
        }
        (None, None) => Ok(None),
        _ => Err(invalid("'lat' and 'lon' must be given together")),
    }
}

/// Raw caller request for `collect_data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectRequest {
    pub category: String,
    pub source_names: Vec<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub method: Option<ConsensusMethod>,
}

impl CollectRequest {
    pub fn new(category: impl Into<String>, source_names: &[&str]) -> Self {
        Self {
            category: category.into(),
            source_names: source_names.iter().map(|s| s.to_string()).collect(),
            parameters: Map::new(),
            method: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn with_method(mut self, method: ConsensusMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Check the request and parse it into typed form
    pub fn validate(&self) -> Result<ValidatedRequest, OracleError> {
        if self.source_names.is_empty() {
            return Err(invalid("source_names must not be empty"));
        }

        let category: DataCategory = self.category.parse()?;

        let mut sources = Vec::with_capacity(self.source_names.len());
        for name in &self.source_names {
            let id: SourceId = name.parse()?;
            if !sources.contains(&id) {
                sources.push(id);
            }
        }

        let params = CategoryParams::parse(category, &self.parameters)?;

        Ok(ValidatedRequest {
            category,
            sources,
            params,
            method: self.method.unwrap_or_default(),
        })
    }
}

/// Request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub category: DataCategory,
    /// Requested sources, deduplicated, in request order
    pub sources: Vec<SourceId>,
    pub params: CategoryParams,
    pub method: ConsensusMethod,
}

/// Consensus outcome for a set of observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub value: Value,
    pub confidence: f64,
    pub method: ConsensusMethod,
    /// Always empty: no method flags outliers yet
    pub outliers: Vec<SourceId>,
}

/// Final aggregated value with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub category: DataCategory,
    /// Sources whose collection succeeded
    pub sources: Vec<SourceId>,
    pub aggregated_value: Value,
    pub confidence: f64,
    pub produced_at: i64,
    pub observations: Vec<OracleDataPoint>,
    pub method: ConsensusMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_numeric_field_accepts_strings_and_numbers() {
        let v = json!({"price": "2500.5", "other": 3});
        assert_eq!(numeric_field(&v, "price"), Some(2500.5));
        assert_eq!(numeric_field(&v, "other"), Some(3.0));
        assert_eq!(numeric_field(&v, "missing"), None);
        assert_eq!(numeric_field(&json!({"price": "abc"}), "price"), None);
    }

    #[test]
    fn test_source_aliases() {
        assert_eq!("Chainlink".parse::<SourceId>().unwrap(), SourceId::Chainlink);
        assert_eq!("weather".parse::<SourceId>().unwrap(), SourceId::OpenWeather);
        assert_eq!("openmeteo".parse::<SourceId>().unwrap(), SourceId::OpenMeteo);
        assert!(matches!(
            "pyth".parse::<SourceId>(),
            Err(OracleError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_method_parse_and_default() {
        assert_eq!(ConsensusMethod::default(), ConsensusMethod::WeightedAverage);
        assert_eq!(
            "majority-vote".parse::<ConsensusMethod>().unwrap(),
            ConsensusMethod::MajorityVote
        );
        assert_eq!(
            "AI_CONSENSUS".parse::<ConsensusMethod>().unwrap(),
            ConsensusMethod::AiConsensus
        );
    }

    #[test]
    fn test_validate_rejects_empty_sources() {
        let req = CollectRequest::new("price_feed", &[]).with_param("symbol", "ETH/USD");
        assert!(matches!(req.validate(), Err(OracleError::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_category() {
        let req = CollectRequest::new("stocks", &["chainlink"]);
        assert!(matches!(req.validate(), Err(OracleError::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_price_requires_symbol() {
        let req = CollectRequest::new("price_feed", &["chainlink"]);
        assert!(matches!(req.validate(), Err(OracleError::InvalidRequest(_))));

        let req = req.with_param("symbol", "eth/usd");
        let validated = req.validate().unwrap();
        assert_eq!(
            validated.params,
            CategoryParams::Price {
                symbol: "ETH/USD".to_string()
            }
        );
        assert_eq!(validated.method, ConsensusMethod::WeightedAverage);
    }

    #[test]
    fn test_validate_dedupes_sources_in_order() {
        let req = CollectRequest::new("price_feed", &["coinbase", "chainlink", "Coinbase"])
            .with_param("symbol", "BTC/USD");
        let validated = req.validate().unwrap();
        assert_eq!(validated.sources, vec![SourceId::Coinbase, SourceId::Chainlink]);
    }

    #[test]
    fn test_weather_params() {
        let city = CategoryParams::parse(DataCategory::Weather, &params(json!({"city": "London"})))
            .unwrap();
        assert_eq!(
            city,
            CategoryParams::Weather {
                location: Location::City("London".to_string())
            }
        );

        let coords = CategoryParams::parse(
            DataCategory::Weather,
            &params(json!({"lat": "51.5", "lon": -0.12})),
        )
        .unwrap();
        assert_eq!(
            coords,
            CategoryParams::Weather {
                location: Location::Coordinates { lat: 51.5, lon: -0.12 }
            }
        );

        let half = CategoryParams::parse(DataCategory::Weather, &params(json!({"lat": 51.5})));
        assert!(half.is_err());
        let none = CategoryParams::parse(DataCategory::Weather, &Map::new());
        assert!(none.is_err());
    }

    #[test]
    fn test_space_params() {
        let apod = CategoryParams::parse(DataCategory::Space, &Map::new()).unwrap();
        assert_eq!(
            apod,
            CategoryParams::Space {
                query: SpaceQuery::PictureOfDay { date: None }
            }
        );

        let rover =
            CategoryParams::parse(DataCategory::Space, &params(json!({"type": "rover", "sol": 42})))
                .unwrap();
        assert_eq!(
            rover,
            CategoryParams::Space {
                query: SpaceQuery::Rover {
                    rover: "curiosity".to_string(),
                    sol: 42
                }
            }
        );

        let named = CategoryParams::parse(
            DataCategory::Space,
            &params(json!({"type": "rover", "rover": "Perseverance"})),
        )
        .unwrap();
        assert_eq!(
            named,
            CategoryParams::Space {
                query: SpaceQuery::Rover {
                    rover: "perseverance".to_string(),
                    sol: 1000
                }
            }
        );

        let imagery = CategoryParams::parse(DataCategory::Space, &params(json!({"type": "imagery"})));
        assert!(imagery.is_err());

        let unknown = CategoryParams::parse(DataCategory::Space, &params(json!({"type": "comet"})));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_rover_params_are_restricted() {
        for rover in ["../../../planetary/apod?x=", "zhurong", "curiosity/photos"] {
            let result = CategoryParams::parse(
                DataCategory::Space,
                &params(json!({"type": "rover", "rover": rover})),
            );
            assert!(
                matches!(result, Err(OracleError::InvalidRequest(_))),
                "{rover}"
            );
        }
    }

    #[test]
    fn test_sol_out_of_range_rejected() {
        for sol in [json!(1e12), json!("4294967296"), json!(-1), json!(2.5)] {
            let result = CategoryParams::parse(
                DataCategory::Space,
                &params(json!({"type": "rover", "sol": sol})),
            );
            assert!(matches!(result, Err(OracleError::InvalidRequest(_))));
        }

        let max = CategoryParams::parse(
            DataCategory::Space,
            &params(json!({"type": "rover", "sol": 4294967295u64})),
        )
        .unwrap();
        assert!(matches!(
            max,
            CategoryParams::Space {
                query: SpaceQuery::Rover { sol: u32::MAX, .. }
            }
        ));
    }

    #[test]
    fn test_location_gazetteer() {
        assert!(Location::City("NYC".to_string()).coordinates().is_some());
        assert!(Location::City("Atlantis".to_string()).coordinates().is_none());
        assert_eq!(
            Location::Coordinates { lat: 1.0, lon: 2.0 }.coordinates(),
            Some((1.0, 2.0))
        );
    }

    #[test]
    fn test_effective_confidence_default() {
        let point = OracleDataPoint {
            source: SourceId::Nasa,
            category: DataCategory::Space,
            value: json!({}),
            observed_at: 0,
            confidence: None,
            metadata: HashMap::new(),
        };
        assert_eq!(point.effective_confidence(), DEFAULT_CONFIDENCE);
        assert_eq!(point.numeric_value(), None);
    }
}
