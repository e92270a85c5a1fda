//! Dispatch Router - maps a validated request to deferred adapter calls
//!
//! The `(category, source)` pairs live in one static table. At construction
//! the table is checked against the registered adapters so an adapter that
//! claims a category without a matching entry is rejected at startup.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{DispatchTableError, OracleError};
use crate::oracle::sources::{AdapterParams, SourceAdapter};
use crate::types::{CategoryParams, DataCategory, Location, SourceId, ValidatedRequest};

/// Builds one adapter's parameters, or `None` if the adapter cannot serve them
pub type CallBuilder = fn(&CategoryParams) -> Option<AdapterParams>;

const DISPATCH_TABLE: &[(DataCategory, SourceId, CallBuilder)] = &[
    (DataCategory::PriceFeed, SourceId::Chainlink, symbol_call),
    (DataCategory::PriceFeed, SourceId::Coinbase, symbol_call),
    (DataCategory::Weather, SourceId::OpenWeather, location_call),
    (DataCategory::Weather, SourceId::OpenMeteo, coordinates_call),
    (DataCategory::Space, SourceId::Nasa, space_call),
];

fn symbol_call(params: &CategoryParams) -> Option<AdapterParams> {
    match params {
        CategoryParams::Price { symbol } => Some(AdapterParams::Symbol(symbol.clone())),
        _ => None,
    }
}

fn location_call(params: &CategoryParams) -> Option<AdapterParams> {
    match params {
        CategoryParams::Weather {
            location: Location::City(city),
        } => Some(AdapterParams::City(city.clone())),
        CategoryParams::Weather {
            location: Location::Coordinates { lat, lon },
        } => Some(AdapterParams::Coordinates {
            lat: *lat,
            lon: *lon,
        }),
        _ => None,
    }
}

fn coordinates_call(params: &CategoryParams) -> Option<AdapterParams> {
    match params {
        CategoryParams::Weather { location } => location
            .coordinates()
            .map(|(lat, lon)| AdapterParams::Coordinates { lat, lon }),
        _ => None,
    }
}

fn space_call(params: &CategoryParams) -> Option<AdapterParams> {
    match params {
        CategoryParams::Space { query } => Some(AdapterParams::Space(query.clone())),
        _ => None,
    }
}

/// One deferred adapter invocation
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCall {
    pub source: SourceId,
    pub category: DataCategory,
    pub params: AdapterParams,
}

#[derive(Clone)]
pub struct DispatchRouter {
    routes: HashMap<(DataCategory, SourceId), CallBuilder>,
}

impl fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self.routes.keys().collect();
        routes.sort_by_key(|(c, s)| (c.as_str(), *s));
        f.debug_struct("DispatchRouter").field("routes", &routes).finish()
    }
}

impl DispatchRouter {
    /// Build the routing table for the registered adapters.
    ///
    /// Entries whose source has no adapter are left out.
    pub fn new(adapters: &[Arc<dyn SourceAdapter>]) -> Result<Self, DispatchTableError> {
        let mut registered = HashSet::new();
        for adapter in adapters {
            if !registered.insert(adapter.id()) {
                return Err(DispatchTableError::DuplicateAdapter(adapter.id()));
            }
            for category in adapter.categories() {
                let known = DISPATCH_TABLE
                    .iter()
                    .any(|(c, s, _)| c == category && *s == adapter.id());
                if !known {
                    return Err(DispatchTableError::UnsupportedPair {
                        adapter: adapter.id(),
                        category: *category,
                    });
                }
            }
        }

        let mut routes = HashMap::new();
        for (category, source, builder) in DISPATCH_TABLE {
            if registered.contains(source) {
                routes.insert((*category, *source), *builder);
            } else {
                tracing::info!(
                    source = %source,
                    category = %category,
                    "no adapter registered, route disabled"
                );
            }
        }

        Ok(Self { routes })
    }

    /// Whether a source is wired for a category
    pub fn supports(&self, category: DataCategory, source: SourceId) -> bool {
        self.routes.contains_key(&(category, source))
    }

    /// Map a request to deferred calls, skipping sources that do not apply
    pub fn route(&self, request: &ValidatedRequest) -> Vec<DispatchCall> {
        request
            .sources
            .iter()
            .filter_map(|source| {
                let Some(builder) = self.routes.get(&(request.category, *source)) else {
                    tracing::debug!(
                        source = %source,
                        category = %request.category,
                        "source does not support category, skipping"
                    );
                    return None;
                };
                let Some(params) = builder(&request.params) else {
                    tracing::debug!(
                        source = %source,
                        category = %request.category,
                        "source cannot serve request parameters, skipping"
                    );
                    return None;
                };
                Some(DispatchCall {
                    source: *source,
                    category: request.category,
                    params,
                })
            })
            .collect()
    }

    /// `route`, failing with `NoApplicableSource` when nothing applies
    pub fn route_or_fail(&self, request: &ValidatedRequest) -> Result<Vec<DispatchCall>, OracleError> {
        let calls = self.route(request);
        if calls.is_empty() {
            return Err(OracleError::NoApplicableSource {
                category: request.category,
                requested: request.sources.clone(),
            });
        }
        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::sources::SourceReading;
    use crate::types::{ConsensusMethod, SpaceQuery};
    use anyhow::Result;
    use async_trait::async_trait;

    struct Declares(SourceId, &'static [DataCategory]);

    #[async_trait]
    impl SourceAdapter for Declares {
        fn id(&self) -> SourceId {
            self.0
        }

        fn categories(&self) -> &'static [DataCategory] {
            self.1
        }

        async fn fetch(&self, _params: &AdapterParams) -> Result<SourceReading> {
            anyhow::bail!("not used")
        }
    }

    fn all_adapters() -> Vec<Arc<dyn SourceAdapter>> {
        vec![
            Arc::new(Declares(SourceId::Chainlink, &[DataCategory::PriceFeed])),
            Arc::new(Declares(SourceId::Coinbase, &[DataCategory::PriceFeed])),
            Arc::new(Declares(SourceId::OpenWeather, &[DataCategory::Weather])),
            Arc::new(Declares(SourceId::OpenMeteo, &[DataCategory::Weather])),
            Arc::new(Declares(SourceId::Nasa, &[DataCategory::Space])),
        ]
    }

    fn request(category: DataCategory, sources: &[SourceId], params: CategoryParams) -> ValidatedRequest {
        ValidatedRequest {
            category,
            sources: sources.to_vec(),
            params,
            method: ConsensusMethod::WeightedAverage,
        }
    }

    #[test]
    fn test_table_covers_every_source() {
        for source in SourceId::ALL {
            assert!(DISPATCH_TABLE.iter().any(|(_, s, _)| *s == source));
        }
        for category in DataCategory::ALL {
            assert!(DISPATCH_TABLE.iter().any(|(c, _, _)| *c == category));
        }
    }

    #[test]
    fn test_rejects_undeclared_pair() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(Declares(
            SourceId::Coinbase,
            &[DataCategory::PriceFeed, DataCategory::Weather],
        ))];
        assert_eq!(
            DispatchRouter::new(&adapters).unwrap_err(),
            DispatchTableError::UnsupportedPair {
                adapter: SourceId::Coinbase,
                category: DataCategory::Weather
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_adapter() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(Declares(SourceId::Nasa, &[DataCategory::Space])),
            Arc::new(Declares(SourceId::Nasa, &[DataCategory::Space])),
        ];
        assert_eq!(
            DispatchRouter::new(&adapters).unwrap_err(),
            DispatchTableError::DuplicateAdapter(SourceId::Nasa)
        );
    }

    #[test]
    fn test_unregistered_sources_are_disabled() {
        let adapters: Vec<Arc<dyn SourceAdapter>> =
            vec![Arc::new(Declares(SourceId::Chainlink, &[DataCategory::PriceFeed]))];
        let router = DispatchRouter::new(&adapters).unwrap();
        assert!(router.supports(DataCategory::PriceFeed, SourceId::Chainlink));
        assert!(!router.supports(DataCategory::PriceFeed, SourceId::Coinbase));
    }

    #[test]
    fn test_routes_price_symbol() {
        let router = DispatchRouter::new(&all_adapters()).unwrap();
        let req = request(
            DataCategory::PriceFeed,
            &[SourceId::Chainlink, SourceId::Coinbase],
            CategoryParams::Price {
                symbol: "ETH/USD".to_string(),
            },
        );
        let calls = router.route(&req);
        assert_eq!(calls.len(), 2);
        assert!(calls
            .iter()
            .all(|c| c.params == AdapterParams::Symbol("ETH/USD".to_string())));
    }

    #[test]
    fn test_skips_sources_outside_category() {
        let router = DispatchRouter::new(&all_adapters()).unwrap();
        let req = request(
            DataCategory::PriceFeed,
            &[SourceId::Nasa, SourceId::Chainlink, SourceId::OpenWeather],
            CategoryParams::Price {
                symbol: "BTC/USD".to_string(),
            },
        );
        let calls = router.route(&req);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, SourceId::Chainlink);
    }

    #[test]
    fn test_open_meteo_needs_resolvable_city() {
        let router = DispatchRouter::new(&all_adapters()).unwrap();

        let known = request(
            DataCategory::Weather,
            &[SourceId::OpenWeather, SourceId::OpenMeteo],
            CategoryParams::Weather {
                location: Location::City("London".to_string()),
            },
        );
        let calls = router.route(&known);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].params, AdapterParams::City("London".to_string()));
        assert_eq!(
            calls[1].params,
            AdapterParams::Coordinates {
                lat: 51.5074,
                lon: -0.1278
            }
        );

        let unknown = request(
            DataCategory::Weather,
            &[SourceId::OpenMeteo],
            CategoryParams::Weather {
                location: Location::City("Atlantis".to_string()),
            },
        );
        assert!(router.route(&unknown).is_empty());
        assert!(matches!(
            router.route_or_fail(&unknown),
            Err(OracleError::NoApplicableSource { .. })
        ));
    }

    #[test]
    fn test_space_query_forwarded() {
        let router = DispatchRouter::new(&all_adapters()).unwrap();
        let query = SpaceQuery::Rover {
            rover: "curiosity".to_string(),
            sol: 1000,
        };
        let req = request(
            DataCategory::Space,
            &[SourceId::Nasa],
            CategoryParams::Space {
                query: query.clone(),
            },
        );
        let calls = router.route_or_fail(&req).unwrap();
        assert_eq!(calls[0].params, AdapterParams::Space(query));
    }

    #[test]
    fn test_no_applicable_source() {
        let router = DispatchRouter::new(&all_adapters()).unwrap();
        let req = request(
            DataCategory::Space,
            &[SourceId::Chainlink, SourceId::Coinbase],
            CategoryParams::Space {
                query: SpaceQuery::PictureOfDay { date: None },
            },
        );
        match router.route_or_fail(&req) {
            Err(OracleError::NoApplicableSource {
                category,
                requested,
            }) => {
                assert_eq!(category, DataCategory::Space);
                assert_eq!(requested, vec![SourceId::Chainlink, SourceId::Coinbase]);
            }
            other => panic!("expected NoApplicableSource, got {:?}", other),
        }
    }
}
