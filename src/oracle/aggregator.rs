//! Oracle Aggregator - validates, routes, collects, reduces and anchors
//!
//! `collect_data` runs in two phases. `compute` produces the aggregated
//! result or a structured failure; `anchor` hands a successful result to the
//! persistence sink on a best-effort basis and never changes the outcome.

use anyhow::Result;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{DispatchTableError, OracleError, SourceFailure};
use crate::oracle::collector::ResponseCollector;
use crate::oracle::consensus::ConsensusCalculator;
use crate::oracle::reliability::ReliabilityRegistry;
use crate::oracle::router::DispatchRouter;
use crate::oracle::sources::chainlink::normalize_pair;
use crate::oracle::sources::{
    ChainlinkAdapter, CoinbaseAdapter, NasaAdapter, OpenMeteoAdapter, OpenWeatherAdapter,
    SourceAdapter,
};
use crate::persistence::{CsvLedger, PersistenceReceipt, PersistenceSink};
use crate::types::{AggregatedResult, CollectRequest, ConsensusMethod, SourceId};

pub const DEFAULT_PERSISTENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Successful `collect_data` outcome
#[derive(Debug, Clone, Serialize)]
pub struct CollectOutcome {
    pub result: AggregatedResult,
    /// Sources named by the caller, deduplicated
    pub requested_sources: Vec<SourceId>,
    /// Dispatched calls that failed without sinking the request
    pub failures: Vec<SourceFailure>,
    pub execution_time_ms: u64,
    /// Present when the persistence sink acknowledged the result
    pub receipt: Option<PersistenceReceipt>,
}

impl CollectOutcome {
    /// Requested sources that did not contribute an observation
    pub fn missing_sources(&self) -> Vec<SourceId> {
        self.requested_sources
            .iter()
            .filter(|s| !self.result.sources.contains(s))
            .copied()
            .collect()
    }
}

/// Failed `collect_data` outcome
#[derive(Debug, Clone, Error, Serialize)]
#[error("{error} (attempted {attempted_sources:?} in {execution_time_ms}ms)")]
pub struct CollectFailure {
    #[serde(serialize_with = "error_report")]
    pub error: OracleError,
    /// Sources whose adapters were actually invoked
    pub attempted_sources: Vec<SourceId>,
    pub execution_time_ms: u64,
}

fn error_report<S: Serializer>(error: &OracleError, serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Report<'a> {
        code: &'a str,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        failures: Option<&'a [SourceFailure]>,
    }

    let failures = match error {
        OracleError::NoDataAvailable { failures, .. } => Some(failures.as_slice()),
        _ => None,
    };
    Report {
        code: error.code(),
        message: error.to_string(),
        failures,
    }
    .serialize(serializer)
}

struct Computed {
    result: AggregatedResult,
    requested: Vec<SourceId>,
    failures: Vec<SourceFailure>,
}

/// Multi-source aggregation engine
pub struct OracleAggregator {
    router: DispatchRouter,
    collector: ResponseCollector,
    consensus: ConsensusCalculator,
    sink: Option<Arc<dyn PersistenceSink>>,
    persistence_timeout: Duration,
    default_method: ConsensusMethod,
}

impl OracleAggregator {
    pub fn builder() -> OracleAggregatorBuilder {
        OracleAggregatorBuilder::default()
    }

    /// Wire the concrete adapters and, if enabled, the CSV ledger
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.sources.request_timeout();
        let sources = &config.sources;

        let mut feeds = ChainlinkAdapter::default_feeds();
        for (pair, address) in &sources.chainlink.feeds {
            feeds.insert(normalize_pair(pair), address.clone());
        }

        let mut builder = Self::builder()
            .with_adapter(Arc::new(ChainlinkAdapter::new(
                sources.chainlink.rpc_url.clone(),
                feeds,
                timeout,
            )))
            .with_adapter(Arc::new(CoinbaseAdapter::new(
                sources.coinbase.base_url.clone(),
                timeout,
            )))
            .with_adapter(Arc::new(OpenWeatherAdapter::new(
                sources.openweather.base_url.clone(),
                sources.openweather.api_key.clone(),
                timeout,
            )))
            .with_adapter(Arc::new(OpenMeteoAdapter::new(
                sources.open_meteo.base_url.clone(),
                timeout,
            )))
            .with_adapter(Arc::new(NasaAdapter::new(
                sources.nasa.base_url.clone(),
                sources.nasa.api_key.clone(),
                timeout,
            )))
            .with_reliability(ReliabilityRegistry::with_overrides(&config.reliability))
            .default_method(config.engine.default_method)
            .persistence_timeout(config.engine.persistence_timeout());

        if config.persistence.enabled {
            builder = builder.with_sink(Arc::new(CsvLedger::new(&config.persistence.data_dir)?));
        }

        Ok(builder.build()?)
    }

    pub fn reliability(&self) -> &ReliabilityRegistry {
        self.consensus.reliability()
    }

    /// Collect observations from the requested sources and reduce them to
    /// one aggregated value.
    ///
    /// Dropping the returned future cancels every in-flight adapter call.
    pub async fn collect_data(
        &self,
        request: CollectRequest,
    ) -> Result<CollectOutcome, CollectFailure> {
        let start = Instant::now();

        let computed = match self.compute(&request).await {
            Ok(computed) => computed,
            Err(error) => {
                let execution_time_ms = elapsed_ms(start);
                warn!(
                    category = %request.category,
                    code = error.code(),
                    error = %error,
                    elapsed_ms = execution_time_ms,
                    "aggregation failed"
                );
                return Err(CollectFailure {
                    attempted_sources: attempted_sources(&error),
                    error,
                    execution_time_ms,
                });
            }
        };

        let receipt = self.anchor(&computed.result).await;
        let execution_time_ms = elapsed_ms(start);

        info!(
            category = %computed.result.category,
            method = %computed.result.method,
            contributing = ?computed.result.sources,
            requested = ?computed.requested,
            failed = computed.failures.len(),
            confidence = computed.result.confidence,
            anchored = receipt.is_some(),
            elapsed_ms = execution_time_ms,
            "aggregation complete"
        );

        Ok(CollectOutcome {
            result: computed.result,
            requested_sources: computed.requested,
            failures: computed.failures,
            execution_time_ms,
            receipt,
        })
    }

    async fn compute(&self, request: &CollectRequest) -> Result<Computed, OracleError> {
        let mut validated = request.validate()?;
        if request.method.is_none() {
            validated.method = self.default_method;
        }

        let calls = self.router.route_or_fail(&validated)?;
        let collection = self.collector.collect(calls).await?;
        let consensus = self
            .consensus
            .consensus(&collection.observations, validated.method)?;

        let failures = collection.failures();
        let sources = collection.observations.iter().map(|o| o.source).collect();

        Ok(Computed {
            result: AggregatedResult {
                category: validated.category,
                sources,
                aggregated_value: consensus.value,
                confidence: consensus.confidence,
                produced_at: chrono::Utc::now().timestamp_millis(),
                observations: collection.observations,
                method: consensus.method,
            },
            requested: validated.sources,
            failures,
        })
    }

    async fn anchor(&self, result: &AggregatedResult) -> Option<PersistenceReceipt> {
        let sink = self.sink.as_ref()?;

        match tokio::time::timeout(self.persistence_timeout, sink.submit(result)).await {
            Ok(Ok(receipt)) => {
                debug!(
                    sink = sink.name(),
                    reference_id = %receipt.reference_id,
                    "result anchored"
                );
                Some(receipt)
            }
            Ok(Err(e)) => {
                warn!(sink = sink.name(), error = %e, "persistence failed; result still returned");
                None
            }
            Err(_) => {
                warn!(
                    sink = sink.name(),
                    timeout_ms = self.persistence_timeout.as_millis() as u64,
                    "persistence timed out; result still returned"
                );
                None
            }
        }
    }
}

fn attempted_sources(error: &OracleError) -> Vec<SourceId> {
    match error {
        OracleError::NoDataAvailable { attempted, .. } => attempted.clone(),
        _ => Vec::new(),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Explicit wiring of adapters and collaborators
pub struct OracleAggregatorBuilder {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    reliability: Option<ReliabilityRegistry>,
    sink: Option<Arc<dyn PersistenceSink>>,
    persistence_timeout: Duration,
    default_method: ConsensusMethod,
}

impl Default for OracleAggregatorBuilder {
    fn default() -> Self {
        Self {
            adapters: Vec::new(),
            reliability: None,
            sink: None,
            persistence_timeout: DEFAULT_PERSISTENCE_TIMEOUT,
            default_method: ConsensusMethod::default(),
        }
    }
}

impl OracleAggregatorBuilder {
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Replace the built-in reliability table
    pub fn with_reliability(mut self, registry: ReliabilityRegistry) -> Self {
        self.reliability = Some(registry);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn persistence_timeout(mut self, timeout: Duration) -> Self {
        self.persistence_timeout = timeout;
        self
    }

    pub fn default_method(mut self, method: ConsensusMethod) -> Self {
        self.default_method = method;
        self
    }

    /// Validate the dispatch table against the adapters and assemble the engine
    pub fn build(self) -> Result<OracleAggregator, DispatchTableError> {
        let router = DispatchRouter::new(&self.adapters)?;
        let collector = ResponseCollector::new(&self.adapters);
        let reliability = Arc::new(self.reliability.unwrap_or_default());

        info!(
            adapters = self.adapters.len(),
            sink = self.sink.as_ref().map(|s| s.name()).unwrap_or("none"),
            default_method = %self.default_method,
            "oracle aggregator ready"
        );

        Ok(OracleAggregator {
            router,
            collector,
            consensus: ConsensusCalculator::new(reliability),
            sink: self.sink,
            persistence_timeout: self.persistence_timeout,
            default_method: self.default_method,
        })
    }
}
