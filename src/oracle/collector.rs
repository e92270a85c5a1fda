//! Response Collector - runs dispatched calls concurrently and isolates failures
//!
//! Every call is awaited; a slow or failing source never short-circuits the
//! others. Dropping the returned future drops all in-flight adapter calls.

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{OracleError, SourceFailure};
use crate::oracle::router::DispatchCall;
use crate::oracle::sources::{SourceAdapter, SourceReading};
use crate::types::{OracleDataPoint, SourceId};

/// Result of one adapter call
#[derive(Debug, Clone)]
pub struct SourceResponse {
    pub source: SourceId,
    /// Completion time in epoch milliseconds
    pub timestamp: i64,
    pub response_time_ms: u64,
    pub outcome: Result<OracleDataPoint, String>,
}

impl SourceResponse {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn observation(&self) -> Option<&OracleDataPoint> {
        self.outcome.as_ref().ok()
    }

    pub fn failure(&self) -> Option<SourceFailure> {
        self.outcome.as_ref().err().map(|error| SourceFailure {
            source: self.source,
            error: error.clone(),
            response_time_ms: self.response_time_ms,
        })
    }
}

/// Successful observations plus per-source diagnostics
#[derive(Debug, Clone)]
pub struct Collection {
    pub observations: Vec<OracleDataPoint>,
    pub responses: Vec<SourceResponse>,
}

impl Collection {
    pub fn failures(&self) -> Vec<SourceFailure> {
        self.responses.iter().filter_map(SourceResponse::failure).collect()
    }

    pub fn attempted(&self) -> Vec<SourceId> {
        self.responses.iter().map(|r| r.source).collect()
    }
}

#[derive(Clone)]
pub struct ResponseCollector {
    adapters: HashMap<SourceId, Arc<dyn SourceAdapter>>,
}

impl ResponseCollector {
    pub fn new(adapters: &[Arc<dyn SourceAdapter>]) -> Self {
        Self {
            adapters: adapters
                .iter()
                .map(|a| (a.id(), Arc::clone(a)))
                .collect(),
        }
    }

    /// Execute every call and wait for all of them.
    ///
    /// Fails with `NoDataAvailable` only when no call succeeded.
    pub async fn collect(&self, calls: Vec<DispatchCall>) -> Result<Collection, OracleError> {
        let futures = calls.into_iter().map(|call| self.execute(call));
        let responses = join_all(futures).await;

        let observations: Vec<OracleDataPoint> = responses
            .iter()
            .filter_map(|r| r.observation().cloned())
            .collect();

        for response in responses.iter().filter(|r| !r.is_success()) {
            if let Err(error) = &response.outcome {
                tracing::warn!(
                    source = %response.source,
                    response_time_ms = response.response_time_ms,
                    error = %error,
                    "source call failed"
                );
            }
        }

        let collection = Collection {
            observations,
            responses,
        };

        if collection.observations.is_empty() {
            return Err(OracleError::NoDataAvailable {
                attempted: collection.attempted(),
                failures: collection.failures(),
            });
        }

        Ok(collection)
    }

    async fn execute(&self, call: DispatchCall) -> SourceResponse {
        let start = Instant::now();

        let outcome = match self.adapters.get(&call.source) {
            Some(adapter) => adapter
                .fetch(&call.params)
                .await
                .map(|reading| stamp(&call, reading))
                .map_err(|e| format!("{e:#}")),
            None => Err(format!("no adapter registered for {}", call.source)),
        };

        let response_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(
            source = %call.source,
            success = outcome.is_ok(),
            response_time_ms,
            "source call finished"
        );

        SourceResponse {
            source: call.source,
            timestamp: chrono::Utc::now().timestamp_millis(),
            response_time_ms,
            outcome,
        }
    }
}

/// Turn an adapter reading into an observation stamped at collection time
fn stamp(call: &DispatchCall, reading: SourceReading) -> OracleDataPoint {
    OracleDataPoint {
        source: call.source,
        category: call.category,
        value: reading.value,
        observed_at: chrono::Utc::now().timestamp_millis(),
        confidence: reading
            .confidence
            .filter(|c| !c.is_nan())
            .map(|c| c.clamp(0.0, 1.0)),
        metadata: reading.metadata,
    }
}
