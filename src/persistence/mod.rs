//! Persistence collaborators
//!
//! Best-effort durable anchoring of aggregated results. The engine treats
//! every error from a sink as non-fatal.

mod csv_ledger;

pub use csv_ledger::{CsvLedger, LedgerRecord};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::AggregatedResult;

/// Acknowledgement returned by a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceReceipt {
    pub reference_id: String,
    pub confirmation: String,
}

/// Downstream store for aggregated results (ledger, chain, object storage)
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &'static str;

    async fn submit(&self, result: &AggregatedResult) -> Result<PersistenceReceipt>;
}
