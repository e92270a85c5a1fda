//! CSV ledger sink
//!
//! Appends one row per aggregated result. Each row carries a UUID reference
//! and the SHA-256 digest of the result's JSON encoding.

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::info;

use crate::persistence::{PersistenceReceipt, PersistenceSink};
use crate::types::AggregatedResult;

pub const LEDGER_FILE: &str = "aggregations.csv";

/// One ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub reference_id: String,
    pub produced_at: i64,
    pub category: String,
    pub method: String,
    pub confidence: f64,
    /// Contributing sources, `;`-separated
    pub sources: String,
    pub observation_count: usize,
    /// Aggregated value as compact JSON
    pub aggregated_value: String,
    pub digest: String,
}

pub struct CsvLedger {
    path: PathBuf,
    writer: Arc<AsyncRwLock<csv::Writer<std::fs::File>>>,
}

impl CsvLedger {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed creating {}", data_dir.display()))?;

        let path = data_dir.join(LEDGER_FILE);
        let writer = Self::create_writer(&path)?;
        info!(path = %path.display(), "CSV ledger ready");

        Ok(Self {
            path,
            writer: Arc::new(AsyncRwLock::new(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
        let file_has_data =
            path.exists() && fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("Failed to open ledger CSV file")?;

        Ok(WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file))
    }
}

/// Hex SHA-256 of the result's JSON encoding
pub fn content_digest(result: &AggregatedResult) -> Result<String> {
    let encoded = serde_json::to_vec(result).context("Failed to encode result")?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

#[async_trait]
impl PersistenceSink for CsvLedger {
    fn name(&self) -> &'static str {
        "csv_ledger"
    }

    async fn submit(&self, result: &AggregatedResult) -> Result<PersistenceReceipt> {
        let digest = content_digest(result)?;
        let record = LedgerRecord {
            reference_id: uuid::Uuid::new_v4().to_string(),
            produced_at: result.produced_at,
            category: result.category.to_string(),
            method: result.method.to_string(),
            confidence: result.confidence,
            sources: result
                .sources
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            observation_count: result.observations.len(),
            aggregated_value: result.aggregated_value.to_string(),
            digest: digest.clone(),
        };

        let mut writer = self.writer.write().await;
        writer
            .serialize(&record)
            .context("Failed to write ledger record")?;
        writer.flush().context("Failed to flush ledger writer")?;

        Ok(PersistenceReceipt {
            reference_id: record.reference_id,
            confirmation: digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConsensusMethod, DataCategory, SourceId};
    use csv::ReaderBuilder;
    use serde_json::json;
    use tempfile::TempDir;

    fn result(price: f64) -> AggregatedResult {
        AggregatedResult {
            category: DataCategory::PriceFeed,
            sources: vec![SourceId::Chainlink, SourceId::Coinbase],
            aggregated_value: json!({ "symbol": "ETH/USD", "price": price }),
            confidence: 0.9,
            produced_at: 1_700_000_000_000,
            observations: Vec::new(),
            method: ConsensusMethod::Median,
        }
    }

    fn read_records(path: &Path) -> Vec<LedgerRecord> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .unwrap();
        reader.deserialize().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn test_submit_appends_rows() {
        let dir = TempDir::new().unwrap();
        let ledger = CsvLedger::new(dir.path()).unwrap();

        let first = ledger.submit(&result(2500.0)).await.unwrap();
        let second = ledger.submit(&result(2501.0)).await.unwrap();
        assert_ne!(first.reference_id, second.reference_id);

        let records = read_records(ledger.path());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reference_id, first.reference_id);
        assert_eq!(records[0].sources, "chainlink;coinbase");
        assert_eq!(records[0].method, "median");
        assert_eq!(records[1].digest, second.confirmation);
    }

    #[tokio::test]
    async fn test_reopen_keeps_single_header() {
        let dir = TempDir::new().unwrap();
        {
            let ledger = CsvLedger::new(dir.path()).unwrap();
            ledger.submit(&result(1.0)).await.unwrap();
        }
        let ledger = CsvLedger::new(dir.path()).unwrap();
        ledger.submit(&result(2.0)).await.unwrap();

        assert_eq!(read_records(ledger.path()).len(), 2);
    }

    #[test]
    fn test_digest_is_content_addressed() {
        let a = content_digest(&result(2500.0)).unwrap();
        let b = content_digest(&result(2500.0)).unwrap();
        let c = content_digest(&result(2500.5)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
