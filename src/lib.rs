//! Oracle Consensus Library
//!
//! Multi-source data aggregation and consensus engine for price feeds,
//! weather and space data

pub mod config;
pub mod error;
pub mod oracle;
pub mod persistence;
pub mod types;

pub use error::{DispatchTableError, OracleError, SourceFailure};
pub use oracle::{CollectFailure, CollectOutcome, OracleAggregator};
pub use types::{AggregatedResult, CollectRequest, ConsensusMethod, DataCategory, SourceId};
