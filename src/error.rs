//! Error taxonomy for the aggregation engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::{DataCategory, SourceId};

/// Why one source failed to produce an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: SourceId,
    pub error: String,
    pub response_time_ms: u64,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({}ms)", self.source, self.error, self.response_time_ms)
    }
}

/// Request-level failures surfaced by `collect_data`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// Malformed or incomplete caller input
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// None of the requested sources can serve the category with the given parameters
    #[error("no applicable source for {category} among {requested:?}")]
    NoApplicableSource {
        category: DataCategory,
        requested: Vec<SourceId>,
    },

    /// Every dispatched call failed
    #[error("no data available from {attempted:?}: {}", format_failures(.failures))]
    NoDataAvailable {
        attempted: Vec<SourceId>,
        failures: Vec<SourceFailure>,
    },

    /// Internal precondition broken; always a defect
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

fn format_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OracleError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            OracleError::InvalidRequest(_) => "invalid_request",
            OracleError::NoApplicableSource { .. } => "no_applicable_source",
            OracleError::NoDataAvailable { .. } => "no_data_available",
            OracleError::InvariantViolation(_) => "invariant_violation",
        }
    }
}

/// Startup errors while building the dispatch table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchTableError {
    #[error("adapter {adapter} declares {category} but no dispatch entry exists for that pair")]
    UnsupportedPair {
        adapter: SourceId,
        category: DataCategory,
    },

    #[error("more than one adapter registered for {0}")]
    DuplicateAdapter(SourceId),
}
