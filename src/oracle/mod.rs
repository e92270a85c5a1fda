//! Oracle module - Multi-source data aggregation
//!
//! Routes a request to the source adapters that can serve its category,
//! collects their observations concurrently and reduces them to one
//! confidence-scored value.

mod aggregator;
mod collector;
mod consensus;
mod reliability;
mod router;
pub mod sources;

pub use aggregator::{
    CollectFailure, CollectOutcome, OracleAggregator, OracleAggregatorBuilder,
    DEFAULT_PERSISTENCE_TIMEOUT,
};
pub use collector::{Collection, ResponseCollector, SourceResponse};
pub use consensus::{
    ConsensusCalculator, MAJORITY_TOLERANCE, MEDIAN_CONFIDENCE, MEDIAN_FALLBACK_CONFIDENCE,
};
pub use reliability::{ReliabilityRegistry, DEFAULT_RELIABILITY};
pub use router::{CallBuilder, DispatchCall, DispatchRouter};
