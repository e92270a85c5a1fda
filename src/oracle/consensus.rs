//! Consensus Calculator - reduces observations to one value and a confidence
//!
//! Numeric categories (price feeds, weather) are reduced on their numeric
//! field; the winning observation's other fields are carried through. Any
//! set where some observation lacks the numeric field takes the non-numeric
//! path of the selected method.

use serde_json::{Number, Value};
use std::sync::Arc;

use crate::error::OracleError;
use crate::oracle::reliability::ReliabilityRegistry;
use crate::types::{ConsensusMethod, ConsensusResult, OracleDataPoint};

/// Half-width of the majority band, relative to the mean
pub const MAJORITY_TOLERANCE: f64 = 0.05;
/// Median confidence for numeric sets, independent of sample size
pub const MEDIAN_CONFIDENCE: f64 = 0.8;
/// Median confidence when the category has no numeric field
pub const MEDIAN_FALLBACK_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct ConsensusCalculator {
    reliability: Arc<ReliabilityRegistry>,
}

impl ConsensusCalculator {
    pub fn new(reliability: Arc<ReliabilityRegistry>) -> Self {
        Self { reliability }
    }

    pub fn reliability(&self) -> &ReliabilityRegistry {
        &self.reliability
    }

    /// Run the selected method over a non-empty observation set.
    ///
    /// An empty set is a caller defect and yields `InvariantViolation`.
    pub fn consensus(
        &self,
        observations: &[OracleDataPoint],
        method: ConsensusMethod,
    ) -> Result<ConsensusResult, OracleError> {
        if observations.is_empty() {
            return Err(OracleError::InvariantViolation(
                "consensus invoked on an empty observation set".to_string(),
            ));
        }

        let (value, confidence) = match method {
            ConsensusMethod::MajorityVote => self.majority_vote(observations),
            ConsensusMethod::WeightedAverage => self.weighted_average(observations),
            ConsensusMethod::Median => self.median(observations),
            // TODO: hand AiConsensus to an inference collaborator once one is injected
            ConsensusMethod::AiConsensus => self.weighted_average(observations),
        };

        tracing::debug!(
            method = %method,
            observations = observations.len(),
            confidence,
            "consensus computed"
        );

        Ok(ConsensusResult {
            value,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            outliers: Vec::new(),
        })
    }

    /// Mean of the numeric field; confidence is the share of observations
    /// within ±5% of that mean.
    fn majority_vote(&self, observations: &[OracleDataPoint]) -> (Value, f64) {
        let n = observations.len() as f64;

        let Some(values) = numeric_values(observations) else {
            return (observations[0].value.clone(), 1.0 / n);
        };

        let mean = mean(&values);
        let band = mean.abs() * MAJORITY_TOLERANCE;
        let in_consensus = values.iter().filter(|v| (*v - mean).abs() <= band).count();

        // Carry the fields of the observation closest to the mean
        let dominant = values
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - mean).abs().total_cmp(&(*b - mean).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);

        (
            with_numeric(&observations[dominant], mean),
            in_consensus as f64 / n,
        )
    }

    /// Reliability × confidence weighted mean of the numeric field.
    fn weighted_average(&self, observations: &[OracleDataPoint]) -> (Value, f64) {
        let weights: Vec<f64> = observations
            .iter()
            .map(|o| self.reliability.reliability_of(o.source) * o.effective_confidence())
            .collect();
        let total: f64 = weights.iter().sum();

        // Highest individual weight, first wins on ties
        let heaviest = weights
            .iter()
            .enumerate()
            .fold(0, |best, (i, w)| if *w > weights[best] { i } else { best });

        let Some(values) = numeric_values(observations) else {
            return (observations[heaviest].value.clone(), weights[heaviest]);
        };

        if total <= 0.0 {
            return (observations[0].value.clone(), 0.0);
        }

        let weighted = values
            .iter()
            .zip(&weights)
            .map(|(v, w)| v * (w / total))
            .sum::<f64>();
        let confidence = (total / observations.len() as f64).min(1.0);

        (with_numeric(&observations[heaviest], weighted), confidence)
    }

    fn median(&self, observations: &[OracleDataPoint]) -> (Value, f64) {
        let Some(values) = numeric_values(observations) else {
            let mid = observations.len() / 2;
            return (observations[mid].value.clone(), MEDIAN_FALLBACK_CONFIDENCE);
        };

        let mut ranked: Vec<(usize, f64)> = values.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mid = ranked.len() / 2;
        let median = if ranked.len() % 2 == 0 {
            ranked[mid - 1].1 / 2.0 + ranked[mid].1 / 2.0
        } else {
            ranked[mid].1
        };

        (
            with_numeric(&observations[ranked[mid].0], median),
            MEDIAN_CONFIDENCE,
        )
    }
}

/// Numeric field of every observation, or `None` if any one lacks it
fn numeric_values(observations: &[OracleDataPoint]) -> Option<Vec<f64>> {
    observations.iter().map(OracleDataPoint::numeric_value).collect()
}

/// Arithmetic mean that stays finite for finite inputs near `f64::MAX`
fn mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    if sum.is_finite() {
        sum / n
    } else {
        values.iter().map(|v| v / n).sum()
    }
}

/// Copy of the observation's payload with its numeric field replaced
fn with_numeric(template: &OracleDataPoint, x: f64) -> Value {
    let Some(field) = template.category.numeric_field() else {
        return template.value.clone();
    };
    let number = Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null);

    match &template.value {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert(field.to_string(), number);
            Value::Object(map)
        }
        _ => serde_json::json!({ field: number }),
    }
}
