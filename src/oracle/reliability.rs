//! Reliability Registry - static per-source trust weights
//!
//! Loaded once at startup from built-in defaults overlaid with the
//! `[reliability]` config table. Read-only afterwards.

use std::collections::HashMap;

use crate::types::SourceId;

/// Weight returned for sources without an entry
pub const DEFAULT_RELIABILITY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ReliabilityRegistry {
    weights: HashMap<SourceId, f64>,
}

impl ReliabilityRegistry {
    /// Registry with no entries; every lookup yields `DEFAULT_RELIABILITY`
    pub fn empty() -> Self {
        Self {
            weights: HashMap::new(),
        }
    }

    /// Build from explicit weights, clamping each to [0, 1]
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (SourceId, f64)>,
    {
        Self {
            weights: weights
                .into_iter()
                .map(|(source, w)| (source, sanitize(w)))
                .collect(),
        }
    }

    /// Built-in defaults overlaid with config overrides keyed by source name.
    ///
    /// Unknown keys are logged and skipped.
    pub fn with_overrides(overrides: &HashMap<String, f64>) -> Self {
        let mut registry = Self::default();
        for (name, weight) in overrides {
            match name.parse::<SourceId>() {
                Ok(source) => {
                    let weight = sanitize(*weight);
                    tracing::debug!(source = %source, weight, "reliability override");
                    registry.weights.insert(source, weight);
                }
                Err(_) => {
                    tracing::warn!(key = %name, "ignoring reliability entry for unknown source");
                }
            }
        }
        registry
    }

    /// Trust weight for a source, in [0, 1]
    pub fn reliability_of(&self, source: SourceId) -> f64 {
        self.weights
            .get(&source)
            .copied()
            .unwrap_or(DEFAULT_RELIABILITY)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Default for ReliabilityRegistry {
    fn default() -> Self {
        Self::from_weights([
            (SourceId::Chainlink, 0.95),
            (SourceId::Coinbase, 0.90),
            (SourceId::Nasa, 0.90),
            (SourceId::OpenWeather, 0.85),
            (SourceId::OpenMeteo, 0.80),
        ])
    }
}

fn sanitize(weight: f64) -> f64 {
    if weight.is_nan() {
        DEFAULT_RELIABILITY
    } else {
        weight.clamp(0.0, 1.0)
    }
}
