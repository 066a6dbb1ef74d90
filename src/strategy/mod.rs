//! Strategy layer: value detection and stake limits.

pub mod risk;
pub mod value;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use risk::DailyLossGuard;
pub use value::{ProbabilityEstimates, ValueAnalysis, ValueBettingStrategy, ValueConfig};

/// Externally supplied win probabilities, keyed by match id then selection
/// name. Serialised as `{"<match_id>": {"<selection>": 0.62, ...}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EstimateBook {
    matches: HashMap<String, ProbabilityEstimates>,
}

impl EstimateBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, match_id: impl Into<String>, estimates: ProbabilityEstimates) {
        self.matches.insert(match_id.into(), estimates);
    }

    pub fn for_match(&self, match_id: &str) -> Option<&ProbabilityEstimates> {
        self.matches.get(match_id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl FromIterator<(String, ProbabilityEstimates)> for EstimateBook {
    fn from_iter<I: IntoIterator<Item = (String, ProbabilityEstimates)>>(iter: I) -> Self {
        Self {
            matches: iter.into_iter().collect(),
        }
    }
}

/// Convenience for building estimates from `(selection, probability)` pairs.
pub fn estimates_from<'a>(pairs: impl IntoIterator<Item = (&'a str, Decimal)>) -> ProbabilityEstimates {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
