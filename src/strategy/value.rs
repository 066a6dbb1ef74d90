//! Value detection.
//!
//! Compares externally supplied probability estimates with the exchange's
//! implied probability (`1 / decimal odds`) and sizes a stake for
//! selections with enough edge.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::types::{Bet, ExchangeError, Market, Selection};

/// Estimated win probability per selection name.
pub type ProbabilityEstimates = HashMap<String, Decimal>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds and sizing for value bets (overridden from config at runtime).
#[derive(Debug, Clone)]
pub struct ValueConfig {
    /// Minimum edge, e.g. 0.05 = five percentage points.
    pub min_value: Decimal,
    /// Shortest odds worth backing.
    pub min_odds: Decimal,
    /// Minimum estimated probability before we trust the estimate.
    pub confidence_threshold: Decimal,
    /// Stake cap per bet.
    pub max_stake: Decimal,
    /// Converts edge into a fraction of `max_stake`: stake = max_stake × edge × multiplier.
    pub stake_multiplier: Decimal,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            min_value: dec!(0.05),
            min_odds: dec!(1.5),
            confidence_threshold: dec!(0.7),
            max_stake: dec!(100),
            stake_multiplier: dec!(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Pure functions
// ---------------------------------------------------------------------------

fn check_odds(odds: Decimal) -> Result<(), ExchangeError> {
    if odds > Decimal::ONE {
        Ok(())
    } else {
        Err(ExchangeError::InvalidOdds(odds))
    }
}

/// `1 / odds`; odds must exceed 1.0.
pub fn implied_probability(odds: Decimal) -> Result<Decimal, ExchangeError> {
    check_odds(odds)?;
    Ok(Decimal::ONE / odds)
}

/// `our_probability - 1 / odds`.
///
/// The probability is deliberately not clamped to [0, 1]: a broken
/// estimate shows up as an absurd edge rather than being hidden.
pub fn edge(our_probability: Decimal, odds: Decimal) -> Result<Decimal, ExchangeError> {
    Ok(our_probability - implied_probability(odds)?)
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Outcome of analysing one selection. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAnalysis {
    pub selection: Selection,
    pub our_probability: Decimal,
    pub implied_probability: Decimal,
    pub edge: Decimal,
    pub is_value_bet: bool,
    pub recommended_stake: Decimal,
}

impl ValueAnalysis {
    /// Bet payload for this analysis at the quoted odds.
    pub fn to_bet(&self) -> Bet {
        Bet {
            selection_id: self.selection.id.clone(),
            stake: self.recommended_stake,
            odds: self.selection.odds,
        }
    }
}

pub struct ValueBettingStrategy {
    config: ValueConfig,
}

impl ValueBettingStrategy {
    pub fn new(config: ValueConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValueConfig {
        &self.config
    }

    /// Analyse one selection against our probability.
    ///
    /// Value requires all three: edge ≥ `min_value`, odds ≥ `min_odds`, and
    /// probability ≥ `confidence_threshold`.
    pub fn analyze_selection(
        &self,
        selection: &Selection,
        our_probability: Decimal,
    ) -> Result<ValueAnalysis, ExchangeError> {
        let implied = implied_probability(selection.odds)?;
        let edge = our_probability - implied;

        let is_value_bet = edge >= self.config.min_value
            && selection.odds >= self.config.min_odds
            && our_probability >= self.config.confidence_threshold;

        let recommended_stake = if is_value_bet {
            (self.config.max_stake * edge * self.config.stake_multiplier).min(self.config.max_stake)
        } else {
            Decimal::ZERO
        };

        debug!(
            selection = %selection.name,
            odds = %selection.odds,
            our_probability = %our_probability,
            edge = %edge,
            is_value_bet,
            "Selection analysed"
        );

        Ok(ValueAnalysis {
            selection: selection.clone(),
            our_probability,
            implied_probability: implied,
            edge,
            is_value_bet,
            recommended_stake,
        })
    }

    /// Value bets in a market, in selection order.
    ///
    /// Selections without an estimate are skipped. Invalid odds on any
    /// analysed selection fail the whole market.
    pub fn find_value_bets(
        &self,
        market: &Market,
        estimates: &ProbabilityEstimates,
    ) -> Result<Vec<ValueAnalysis>, ExchangeError> {
        let mut value_bets = Vec::new();

        for selection in &market.selections {
            let Some(&our_probability) = estimates.get(&selection.name) else {
                continue;
            };

            let analysis = self.analyze_selection(selection, our_probability)?;
            if analysis.is_value_bet {
                info!(
                    market = %market.name,
                    selection = %selection.name,
                    odds = %selection.odds,
                    edge = %format!("{:.2}%", analysis.edge * dec!(100)),
                    stake = %analysis.recommended_stake,
                    "Found value bet"
                );
                value_bets.push(analysis);
            }
        }

        Ok(value_bets)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
