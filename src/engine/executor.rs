//! Bet executor.
//!
//! Turns value analyses into placed bets. Every bet passes the daily loss
//! guard first. In dry-run mode bets are logged and counted but never sent.
//! Live bets are sent exactly once; a failed placement is reported, not
//! retried. A placement that times out or loses its connection still counts
//! against the loss limit.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};

use crate::exchange::ApiGateway;
use crate::storage::SnapshotStore;
use crate::strategy::{DailyLossGuard, ValueAnalysis};
use crate::types::{BetResponse, ExchangeError};

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// Result of executing a batch of value bets.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub executed: Vec<ExecutedBet>,
    pub failed: Vec<FailedBet>,
    pub total_staked: Decimal,
}

#[derive(Debug, Clone)]
pub struct ExecutedBet {
    pub selection_id: String,
    pub selection_name: String,
    pub stake: Decimal,
    pub odds: Decimal,
    /// `None` for dry-run bets.
    pub response: Option<BetResponse>,
}

#[derive(Debug, Clone)]
pub struct FailedBet {
    pub selection_id: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    gateway: Arc<ApiGateway>,
    snapshots: Option<Arc<SnapshotStore>>,
    guard: DailyLossGuard,
    dry_run: bool,
}

impl Executor {
    pub fn new(gateway: Arc<ApiGateway>, guard: DailyLossGuard, dry_run: bool) -> Self {
        Self {
            gateway,
            snapshots: None,
            guard,
            dry_run,
        }
    }

    /// Also write a snapshot of every placed bet.
    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn guard(&self) -> &DailyLossGuard {
        &self.guard
    }

    /// Execute value bets in order.
    pub async fn execute_batch(&mut self, bets: &[ValueAnalysis]) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        if bets.is_empty() {
            return report;
        }

        info!(count = bets.len(), dry_run = self.dry_run, "Executing batch");

        for analysis in bets {
            let bet = analysis.to_bet();

            if let Err(e) = self.guard.check(bet.stake) {
                report.failed.push(FailedBet {
                    selection_id: bet.selection_id,
                    reason: e.to_string(),
                });
                continue;
            }

            if self.dry_run {
                info!(
                    selection = %analysis.selection.name,
                    odds = %bet.odds,
                    stake = %bet.stake,
                    edge = format!("{:.2}%", analysis.edge * dec!(100)),
                    "[DRY RUN] Would place bet"
                );
                self.guard.record(bet.stake);
                report.total_staked += bet.stake;
                report.executed.push(ExecutedBet {
                    selection_id: bet.selection_id,
                    selection_name: analysis.selection.name.clone(),
                    stake: bet.stake,
                    odds: bet.odds,
                    response: None,
                });
                continue;
            }

            match self.gateway.place_bet(&bet).await {
                Ok(response) => {
                    self.guard.record(bet.stake);
                    report.total_staked += bet.stake;
                    if let Some(store) = &self.snapshots {
                        if let Err(e) = store.save_bet(&response, Utc::now().date_naive()) {
                            warn!(bet_id = %response.id, error = %e, "Failed to snapshot bet");
                        }
                    }
                    report.executed.push(ExecutedBet {
                        selection_id: bet.selection_id,
                        selection_name: analysis.selection.name.clone(),
                        stake: bet.stake,
                        odds: bet.odds,
                        response: Some(response),
                    });
                }
                // No response: the exchange may still have taken the bet,
                // so its stake stays committed against the daily limit.
                Err(e @ (ExchangeError::Timeout { .. } | ExchangeError::Network { .. })) => {
                    warn!(
                        selection = %analysis.selection.name,
                        error = %e,
                        "Bet placement outcome unknown"
                    );
                    self.guard.record(bet.stake);
                    report.failed.push(FailedBet {
                        selection_id: bet.selection_id,
                        reason: format!("outcome unknown: {e}"),
                    });
                }
                Err(e) => {
                    warn!(
                        selection = %analysis.selection.name,
                        error = %e,
                        "Bet placement failed"
                    );
                    report.failed.push(FailedBet {
                        selection_id: bet.selection_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            staked = %report.total_staked,
            "Batch execution complete"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
