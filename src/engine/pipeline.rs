//! One end-to-end run against the backoffice.
//!
//! authenticate → profile → sports → matches → markets → snapshots →
//! value scan → execution.
//!
//! Authentication, profile and matches are required; if one fails, the run
//! stops. Sports and individual market fetches are recorded as failures and
//! the run carries on.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::executor::{ExecutionReport, Executor};
use crate::exchange::ApiGateway;
use crate::storage::SnapshotStore;
use crate::strategy::{EstimateBook, ValueAnalysis, ValueBettingStrategy};
use crate::types::{Market, Match};

/// Outcome of a single pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub name: String,
    pub success: bool,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
    pub aborted: bool,
    pub value_bets: Vec<ValueAnalysis>,
    pub execution: Option<ExecutionReport>,
}

impl RunReport {
    fn ok(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.steps.push(StepRecord {
            name: name.into(),
            success: true,
            detail: detail.into(),
        });
    }

    fn fail(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        let record = StepRecord {
            name: name.into(),
            success: false,
            detail: detail.into(),
        };
        warn!(step = %record.name, detail = %record.detail, "Step failed");
        self.steps.push(record);
    }

    fn abort(mut self, name: &str, detail: impl Into<String>) -> Self {
        self.fail(name, detail);
        error!(step = name, "Run aborted");
        self.aborted = true;
        self
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| !s.success)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Only fetch matches for this sport.
    pub sport_id: Option<i64>,
    /// Pause between consecutive market requests.
    pub request_delay: Duration,
}

pub struct Pipeline {
    gateway: Arc<ApiGateway>,
    snapshots: Option<Arc<SnapshotStore>>,
    strategy: ValueBettingStrategy,
    estimates: EstimateBook,
    executor: Executor,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<ApiGateway>,
        strategy: ValueBettingStrategy,
        estimates: EstimateBook,
        executor: Executor,
        options: PipelineOptions,
    ) -> Self {
        Self {
            gateway,
            snapshots: None,
            strategy,
            estimates,
            executor,
            options,
        }
    }

    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub async fn run(&mut self) -> RunReport {
        let mut report = RunReport::default();
        info!(dry_run = self.executor.is_dry_run(), "Starting run");

        // 1. Authenticate
        if !self.gateway.session().ensure_authenticated().await {
            return report.abort("authenticate", "login failed");
        }
        report.ok("authenticate", self.gateway.session().username());

        // 2. Profile
        match self.gateway.get_profile().await {
            Ok(profile) => {
                info!(
                    username = %profile.username,
                    available_to_bet = %profile.available_to_bet,
                    currency = profile.primary_currency().unwrap_or("-"),
                    joined = %profile.joined_date.format("%Y-%m-%d"),
                    "Account"
                );
                report.ok("profile", profile.username);
            }
            Err(e) => return report.abort("profile", e.to_string()),
        }

        // 3. Sports
        match self.gateway.get_sport_details().await {
            Ok(sports) => report.ok("sports", format!("{} sports", sports.len())),
            Err(e) => report.fail("sports", e.to_string()),
        }

        // 4. Matches
        let matches = match self.gateway.get_matches(self.options.sport_id).await {
            Ok(resp) => resp.matches,
            Err(e) => return report.abort("matches", e.to_string()),
        };
        report.ok("matches", format!("{} matches", matches.len()));

        // 5. Markets
        let markets = self.fetch_markets(&matches, &mut report).await;

        // 6. Snapshots
        self.save_snapshots(&matches, &markets);

        // 7. Value scan
        let value_bets = self.scan(&markets, &mut report);
        report.value_bets = value_bets;

        // 8. Execution
        let execution = self.executor.execute_batch(&report.value_bets).await;
        report.ok(
            "execute",
            format!("{} placed, {} failed", execution.executed.len(), execution.failed.len()),
        );
        report.execution = Some(execution);

        info!(
            steps = report.steps.len(),
            failures = report.failures().count(),
            value_bets = report.value_bets.len(),
            "Run complete"
        );
        report
    }

    async fn fetch_markets(
        &self,
        matches: &[Match],
        report: &mut RunReport,
    ) -> Vec<(String, Vec<Market>)> {
        let mut fetched = Vec::with_capacity(matches.len());

        for (i, m) in matches.iter().enumerate() {
            if i > 0 && !self.options.request_delay.is_zero() {
                tokio::time::sleep(self.options.request_delay).await;
            }
            match self.gateway.get_markets(&m.id).await {
                Ok(resp) => fetched.push((m.id.clone(), resp.markets)),
                Err(e) => report.fail(format!("markets:{}", m.id), e.to_string()),
            }
        }

        report.ok(
            "markets",
            format!("{} of {} matches", fetched.len(), matches.len()),
        );
        fetched
    }

    fn save_snapshots(&self, matches: &[Match], markets: &[(String, Vec<Market>)]) {
        let Some(store) = &self.snapshots else {
            return;
        };
        let today = Utc::now().date_naive();

        if let Err(e) = store.save_matches(matches, today) {
            warn!(error = %e, "Failed to save matches snapshot");
        }
        for (match_id, match_markets) in markets {
            if let Err(e) = store.save_match_markets(match_id, match_markets, today) {
                warn!(match_id = %match_id, error = %e, "Failed to save markets snapshot");
            }
        }
    }

    fn scan(&self, markets: &[(String, Vec<Market>)], report: &mut RunReport) -> Vec<ValueAnalysis> {
        let mut value_bets = Vec::new();

        for (match_id, match_markets) in markets {
            let Some(estimates) = self.estimates.for_match(match_id) else {
                continue;
            };
            for market in match_markets {
                match self.strategy.find_value_bets(market, estimates) {
                    Ok(found) => value_bets.extend(found),
                    Err(e) => report.fail(format!("scan:{}", market.id), e.to_string()),
                }
            }
        }

        report.ok("scan", format!("{} value bets", value_bets.len()));
        value_bets
    }
}
