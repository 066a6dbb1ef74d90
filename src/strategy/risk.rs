//! Daily loss limit.
//!
//! A back bet can lose at most its stake, so the worst-case loss for a day
//! is the sum of stakes committed that day (UTC). The tally resets when the
//! date rolls over.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::types::ExchangeError;

#[derive(Debug, Clone)]
pub struct DailyLossGuard {
    max_daily_loss: Decimal,
    committed: Decimal,
    day: NaiveDate,
}

impl DailyLossGuard {
    pub fn new(max_daily_loss: Decimal) -> Self {
        Self::starting(max_daily_loss, Utc::now().date_naive())
    }

    /// Guard that has already committed `committed` today, e.g. stakes of
    /// bets placed by an earlier run.
    pub fn with_committed(max_daily_loss: Decimal, committed: Decimal) -> Self {
        Self {
            committed,
            ..Self::new(max_daily_loss)
        }
    }

    fn starting(max_daily_loss: Decimal, day: NaiveDate) -> Self {
        Self {
            max_daily_loss,
            committed: Decimal::ZERO,
            day,
        }
    }

    pub fn max_daily_loss(&self) -> Decimal {
        self.max_daily_loss
    }

    /// Stakes committed today.
    pub fn committed(&self) -> Decimal {
        self.committed
    }

    pub fn remaining(&self) -> Decimal {
        (self.max_daily_loss - self.committed).max(Decimal::ZERO)
    }

    pub fn check(&mut self, stake: Decimal) -> Result<(), ExchangeError> {
        self.check_on(stake, Utc::now().date_naive())
    }

    pub fn record(&mut self, stake: Decimal) {
        self.record_on(stake, Utc::now().date_naive());
    }

    /// Refuse `stake` if it would take today's committed total past the limit.
    pub fn check_on(&mut self, stake: Decimal, today: NaiveDate) -> Result<(), ExchangeError> {
        self.roll(today);
        let after = self.committed + stake;
        if after > self.max_daily_loss {
            warn!(
                stake = %stake,
                committed = %self.committed,
                limit = %self.max_daily_loss,
                "Daily loss limit reached"
            );
            return Err(ExchangeError::RiskLimit(format!(
                "stake {stake} would take today's exposure to {after}, above the limit of {}",
                self.max_daily_loss
            )));
        }
        Ok(())
    }

    pub fn record_on(&mut self, stake: Decimal, today: NaiveDate) {
        self.roll(today);
        self.committed += stake;
    }

    fn roll(&mut self, today: NaiveDate) {
        if today != self.day {
            info!(previous = %self.day, committed = %self.committed, "New trading day, resetting loss tally");
            self.day = today;
            self.committed = Decimal::ZERO;
        }
    }
}
