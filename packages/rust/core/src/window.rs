//! Trailing lookback window over publication dates.

use chrono::{NaiveDate, TimeDelta};
use drugwatch_shared::Clock;

/// The `days`-long window ending on `today`, inclusive of its cutoff.
///
/// The cutoff is fixed when the window is built, so one ingestion run
/// filters every row against the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    today: NaiveDate,
    cutoff: NaiveDate,
    days: i64,
}

impl LookbackWindow {
    pub fn ending(today: NaiveDate, days: i64) -> Self {
        let cutoff = today
            .checked_sub_signed(TimeDelta::days(days))
            .unwrap_or(NaiveDate::MIN);
        Self {
            today,
            cutoff,
            days,
        }
    }

    /// Window ending on the clock's current date.
    pub fn from_clock(clock: &dyn Clock, days: i64) -> Self {
        Self::ending(clock.today(), days)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Earliest publication date still inside the window.
    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.cutoff
    }
}
