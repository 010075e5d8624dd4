//! Wall-clock access.
//!
//! Everything that needs "now" or "today" goes through [`Clock`] so tests can pin time.

use chrono::{DateTime, FixedOffset, Local, NaiveDate};

pub trait Clock: Send + Sync {
    /// Local wall-clock time, with the UTC offset in effect.
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Host clock in the process's local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let now = Local::now();
        now.with_timezone(now.offset())
    }
}
