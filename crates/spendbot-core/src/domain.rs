use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tracing::warn;

use crate::errors::Error;

/// Label applied when an expense carries no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Opaque per-user identity (the Telegram chat id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local time of day (24h) at which a user's daily report fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DailyTime {
    hour: u8,
    minute: u8,
}

impl DailyTime {
    pub const DEFAULT: DailyTime = DailyTime {
        hour: 20,
        minute: 0,
    };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    /// Parse, falling back to 20:00 (with a warning) when the input is not a valid `HH:MM`.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.parse() {
            Ok(t) => t,
            Err(_) => {
                warn!(raw, fallback = %Self::DEFAULT, "invalid daily time; using fallback");
                Self::DEFAULT
            }
        }
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl Default for DailyTime {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Accepts `H:MM` or `HH:MM`; the minute always needs two digits.
impl FromStr for DailyTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidTimeFormat(s.to_string());
        let raw = s.trim();

        let (h, m) = raw.split_once(':').ok_or_else(invalid)?;
        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(h) || !all_digits(m) || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }

        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

/// A user's settings row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSettings {
    pub internal_id: i64,
    pub user_id: UserId,
    pub daily_time: DailyTime,
}

/// Output of the expense parser, not yet persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedExpense {
    pub amount: Decimal,
    pub category: String,
    pub note: String,
}

/// One persisted expense. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseRecord {
    pub id: i64,
    pub user_id: UserId,
    pub amount: Decimal,
    pub category: String,
    pub note: String,
    /// Local wall-clock time at insertion.
    pub created_at: NaiveDateTime,
    /// UTC offset that was in effect when `created_at` was taken.
    pub utc_offset_secs: i32,
}

/// Inclusive local wall-clock bounds of a calendar day.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    let end = day.and_time(
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN),
    );
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_time_accepts_padded_and_short_hour() {
        assert_eq!("20:00".parse::<DailyTime>().unwrap(), DailyTime::DEFAULT);
        let t: DailyTime = "9:05".parse().unwrap();
        assert_eq!(t.to_string(), "09:05");
        assert_eq!(" 23:59 ".parse::<DailyTime>().unwrap().to_string(), "23:59");
        assert_eq!("00:00".parse::<DailyTime>().unwrap().to_string(), "00:00");
    }

    #[test]
    fn daily_time_rejects_malformed() {
        for raw in ["9:5", "25:99", "24:00", "12:60", "20", "", "ab:cd", "123:00", "-1:00", "12:5a"] {
            assert!(
                matches!(raw.parse::<DailyTime>(), Err(Error::InvalidTimeFormat(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn daily_time_fallback_is_eight_pm() {
        assert_eq!(DailyTime::parse_or_default("nope").to_string(), "20:00");
        assert_eq!(DailyTime::parse_or_default("07:30").to_string(), "07:30");
    }

    #[test]
    fn day_bounds_cover_whole_day() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (start, end) = day_bounds(day);
        assert_eq!(start.to_string(), "2026-03-01 00:00:00");
        assert_eq!(end.date(), day);
        assert!(end > day.and_hms_opt(23, 59, 59).unwrap());
    }
}
