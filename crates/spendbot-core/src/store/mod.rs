//! Persistence port.
//!
//! Two logical tables: users (external chat id, daily report time) and an append-only
//! expense log. Implementations must make user creation atomic with respect to expense
//! insertion so concurrent first messages never produce duplicate users.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::{
    domain::{DailyTime, ExpenseRecord, ParsedExpense, UserId, UserSettings},
    Result,
};

pub use sqlite::SqliteStore;

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Fetch the user's settings row, creating it with the default time if missing.
    async fn get_or_create_user(&self, user_id: UserId) -> Result<UserSettings>;

    /// Create-or-update the user's daily report time.
    async fn set_daily_time(&self, user_id: UserId, time: DailyTime) -> Result<()>;

    /// Append an expense stamped with the local wall-clock time `at`.
    async fn append_expense(
        &self,
        user_id: UserId,
        expense: ParsedExpense,
        at: DateTime<FixedOffset>,
    ) -> Result<ExpenseRecord>;

    /// Expenses with `start <= created_at <= end` (local wall-clock), oldest first.
    async fn query_expenses(
        &self,
        user_id: UserId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<ExpenseRecord>>;

    async fn list_all_users(&self) -> Result<Vec<UserSettings>>;
}
