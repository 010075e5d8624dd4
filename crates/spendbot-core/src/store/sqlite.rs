use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    domain::{DailyTime, ExpenseRecord, ParsedExpense, UserId, UserSettings, UNCATEGORIZED},
    errors::Error,
    store::ExpenseStore,
    Result,
};

/// Fixed-width so lexicographic order equals chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  chat_id INTEGER NOT NULL UNIQUE,
  daily_time TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS expenses (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL,
  amount TEXT NOT NULL,
  category TEXT NOT NULL,
  note TEXT NOT NULL DEFAULT '',
  created_at TEXT NOT NULL,
  utc_offset_secs INTEGER NOT NULL DEFAULT 0,
  FOREIGN KEY(user_id) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_expenses_user_created ON expenses(user_id, created_at);
";

/// SQLite-backed store. One connection guarded by a mutex; every statement runs on
/// the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    default_time: DailyTime,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, default_time: DailyTime) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, default_time)
    }

    pub fn open_in_memory(default_time: DailyTime) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, default_time)
    }

    fn init(conn: Connection, default_time: DailyTime) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            default_time,
        })
    }

    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock_conn(&conn);
            f(&mut guard)
        })
        .await?
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match conn.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Insert the user if missing and return its internal id. Runs inside the caller's
/// transaction or connection lock.
fn ensure_user(conn: &Connection, user_id: UserId, default_time: DailyTime) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (chat_id, daily_time) VALUES (?1, ?2)
         ON CONFLICT(chat_id) DO NOTHING",
        params![user_id.0, default_time.to_string()],
    )?;
    let id = conn.query_row(
        "SELECT id FROM users WHERE chat_id = ?1",
        params![user_id.0],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn decode_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| Error::Store(format!("invalid stored amount {raw:?}: {e}")))
}

fn decode_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| Error::Store(format!("invalid stored timestamp {raw:?}: {e}")))
}

#[async_trait]
impl ExpenseStore for SqliteStore {
    async fn get_or_create_user(&self, user_id: UserId) -> Result<UserSettings> {
        let default_time = self.default_time;
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let internal_id = ensure_user(&tx, user_id, default_time)?;
            let raw: String = tx.query_row(
                "SELECT daily_time FROM users WHERE id = ?1",
                params![internal_id],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(UserSettings {
                internal_id,
                user_id,
                daily_time: DailyTime::parse_or_default(&raw),
            })
        })
        .await
    }

    async fn set_daily_time(&self, user_id: UserId, time: DailyTime) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users (chat_id, daily_time) VALUES (?1, ?2)
                 ON CONFLICT(chat_id) DO UPDATE SET daily_time = excluded.daily_time",
                params![user_id.0, time.to_string()],
            )?;
            debug!(user_id = user_id.0, daily_time = %time, "daily time stored");
            Ok(())
        })
        .await
    }

    async fn append_expense(
        &self,
        user_id: UserId,
        expense: ParsedExpense,
        at: DateTime<FixedOffset>,
    ) -> Result<ExpenseRecord> {
        let default_time = self.default_time;
        self.call(move |conn| {
            let category = match expense.category.trim() {
                "" => UNCATEGORIZED.to_string(),
                c => c.to_string(),
            };
            let created_at = at.naive_local();
            let utc_offset_secs = at.offset().local_minus_utc();

            let tx = conn.transaction()?;
            let internal_id = ensure_user(&tx, user_id, default_time)?;
            tx.execute(
                "INSERT INTO expenses (user_id, amount, category, note, created_at, utc_offset_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    internal_id,
                    expense.amount.to_string(),
                    category,
                    expense.note,
                    created_at.format(TIMESTAMP_FORMAT).to_string(),
                    utc_offset_secs,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(ExpenseRecord {
                id,
                user_id,
                amount: expense.amount,
                category,
                note: expense.note,
                created_at,
                utc_offset_secs,
            })
        })
        .await
    }

    async fn query_expenses(
        &self,
        user_id: UserId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<ExpenseRecord>> {
        self.call(move |conn| {
            let internal_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE chat_id = ?1",
                    params![user_id.0],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(internal_id) = internal_id else {
                return Ok(Vec::new());
            };

            let mut stmt = conn.prepare(
                "SELECT id, amount, category, note, created_at, utc_offset_secs
                 FROM expenses
                 WHERE user_id = ?1 AND created_at BETWEEN ?2 AND ?3
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(
                params![
                    internal_id,
                    start.format(TIMESTAMP_FORMAT).to_string(),
                    end.format(TIMESTAMP_FORMAT).to_string(),
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i32>(5)?,
                    ))
                },
            )?;

            let mut out = Vec::new();
            for row in rows {
                let (id, amount, category, note, created_at, utc_offset_secs) = row?;
                out.push(ExpenseRecord {
                    id,
                    user_id,
                    amount: decode_amount(&amount)?,
                    category,
                    note,
                    created_at: decode_timestamp(&created_at)?,
                    utc_offset_secs,
                });
            }
            Ok(out)
        })
        .await
    }

    async fn list_all_users(&self) -> Result<Vec<UserSettings>> {
        self.call(|conn| {
            let mut stmt = conn.prepare("SELECT id, chat_id, daily_time FROM users ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (internal_id, chat_id, raw) = row?;
                let user_id = UserId(chat_id);
                out.push(UserSettings {
                    internal_id,
                    user_id,
                    daily_time: DailyTime::parse_or_default(&raw),
                });
            }
            Ok(out)
        })
        .await
    }
}
