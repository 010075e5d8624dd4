/// Core error type for the expense bot.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can handle failures consistently (user-facing reply vs logged failure).
/// Every variant is scoped to the single request or user it affects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("could not parse expense: {0:?}")]
    ParseRejected(String),

    #[error("invalid time format: {0:?} (expected HH:MM)")]
    InvalidTimeFormat(String),

    #[error("store unavailable: {0}")]
    Store(String),

    #[error("amount overflow while summing {0}")]
    AmountOverflow(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("scheduler registration failed for user {user_id}: {reason}")]
    SchedulerRegistration { user_id: i64, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Store(format!("store task join error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
