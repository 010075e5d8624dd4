//! Outbound messaging abstractions (Telegram today, any chat transport later).

pub mod port;
pub mod throttled;
