//! Core domain + application logic for the expense tracking bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! messaging port in the adapter crate; SQLite lives behind the store port.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod parser;
pub mod scheduler;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
