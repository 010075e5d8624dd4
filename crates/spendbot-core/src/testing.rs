//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tokio::sync::Mutex;

use crate::{
    clock::Clock,
    domain::UserId,
    messaging::port::{MessagingCapabilities, MessagingPort},
    Error, Result,
};

/// Messenger that records every send; can be switched to fail.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(UserId, String)>>,
    fail: AtomicBool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        let m = Self::default();
        m.set_failing(true);
        m
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn last_text(&self) -> String {
        self.sent
            .lock()
            .await
            .last()
            .map(|(_, t)| t.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, user_id: UserId, html: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::External("network down".to_string()));
        }
        self.sent.lock().await.push((user_id, html.to_string()));
        Ok(())
    }
}

/// A clock pinned to a fixed instant, movable by hand.
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
