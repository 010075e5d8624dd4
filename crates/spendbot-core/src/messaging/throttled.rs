use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::UserId,
    messaging::port::{MessagingCapabilities, MessagingPort},
    Result,
};

/// Per-chat limiters are pruned once the map holds this many chats.
const PRUNE_AT: usize = 1024;

type ChatLimiters = HashMap<i64, Arc<Mutex<IntervalLimiter>>>;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two sends (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between sends to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound sends.
///
/// Daily reports tend to cluster on the same minute (20:00 is the default), so a
/// burst of scheduled dispatches is smoothed here instead of tripping Telegram 429s.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<ChatLimiters>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if let Some(lim) = map.get(&chat_id) {
            return lim.clone();
        }
        if map.len() >= PRUNE_AT {
            prune_idle(&mut map, Instant::now());
        }
        let lim = Arc::new(Mutex::new(IntervalLimiter::new(
            self.cfg.per_chat_min_interval,
        )));
        map.insert(chat_id, lim.clone());
        lim
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

/// Drop limiters whose reserved slot has passed; such a limiter behaves like a new one.
/// Limiters still referenced by an in-flight send are kept.
fn prune_idle(map: &mut ChatLimiters, now: Instant) {
    map.retain(|_, lim| {
        if Arc::strong_count(lim) > 1 {
            return true;
        }
        match lim.try_lock() {
            Ok(l) => l.next > now,
            Err(_) => true,
        }
    });
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(&self, user_id: UserId, html: &str) -> Result<()> {
        self.throttle_chat(user_id.0).await;
        self.inner.send_html(user_id, html).await
    }
}
