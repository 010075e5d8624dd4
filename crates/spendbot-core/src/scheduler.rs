//! Per-user daily report scheduler.
//!
//! - One recurring trigger per user, firing every day at the user's local `HH:MM`
//! - A single driver task sleeps until the earliest deadline in a min-heap
//! - `upsert` / `remove` are O(log n): superseded heap entries are skipped lazily
//!   by comparing generations
//! - Each fire is dispatched on its own task (bounded by a semaphore), so a slow
//!   send never delays other users' triggers
//!
//! Firing never changes trigger state; a trigger stays scheduled until removed.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::{
    sync::{Mutex, Notify, Semaphore},
    task::JoinHandle,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    clock::Clock,
    domain::{DailyTime, UserId, UserSettings},
    Error, Result,
};

/// Upper bound on a single driver sleep, so wall-clock jumps (DST, NTP, suspend)
/// are noticed within a minute.
const MAX_IDLE_WAIT: Duration = Duration::from_secs(60);

/// Invoked once per trigger fire, on its own task.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn on_fire(&self, user_id: UserId);
}

#[derive(Clone)]
pub struct DailyScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    clock: Arc<dyn Clock>,
    handler: Arc<dyn TriggerHandler>,
    permits: Arc<Semaphore>,
    wake: Notify,
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    triggers: HashMap<UserId, Trigger>,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    next_generation: u64,

    driver: Option<JoinHandle<()>>,
    driver_cancel: Option<CancellationToken>,
}

struct Trigger {
    time: DailyTime,
    generation: u64,
    next_fire: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    at: NaiveDateTime,
    generation: u64,
    user_id: UserId,
}

impl SchedulerState {
    fn insert(&mut self, user_id: UserId, time: DailyTime, next_fire: NaiveDateTime) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.triggers.insert(
            user_id,
            Trigger {
                time,
                generation,
                next_fire,
            },
        );
        self.queue.push(Reverse(QueueEntry {
            at: next_fire,
            generation,
            user_id,
        }));
        self.compact_if_bloated();
    }

    /// Pop every live entry due at `now`, re-arm it for its next day, return the users.
    fn take_due(&mut self, now: NaiveDateTime) -> Vec<UserId> {
        let mut fired = Vec::new();
        loop {
            let due = matches!(self.queue.peek(), Some(Reverse(e)) if e.at <= now);
            if !due {
                break;
            }
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };
            let Some(trigger) = self.triggers.get_mut(&entry.user_id) else {
                continue;
            };
            if trigger.generation != entry.generation {
                continue;
            }

            fired.push(entry.user_id);
            match next_fire_after(trigger.time, now) {
                Some(next) => {
                    trigger.next_fire = next;
                    self.queue.push(Reverse(QueueEntry {
                        at: next,
                        generation: entry.generation,
                        user_id: entry.user_id,
                    }));
                }
                None => {
                    error!(user_id = entry.user_id.0, "no next fire time; dropping trigger");
                    self.triggers.remove(&entry.user_id);
                }
            }
        }
        fired
    }

    fn next_deadline(&self) -> Option<NaiveDateTime> {
        self.queue.peek().map(|Reverse(e)| e.at)
    }

    fn compact_if_bloated(&mut self) {
        if self.queue.len() <= self.triggers.len() * 2 + 64 {
            return;
        }
        self.queue = self
            .triggers
            .iter()
            .map(|(user_id, t)| {
                Reverse(QueueEntry {
                    at: t.next_fire,
                    generation: t.generation,
                    user_id: *user_id,
                })
            })
            .collect();
    }
}

/// First occurrence of `time` strictly after `now`.
pub fn next_fire_after(time: DailyTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let today = now.date().and_time(time.as_naive_time());
    if today > now {
        return Some(today);
    }
    Some(now.date().succ_opt()?.and_time(time.as_naive_time()))
}

impl DailyScheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        handler: Arc<dyn TriggerHandler>,
        max_concurrent_dispatches: usize,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                clock,
                handler,
                permits: Arc::new(Semaphore::new(max_concurrent_dispatches.max(1))),
                wake: Notify::new(),
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Register or replace the user's trigger from a raw `HH:MM` string.
    ///
    /// Invalid input falls back to 20:00 so the engine always holds a valid trigger.
    /// Returns the time actually scheduled.
    pub async fn upsert(&self, user_id: UserId, hhmm: &str) -> Result<DailyTime> {
        let time = DailyTime::parse_or_default(hhmm);
        self.upsert_time(user_id, time).await?;
        Ok(time)
    }

    /// Register or replace the user's trigger. Any pending firing of the old
    /// registration is cancelled; a dispatch already running is left alone.
    pub async fn upsert_time(&self, user_id: UserId, time: DailyTime) -> Result<()> {
        let now = self.inner.clock.now().naive_local();
        let next = next_fire_after(time, now).ok_or_else(|| Error::SchedulerRegistration {
            user_id: user_id.0,
            reason: format!("no occurrence of {time} after {now}"),
        })?;

        {
            let mut st = self.inner.state.lock().await;
            st.insert(user_id, time, next);
        }
        self.inner.wake.notify_one();

        debug!(user_id = user_id.0, daily_time = %time, next_fire = %next, "trigger scheduled");
        Ok(())
    }

    /// Cancel the user's trigger. No-op when none is registered.
    pub async fn remove(&self, user_id: UserId) -> bool {
        let removed = {
            let mut st = self.inner.state.lock().await;
            st.triggers.remove(&user_id).is_some()
        };
        if removed {
            self.inner.wake.notify_one();
            debug!(user_id = user_id.0, "trigger removed");
        }
        removed
    }

    /// Register every persisted user. A failing user is logged and skipped.
    pub async fn load_all(&self, users: &[UserSettings]) -> usize {
        let mut loaded = 0usize;
        for u in users {
            match self.upsert_time(u.user_id, u.daily_time).await {
                Ok(()) => loaded += 1,
                Err(e) => error!(user_id = u.user_id.0, "failed to register trigger: {e}"),
            }
        }
        info!(count = loaded, "daily triggers loaded");
        loaded
    }

    /// Start the driver task, if not already running.
    pub async fn start(&self) {
        let mut st = self.inner.state.lock().await;
        if st.driver.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let tok = CancellationToken::new();
        st.driver_cancel = Some(tok.clone());
        let scheduler = self.clone();
        st.driver = Some(tokio::spawn(async move {
            scheduler.drive(tok).await;
        }));
        info!("scheduler started");
    }

    /// Stop the driver and drop every pending trigger.
    pub async fn stop(&self) {
        let mut st = self.inner.state.lock().await;
        if let Some(tok) = st.driver_cancel.take() {
            tok.cancel();
        }
        if let Some(handle) = st.driver.take() {
            handle.abort();
        }
        st.triggers.clear();
        st.queue.clear();
        info!("scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        let st = self.inner.state.lock().await;
        st.driver.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Fire everything due at the clock's current time; returns the users fired.
    pub async fn tick(&self) -> Vec<UserId> {
        let now = self.inner.clock.now().naive_local();
        let fired = {
            let mut st = self.inner.state.lock().await;
            st.take_due(now)
        };
        for user_id in fired.iter().copied() {
            self.spawn_dispatch(user_id);
        }
        fired
    }

    pub async fn next_fire(&self, user_id: UserId) -> Option<NaiveDateTime> {
        let st = self.inner.state.lock().await;
        st.triggers.get(&user_id).map(|t| t.next_fire)
    }

    /// Active registrations, sorted by user.
    pub async fn registrations(&self) -> Vec<(UserId, DailyTime)> {
        let st = self.inner.state.lock().await;
        let mut out: Vec<_> = st.triggers.iter().map(|(u, t)| (*u, t.time)).collect();
        out.sort();
        out
    }

    fn spawn_dispatch(&self, user_id: UserId) {
        let handler = self.inner.handler.clone();
        let permits = self.inner.permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            handler.on_fire(user_id).await;
        });
    }

    async fn drive(&self, cancel: CancellationToken) {
        loop {
            let fired = self.tick().await;
            if !fired.is_empty() {
                debug!(count = fired.len(), "triggers fired");
            }

            let now = self.inner.clock.now().naive_local();
            let deadline = { self.inner.state.lock().await.next_deadline() };
            let wait = deadline
                .map(|d| (d - now).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(MAX_IDLE_WAIT)
                .min(MAX_IDLE_WAIT);

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = self.inner.wake.notified() => {}
              _ = sleep(wait) => {}
            }
        }
    }
}
