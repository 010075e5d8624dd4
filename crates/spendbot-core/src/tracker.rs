//! Application context: the inbound command surface of the bot.
//!
//! One `ExpenseTracker` is built at startup and shared by every transport handler.
//! It owns the store, scheduler and dispatcher handles; nothing here is global.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    domain::{DailyTime, ExpenseRecord, UserId},
    formatting::{escape_html, format_added, ReportKind},
    messaging::port::MessagingPort,
    notifier::Notifier,
    parser::parse_expense,
    scheduler::DailyScheduler,
    store::ExpenseStore,
    Error, Result,
};

const USAGE_HTML: &str = "To add an expense send <code>500 taxi</code> or \
<code>/add 500 groceries bread</code>.\nCommands: /summary /settime HH:MM";
const SETTIME_USAGE: &str = "Usage: /settime HH:MM (for example /settime 20:00)";
const SETTIME_INVALID: &str = "Invalid format. Example: 20:00";
const SUMMARY_USAGE: &str = "Usage: /summary [YYYY-MM-DD]";
const TOTAL_TOO_LARGE: &str = "That day's total is too large to report. Check for mistyped amounts.";
const STORE_DOWN: &str = "⚠️ Could not reach storage right now. Please try again later.";

/// Commands understood by the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    SetTime,
    Summary,
    Add,
    Unknown(String),
}

impl Command {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "start" | "help" => Command::Start,
            "settime" => Command::SetTime,
            "summary" | "today" => Command::Summary,
            "add" => Command::Add,
            other => Command::Unknown(other.to_string()),
        }
    }
}

pub struct ExpenseTracker {
    store: Arc<dyn ExpenseStore>,
    messenger: Arc<dyn MessagingPort>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    scheduler: DailyScheduler,
}

impl ExpenseTracker {
    pub fn new(
        store: Arc<dyn ExpenseStore>,
        messenger: Arc<dyn MessagingPort>,
        clock: Arc<dyn Clock>,
        dispatch_concurrency: usize,
    ) -> Self {
        let notifier = Notifier::new(store.clone(), messenger.clone(), clock.clone());
        let scheduler = DailyScheduler::new(
            clock.clone(),
            Arc::new(notifier.clone()),
            dispatch_concurrency,
        );
        Self {
            store,
            messenger,
            clock,
            notifier,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &DailyScheduler {
        &self.scheduler
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Re-register every persisted user and start the scheduler.
    pub async fn start(&self) -> Result<usize> {
        let users = self.store.list_all_users().await?;
        let loaded = self.scheduler.load_all(&users).await;
        self.scheduler.start().await;
        Ok(loaded)
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    /// Free-text message from a user.
    pub async fn on_text(&self, user_id: UserId, text: &str) -> Result<()> {
        self.handle_expense(user_id, text).await
    }

    /// Slash command from a user; `name` has no leading `/` or `@bot` suffix.
    pub async fn on_command(&self, user_id: UserId, name: &str, args: &str) -> Result<()> {
        match Command::from_name(name) {
            Command::Start => self.cmd_start(user_id).await,
            Command::SetTime => self.cmd_settime(user_id, args).await,
            Command::Summary => self.cmd_summary(user_id, args).await,
            Command::Add => self.handle_expense(user_id, args).await,
            Command::Unknown(cmd) => {
                let msg = format!("Unknown command: /{}\n{USAGE_HTML}", escape_html(&cmd));
                self.reply(user_id, &msg).await
            }
        }
    }

    /// Parse and store an expense. Malformed text is `ParseRejected`, nothing stored.
    pub async fn record_expense(&self, user_id: UserId, text: &str) -> Result<ExpenseRecord> {
        let parsed =
            parse_expense(text).ok_or_else(|| Error::ParseRejected(text.trim().to_string()))?;
        let record = self
            .store
            .append_expense(user_id, parsed, self.clock.now())
            .await?;
        debug!(user_id = user_id.0, expense_id = record.id, "expense stored");
        self.ensure_registered(user_id).await;
        Ok(record)
    }

    /// Validate, persist, then reschedule. Invalid input never reaches store or scheduler.
    pub async fn set_daily_time(&self, user_id: UserId, raw: &str) -> Result<DailyTime> {
        let time: DailyTime = raw.parse()?;
        self.store.set_daily_time(user_id, time).await?;
        self.scheduler.upsert_time(user_id, time).await?;
        info!(user_id = user_id.0, daily_time = %time, "daily time updated");
        Ok(time)
    }

    /// Deliver a report for `day` (today when `None`) through the transport.
    /// A first-time user is created and registered for daily reports.
    pub async fn send_summary(&self, user_id: UserId, day: Option<NaiveDate>) -> Result<()> {
        let day = day.unwrap_or_else(|| self.clock.today());
        self.ensure_registered(user_id).await;
        self.notifier
            .dispatch(user_id, day, ReportKind::OnDemand)
            .await
    }

    async fn handle_expense(&self, user_id: UserId, text: &str) -> Result<()> {
        match self.record_expense(user_id, text).await {
            Ok(record) => self.reply(user_id, &format_added(&record)).await,
            Err(Error::ParseRejected(_)) => {
                let msg = format!("I didn't get that. {USAGE_HTML}");
                self.reply(user_id, &msg).await
            }
            Err(e) => self.fail(user_id, e).await,
        }
    }

    async fn cmd_start(&self, user_id: UserId) -> Result<()> {
        let settings = match self.store.get_or_create_user(user_id).await {
            Ok(s) => s,
            Err(e) => return self.fail(user_id, e).await,
        };
        self.scheduler
            .upsert_time(user_id, settings.daily_time)
            .await?;

        let msg = format!(
            "Hi! 👋 I'll help you keep track of your expenses.\n{USAGE_HTML}\n\n\
Daily report time: <b>{}</b> (local time).",
            settings.daily_time
        );
        self.reply(user_id, &msg).await
    }

    async fn cmd_settime(&self, user_id: UserId, args: &str) -> Result<()> {
        let Some(raw) = args.split_whitespace().next() else {
            return self.reply(user_id, SETTIME_USAGE).await;
        };

        match self.set_daily_time(user_id, raw).await {
            Ok(time) => {
                let msg = format!("Daily report time set to <b>{time}</b> (local time).");
                self.reply(user_id, &msg).await
            }
            Err(Error::InvalidTimeFormat(_)) => self.reply(user_id, SETTIME_INVALID).await,
            Err(e) => self.fail(user_id, e).await,
        }
    }

    async fn cmd_summary(&self, user_id: UserId, args: &str) -> Result<()> {
        let day = match args.split_whitespace().next() {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(_) => return self.reply(user_id, SUMMARY_USAGE).await,
            },
        };

        match self.send_summary(user_id, day).await {
            Ok(()) => Ok(()),
            Err(e @ Error::Store(_)) => self.fail(user_id, e).await,
            Err(Error::AmountOverflow(what)) => {
                warn!(user_id = user_id.0, sum = %what, "report total overflowed");
                self.reply(user_id, TOTAL_TOO_LARGE).await
            }
            Err(e) => {
                warn!(user_id = user_id.0, "on-demand report failed: {e}");
                Err(e)
            }
        }
    }

    /// Register a trigger for users first seen through an expense message.
    async fn ensure_registered(&self, user_id: UserId) {
        if self.scheduler.next_fire(user_id).await.is_some() {
            return;
        }
        let res = match self.store.get_or_create_user(user_id).await {
            Ok(settings) => {
                self.scheduler
                    .upsert_time(user_id, settings.daily_time)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            warn!(user_id = user_id.0, "could not register daily trigger: {e}");
        }
    }

    async fn reply(&self, user_id: UserId, html: &str) -> Result<()> {
        self.messenger.send_html(user_id, html).await
    }

    /// Tell the user the request failed (best-effort), then surface the error.
    async fn fail(&self, user_id: UserId, e: Error) -> Result<()> {
        warn!(user_id = user_id.0, "request failed: {e}");
        if matches!(e, Error::Store(_)) {
            let _ = self.reply(user_id, STORE_DOWN).await;
        }
        Err(e)
    }
}
