//! Notification dispatcher: query a day's expenses, aggregate, format, send.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::{
    aggregate::{summarize, Summary},
    clock::Clock,
    domain::{day_bounds, UserId},
    formatting::{format_report, ReportKind},
    messaging::port::MessagingPort,
    scheduler::TriggerHandler,
    store::ExpenseStore,
    Error, Result,
};

#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn ExpenseStore>,
    messenger: Arc<dyn MessagingPort>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn ExpenseStore>,
        messenger: Arc<dyn MessagingPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            messenger,
            clock,
        }
    }

    pub async fn summary_for(&self, user_id: UserId, day: NaiveDate) -> Result<Summary> {
        let (start, end) = day_bounds(day);
        let records = self.store.query_expenses(user_id, start, end).await?;
        summarize(&records)
    }

    /// Build the report for `day` and hand it to the transport. Not retried.
    pub async fn dispatch(&self, user_id: UserId, day: NaiveDate, kind: ReportKind) -> Result<()> {
        let summary = self.summary_for(user_id, day).await?;
        let max_len = self.messenger.capabilities().max_message_len;
        let text = format_report(kind, day, &summary, max_len);

        self.messenger
            .send_html(user_id, &text)
            .await
            .map_err(|e| Error::Dispatch(format!("report to {user_id}: {e}")))?;

        info!(
            user_id = user_id.0,
            day = %day,
            categories = summary.by_category.len(),
            "report delivered"
        );
        Ok(())
    }
}

#[async_trait]
impl TriggerHandler for Notifier {
    async fn on_fire(&self, user_id: UserId) {
        let today = self.clock.today();
        if let Err(e) = self.dispatch(user_id, today, ReportKind::Scheduled).await {
            warn!(user_id = user_id.0, "scheduled report failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, TimeZone};
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        domain::{DailyTime, ParsedExpense},
        store::SqliteStore,
        testing::{FixedClock, RecordingMessenger},
    };

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 6, 10, 20, 0, 0)
            .unwrap()
    }

    async fn notifier(outbox: Arc<RecordingMessenger>) -> Notifier {
        let store = Arc::new(SqliteStore::open_in_memory(DailyTime::DEFAULT).unwrap());
        for (amount, category) in [(500, "taxi"), (300, "food")] {
            store
                .append_expense(
                    UserId(1),
                    ParsedExpense {
                        amount: Decimal::from(amount),
                        category: category.to_string(),
                        note: String::new(),
                    },
                    now() - chrono::Duration::hours(2),
                )
                .await
                .unwrap();
        }
        Notifier::new(store, outbox, Arc::new(FixedClock::new(now())))
    }

    #[tokio::test]
    async fn scheduled_fire_sends_todays_report() {
        let outbox = Arc::new(RecordingMessenger::default());
        let n = notifier(outbox.clone()).await;

        n.on_fire(UserId(1)).await;

        let sent = outbox.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, UserId(1));
        assert!(sent[0].1.contains("Daily report for 2026-06-10"));
        assert!(sent[0].1.contains("800.00"));
    }

    #[tokio::test]
    async fn other_days_are_excluded() {
        let outbox = Arc::new(RecordingMessenger::default());
        let n = notifier(outbox).await;
        let yesterday = now().date_naive().pred_opt().unwrap();
        assert!(n.summary_for(UserId(1), yesterday).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_without_expenses_gets_empty_notice() {
        let outbox = Arc::new(RecordingMessenger::default());
        let n = notifier(outbox.clone()).await;

        n.dispatch(UserId(2), now().date_naive(), ReportKind::OnDemand)
            .await
            .unwrap();

        assert_eq!(outbox.last_text().await, "No expenses for 2026-06-10.");
    }

    #[tokio::test]
    async fn send_failure_is_reported_as_dispatch_error() {
        let outbox = Arc::new(RecordingMessenger::failing());
        let n = notifier(outbox.clone()).await;

        let err = n
            .dispatch(UserId(1), now().date_naive(), ReportKind::OnDemand)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Dispatch(_)));

        // A failed scheduled fire is logged, not propagated.
        n.on_fire(UserId(1)).await;
        assert!(outbox.sent().await.is_empty());
    }
}
