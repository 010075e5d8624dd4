use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info};

use spendbot_core::{
    clock::SystemClock,
    config::Config,
    messaging::{port::MessagingPort, throttled::ThrottledMessenger},
    store::ExpenseStore,
    tracker::ExpenseTracker,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub tracker: Arc<ExpenseTracker>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Per-chat mutexes so one user's messages are handled in receipt order.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn ExpenseStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(username = %me.username(), "bot started");
    }
    info!(
        database = %cfg.database_path.display(),
        default_daily_time = %cfg.default_daily_time,
        "configuration loaded"
    );

    // Wrap the raw Telegram messenger with a throttling decorator so a burst of
    // reports on the same minute stays under flood limits. The adapter still retries
    // once on 429 RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> =
        Arc::new(ThrottledMessenger::new(raw_messenger, cfg.throttle));

    let tracker = Arc::new(ExpenseTracker::new(
        store,
        messenger,
        Arc::new(SystemClock),
        cfg.dispatch_concurrency,
    ));
    match tracker.start().await {
        Ok(n) => info!(users = n, "daily reports scheduled"),
        Err(e) => error!("failed to load users for scheduling: {e}"),
    }

    let state = Arc::new(AppState {
        cfg,
        tracker: tracker.clone(),
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    tracker.stop().await;
    info!("bot stopped");
    Ok(())
}
