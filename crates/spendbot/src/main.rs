use std::sync::Arc;

use spendbot_core::{config::Config, store::SqliteStore};

#[tokio::main]
async fn main() -> Result<(), spendbot_core::Error> {
    spendbot_core::logging::init("spendbot")?;

    let cfg = Arc::new(Config::load()?);
    let store = Arc::new(SqliteStore::open(&cfg.database_path, cfg.default_daily_time)?);

    spendbot_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| spendbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
