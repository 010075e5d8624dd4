use teloxide::prelude::*;
use tracing::warn;

use spendbot_core::domain::UserId;

use crate::router::AppState;

pub async fn handle_text(state: &AppState, chat_id: i64, text: &str) -> ResponseResult<()> {
    if text.trim().is_empty() {
        return Ok(());
    }

    if let Err(e) = state.tracker.on_text(UserId(chat_id), text).await {
        warn!(chat_id, "text message failed: {e}");
    }
    Ok(())
}
