//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - checks the optional allow-list
//! - serializes messages per chat
//! - calls into the `spendbot-core` tracker, which replies through the messaging port

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::debug;

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;

    if !state.cfg.is_allowed(chat_id) {
        debug!(chat_id, "ignoring message from chat outside the allow-list");
        let _ = bot
            .send_message(msg.chat.id, "Unauthorized. Contact the bot owner for access.")
            .await;
        return Ok(());
    }

    let Some(text) = msg.text() else {
        let _ = bot
            .send_message(msg.chat.id, "Send an expense as text, e.g. 500 taxi.")
            .await;
        return Ok(());
    };

    // Sequentialize messages per chat so expenses are appended in receipt order.
    let _guard = state.chat_locks.lock_chat(chat_id).await;

    if text.starts_with('/') {
        return commands::handle_command(&state, chat_id, text).await;
    }
    text::handle_text(&state, chat_id, text).await
}
