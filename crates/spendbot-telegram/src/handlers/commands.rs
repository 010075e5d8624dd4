use teloxide::prelude::*;
use tracing::warn;

use spendbot_core::domain::UserId;

use crate::router::AppState;

/// Split `/cmd@botname arg1 ...` into the lowercased command name and the rest.
fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(state: &AppState, chat_id: i64, text: &str) -> ResponseResult<()> {
    let (cmd, args) = parse_command(text);

    if let Err(e) = state.tracker.on_command(UserId(chat_id), &cmd, &args).await {
        warn!(chat_id, command = %cmd, "command failed: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_name_and_args() {
        assert_eq!(
            parse_command("/settime 20:00"),
            ("settime".to_string(), "20:00".to_string())
        );
        assert_eq!(
            parse_command("/Add@spend_bot 500 taxi  airport"),
            ("add".to_string(), "500 taxi  airport".to_string())
        );
        assert_eq!(parse_command("/summary"), ("summary".to_string(), String::new()));
    }
}
