use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::DailyTime, errors::Error, messaging::throttled::ThrottleConfig, Result};

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    /// Chat ids allowed to use the bot; empty means everyone.
    pub telegram_allowed_users: Vec<i64>,

    // Storage
    pub database_path: PathBuf,

    // Scheduling
    pub default_daily_time: DailyTime,
    pub dispatch_concurrency: usize,

    // Outbound flood control
    pub throttle: ThrottleConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        let database_path =
            env_path("DATABASE_PATH").unwrap_or_else(|| PathBuf::from("finance_bot.db"));

        let default_daily_time = match env_str("DEFAULT_DAILY_TIME").and_then(non_empty) {
            Some(raw) => raw.parse::<DailyTime>().map_err(|_| {
                Error::Config(format!("DEFAULT_DAILY_TIME must be HH:MM, got {raw:?}"))
            })?,
            None => DailyTime::DEFAULT,
        };
        let dispatch_concurrency = env_usize("DISPATCH_CONCURRENCY").unwrap_or(8).max(1);

        let defaults = ThrottleConfig::default();
        let throttle = ThrottleConfig {
            global_min_interval: env_u64("THROTTLE_GLOBAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.global_min_interval),
            per_chat_min_interval: env_u64("THROTTLE_PER_CHAT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.per_chat_min_interval),
        };

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            database_path,
            default_daily_time,
            dispatch_concurrency,
            throttle,
        })
    }

    pub fn is_allowed(&self, chat_id: i64) -> bool {
        self.telegram_allowed_users.is_empty() || self.telegram_allowed_users.contains(&chat_id)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_str(key).and_then(non_empty).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv(
            "# comment\nTELEGRAM_BOT_TOKEN=\"abc:def\"\n\nDATABASE_PATH = '/tmp/x.db'\nbroken line\n=novalue\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "abc:def".to_string()),
                ("DATABASE_PATH".to_string(), "/tmp/x.db".to_string()),
            ]
        );
    }

    #[test]
    fn csv_ids_ignore_garbage() {
        assert_eq!(parse_csv_i64(Some("1, 2,x,,-3".to_string())), vec![1, 2, -3]);
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn empty_allow_list_admits_everyone() {
        let mut cfg = Config {
            telegram_bot_token: "t".to_string(),
            telegram_allowed_users: vec![],
            database_path: PathBuf::from("x.db"),
            default_daily_time: DailyTime::DEFAULT,
            dispatch_concurrency: 1,
            throttle: ThrottleConfig::default(),
        };
        assert!(cfg.is_allowed(42));
        cfg.telegram_allowed_users = vec![7];
        assert!(!cfg.is_allowed(42));
        assert!(cfg.is_allowed(7));
    }
}
