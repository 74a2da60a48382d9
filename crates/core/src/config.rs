use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: prepmitra.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "prepmitra.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: prepmitra.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "prepmitra.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Channel username users must join before taking tests (without @)
/// Read from FORCE_CHANNEL environment variable
pub static FORCE_CHANNEL: Lazy<String> = Lazy::new(|| env::var("FORCE_CHANNEL").unwrap_or_else(|_| String::new()));

/// Numeric Telegram id of the bot owner
/// The owner bypasses the membership gate and may upload questions
pub static OWNER_ID: Lazy<i64> = Lazy::new(|| {
    env::var("OWNER_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
});

/// Webhook URL for Telegram updates
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

/// Local port the webhook HTTP listener binds to
/// Read from WEBHOOK_PORT environment variable
/// Default: 8443
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBHOOK_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8443)
});

/// Quiz session configuration
pub mod quiz {
    use super::Duration;

    /// Number of questions drawn into every session
    pub const QUESTIONS_PER_SESSION: usize = 25;

    /// Hard limit on session duration (in minutes)
    pub const SESSION_TIMEOUT_MINS: u64 = 30;

    /// Session timeout duration
    pub fn session_timeout() -> Duration {
        Duration::from_secs(SESSION_TIMEOUT_MINS * 60)
    }
}

/// Dispatcher retry configuration
pub mod retry {
    use super::Duration;

    /// How many times the dispatcher is restarted after a panic
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Backoff before restarting the dispatcher, capped at one minute
    pub fn dispatcher_delay(attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt).min(60);
        Duration::from_secs(secs)
    }
}

/// Daily maintenance configuration
pub mod maintenance {
    /// Questions and attempts older than this many days are purged,
    /// measured from the sweep's trigger date
    pub const RETENTION_DAYS: i64 = 3;
}
