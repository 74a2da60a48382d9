//! Outbound broadcasts to known users.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use teloxide::prelude::*;

use prepmitra_core::storage::db::get_all_users;
use prepmitra_core::{get_connection, DbPool};

use crate::telegram::Bot;

/// Gap between broadcast sends, to stay clear of Telegram rate limits
const BROADCAST_PACING: Duration = Duration::from_millis(50);

/// Announces a fresh daily test to every known user.
///
/// Best-effort: a blocked bot or deleted account only costs that one
/// user their notification, the rest of the broadcast continues.
pub async fn notify_new_daily(bot: &Bot, db_pool: &Arc<DbPool>, date: NaiveDate) {
    let users = match get_connection(db_pool) {
        Ok(conn) => match get_all_users(&conn) {
            Ok(users) => users,
            Err(e) => {
                log::error!("Failed to load users for daily broadcast: {}", e);
                return;
            }
        },
        Err(e) => {
            log::error!("Failed to get DB connection for daily broadcast: {}", e);
            return;
        }
    };

    let text = format!(
        "📝 Today's test ({}) is ready!\n\n\
         Send /daily to take it — one graded attempt, 25 questions, 30 minutes.",
        date
    );

    let mut sent = 0usize;
    let mut failed = 0usize;
    for user in &users {
        match bot.send_message(ChatId(user.telegram_id), text.as_str()).await {
            Ok(_) => sent += 1,
            Err(e) => {
                failed += 1;
                log::debug!("Daily broadcast to {} failed: {}", user.telegram_id, e);
            }
        }
        tokio::time::sleep(BROADCAST_PACING).await;
    }

    log::info!("Daily broadcast for {}: {} sent, {} failed", date, sent, failed);
}
