//! Channel-membership gate and the pending-start stash.
//!
//! Tests are only available to members of the configured channel. A
//! user who hits the gate gets a join prompt; their requested test type
//! is stashed so the "I've joined" re-check can resume exactly where
//! they left off.

use std::collections::HashMap;

use teloxide::prelude::*;
use teloxide::types::{Recipient, UserId};
use tokio::sync::Mutex;

use prepmitra_core::{config, TestKind};

use crate::telegram::Bot;

/// Checks whether a user may take tests.
///
/// The owner always passes. With no channel configured the gate is
/// open. On Telegram API errors the gate fails closed: a transient
/// getChatMember failure must not let non-members through.
pub async fn is_member(bot: &Bot, user_id: i64) -> bool {
    if *config::OWNER_ID != 0 && user_id == *config::OWNER_ID {
        return true;
    }

    let channel = config::FORCE_CHANNEL.as_str();
    if channel.is_empty() {
        return true;
    }

    let telegram_user_id = match u64::try_from(user_id) {
        Ok(id) => UserId(id),
        Err(_) => return false,
    };

    let chat = Recipient::ChannelUsername(format!("@{}", channel));
    match bot.get_chat_member(chat, telegram_user_id).await {
        Ok(member) => member.is_present(),
        Err(e) => {
            log::warn!("getChatMember failed for user {} on @{}: {}", user_id, channel, e);
            false
        }
    }
}

/// Test starts deferred behind the membership gate, keyed by user id.
///
/// `take` removes the entry, so one successful re-check resumes the
/// start at most once.
#[derive(Default)]
pub struct PendingActions {
    inner: Mutex<HashMap<i64, TestKind>>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Remembers which test the user wanted; a later request overwrites.
    pub async fn record(&self, user_id: i64, kind: TestKind) {
        self.inner.lock().await.insert(user_id, kind);
    }

    /// Claims and clears the user's deferred start, if any.
    pub async fn take(&self, user_id: i64) -> Option<TestKind> {
        self.inner.lock().await.remove(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_claims_the_pending_start_exactly_once() {
        let pending = PendingActions::new();
        pending.record(1, TestKind::Daily).await;

        assert_eq!(pending.take(1).await, Some(TestKind::Daily));
        assert_eq!(pending.take(1).await, None);
    }

    #[tokio::test]
    async fn later_request_overwrites_the_earlier_one() {
        let pending = PendingActions::new();
        pending.record(1, TestKind::Daily).await;
        pending.record(1, TestKind::Practice).await;

        assert_eq!(pending.take(1).await, Some(TestKind::Practice));
    }

    #[tokio::test]
    async fn users_do_not_share_slots() {
        let pending = PendingActions::new();
        pending.record(1, TestKind::Daily).await;

        assert_eq!(pending.take(2).await, None);
        assert_eq!(pending.take(1).await, Some(TestKind::Daily));
    }
}
