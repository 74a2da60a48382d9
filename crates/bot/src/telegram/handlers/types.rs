//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::Message;

use prepmitra_core::storage::db::{create_user, get_user};
use prepmitra_core::{get_connection, DbPool, SessionRegistry};

use crate::telegram::membership::PendingActions;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub registry: Arc<SessionRegistry>,
    pub pending: Arc<PendingActions>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>, registry: Arc<SessionRegistry>, pending: Arc<PendingActions>) -> Self {
        Self {
            db_pool,
            registry,
            pending,
        }
    }
}

/// Identity of the person behind an update
#[derive(Clone)]
pub struct UserInfo {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl UserInfo {
    /// Extract user info from a Telegram message
    pub fn from_message(msg: &Message) -> Self {
        Self {
            user_id: msg
                .from
                .as_ref()
                .and_then(|u| i64::try_from(u.id.0).ok())
                .unwrap_or(msg.chat.id.0),
            chat_id: msg.chat.id.0,
            username: msg.from.as_ref().and_then(|u| u.username.clone()),
            first_name: msg.from.as_ref().map(|u| u.first_name.clone()),
        }
    }

    /// Extract user info from a callback query
    pub fn from_callback(q: &CallbackQuery, chat_id: ChatId) -> Self {
        Self {
            user_id: i64::try_from(q.from.id.0).unwrap_or(chat_id.0),
            chat_id: chat_id.0,
            username: q.from.username.clone(),
            first_name: Some(q.from.first_name.clone()),
        }
    }

    /// A human-readable name for leaderboards and logs
    pub fn display_name(&self) -> String {
        self.first_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

/// Result of ensure_user_exists operation
pub enum UserCreationResult {
    /// User already existed
    Existed,
    /// User was newly created
    Created,
    /// Failed to get DB connection
    DbError,
}

/// Ensures a user exists in the database, creating them if needed.
pub fn ensure_user_exists(db_pool: &Arc<DbPool>, user: &UserInfo) -> UserCreationResult {
    let conn = match get_connection(db_pool) {
        Ok(c) => c,
        Err(_) => return UserCreationResult::DbError,
    };

    match get_user(&conn, user.user_id) {
        Ok(Some(_)) => UserCreationResult::Existed,
        Ok(None) => {
            match create_user(&conn, user.user_id, user.username.clone(), user.first_name.clone()) {
                Ok(()) => {
                    log::info!("New user {} ({})", user.user_id, user.display_name());
                    UserCreationResult::Created
                }
                Err(e) => {
                    log::error!("Failed to create user {}: {}", user.user_id, e);
                    UserCreationResult::DbError
                }
            }
        }
        Err(_) => UserCreationResult::DbError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> (tempfile::TempDir, Arc<DbPool>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = prepmitra_core::create_pool(path.to_str().unwrap()).unwrap();
        (dir, Arc::new(pool))
    }

    fn make_user(user_id: i64) -> UserInfo {
        UserInfo {
            user_id,
            chat_id: user_id,
            username: Some("aspirant".into()),
            first_name: Some("Asha".into()),
        }
    }

    #[test]
    fn first_contact_creates_then_subsequent_finds() {
        let (_dir, pool) = test_pool();
        let user = make_user(100);

        assert!(matches!(ensure_user_exists(&pool, &user), UserCreationResult::Created));
        assert!(matches!(ensure_user_exists(&pool, &user), UserCreationResult::Existed));

        let conn = get_connection(&pool).unwrap();
        let stored = get_user(&conn, 100).unwrap().unwrap();
        assert_eq!(stored.username.as_deref(), Some("aspirant"));
        assert_eq!(stored.first_name.as_deref(), Some("Asha"));
    }

    #[test]
    fn display_name_prefers_first_name() {
        let user = make_user(7);
        assert_eq!(user.display_name(), "Asha");

        let nameless = UserInfo {
            user_id: 7,
            chat_id: 7,
            username: None,
            first_name: None,
        };
        assert_eq!(nameless.display_name(), "7");
    }
}
