use chrono::NaiveDate;
use thiserror::Error;

/// Centralized error types for the quiz engine
///
/// Every condition here is recoverable at the point of detection: the
/// Telegram layer maps each variant to a user-facing reply (or a silent
/// drop for stray answers). Nothing in this enum is process-fatal.
#[derive(Error, Debug)]
pub enum QuizError {
    /// Question pool is smaller than a full session
    #[error("not enough {kind} questions for {date}: have {available}, need {needed}")]
    InsufficientContent {
        kind: &'static str,
        date: NaiveDate,
        available: usize,
        needed: usize,
    },

    /// User already finished today's daily test
    #[error("daily test for {0} already attempted")]
    AlreadyAttempted(NaiveDate),

    /// Membership gate refused the user
    #[error("user {0} has not joined the channel")]
    NotAMember(i64),

    /// Answer event arrived for a user with no live session
    #[error("no active session for user {0}")]
    NoActiveSession(i64),

    /// A second start request while a session is already in progress
    #[error("user {0} already has a test in progress")]
    SessionActive(i64),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl QuizError {
    /// True when a write lost to an existing attempt for the same
    /// (user, date): the UNIQUE(user_id, quiz_date) backstop fired.
    ///
    /// This is reachable when a second daily session slips past the
    /// attempt pre-check before the first one's record commits.
    pub fn is_duplicate_attempt(&self) -> bool {
        matches!(
            self,
            QuizError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Type alias for Result with QuizError
pub type Result<T> = std::result::Result<T, QuizError>;
