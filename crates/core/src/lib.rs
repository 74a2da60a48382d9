//! Prepmitra core - engine for timed multiple-choice test sessions
//!
//! This library holds everything the Telegram layer builds on:
//! question storage and selection, the per-user session registry,
//! scoring, and retention maintenance. It has no Telegram dependency,
//! so the whole exam flow is testable without a bot token.
//!
//! # Module Structure
//!
//! - `config`: environment-driven configuration and quiz constants
//! - `errors`: the `QuizError` taxonomy
//! - `storage`: SQLite pool, schema, and record CRUD
//! - `quiz`: question store, session registry, scoring, ingestion

pub mod config;
pub mod errors;
pub mod logging;
pub mod quiz;
pub mod storage;

// Re-export commonly used types for convenience
pub use errors::QuizError;
pub use quiz::registry::SessionRegistry;
pub use quiz::session::{Session, TestKind};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
