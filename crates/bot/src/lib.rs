//! Prepmitra - Telegram bot for timed daily practice tests
//!
//! The Telegram layer on top of `prepmitra-core`: command and callback
//! dispatch, the channel-membership gate, result delivery, and the
//! midnight maintenance sweep.

pub mod cli;
pub mod maintenance;
pub mod telegram;

// Re-export commonly used items for convenience
pub use telegram::{create_bot, schema, Bot, HandlerDeps};
