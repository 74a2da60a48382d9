//! Telegram integration: dispatch schema, membership gate, test flow

pub mod bot;
pub mod handlers;
pub mod keyboards;
pub mod membership;
pub mod notifications;
pub mod quiz_flow;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use membership::PendingActions;
pub use teloxide::Bot;
