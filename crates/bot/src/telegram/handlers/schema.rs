//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{
    handle_addquestions_command, handle_callback, handle_help_command, handle_leaderboard_command,
    handle_progress_command, handle_start_command,
};
use super::types::{HandlerDeps, HandlerError, UserInfo};
use crate::telegram::bot::Command;
use crate::telegram::quiz_flow;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Returns a handler tree for teloxide's Dispatcher. The same schema
/// runs in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_addquestions = deps.clone();
    let deps_commands = deps.clone();
    let deps_callback = deps.clone();

    dptree::entry()
        // Hidden admin command (not in Command enum)
        .branch(addquestions_handler(deps_addquestions))
        // Command handler
        .branch(command_handler(deps_commands))
        // Callback query handler (answer buttons, menu, re-check)
        .branch(callback_handler(deps_callback))
}

/// Handler for the /addquestions admin upload (hidden, not in Command enum)
fn addquestions_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text()
                .map(|text| text.starts_with("/addquestions"))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let message_text = msg.text().unwrap_or_default().to_string();

                if let Err(e) = handle_addquestions_command(&bot, &msg, &deps, &message_text).await {
                    log::error!("/addquestions handler failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, format!("❌ Upload failed: {}", e))
                        .await;
                }
                Ok(())
            }
        })
}

/// Handler for bot commands (/start, /daily, /practice, etc.)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => {
                        handle_start_command(&bot, &msg, &deps).await?;
                    }
                    Command::Daily => {
                        let user = UserInfo::from_message(&msg);
                        super::types::ensure_user_exists(&deps.db_pool, &user);
                        quiz_flow::start_test(&bot, &deps, msg.chat.id, &user, prepmitra_core::TestKind::Daily).await?;
                    }
                    Command::Practice => {
                        let user = UserInfo::from_message(&msg);
                        super::types::ensure_user_exists(&deps.db_pool, &user);
                        quiz_flow::start_test(&bot, &deps, msg.chat.id, &user, prepmitra_core::TestKind::Practice)
                            .await?;
                    }
                    Command::Progress => {
                        handle_progress_command(&bot, &msg, &deps).await?;
                    }
                    Command::Leaderboard => {
                        handle_leaderboard_command(&bot, &msg, &deps).await?;
                    }
                    Command::Help => {
                        handle_help_command(&bot, &msg).await?;
                    }
                }
                Ok(())
            }
        },
    ))
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let user_id = q.from.id;
            if let Err(e) = handle_callback(&bot, &deps, q).await {
                log::error!("Callback handler failed for user {}: {}", user_id, e);
            }
            Ok(())
        }
    })
}
