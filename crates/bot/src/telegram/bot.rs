//! Bot initialization and command definitions

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use prepmitra_core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "welcome message and test menu")]
    Start,
    #[command(description = "start today's graded test (one attempt per day)")]
    Daily,
    #[command(description = "start an unlimited practice test")]
    Practice,
    #[command(description = "your cumulative scores")]
    Progress,
    #[command(description = "today's top scores")]
    Leaderboard,
    #[command(description = "how the tests work")]
    Help,
}

/// Creates a Bot instance from BOT_TOKEN / TELOXIDE_TOKEN
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }
    Ok(Bot::new(config::BOT_TOKEN.clone()))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "welcome message and test menu"),
        BotCommand::new("daily", "start today's graded test"),
        BotCommand::new("practice", "start an unlimited practice test"),
        BotCommand::new("progress", "your cumulative scores"),
        BotCommand::new("leaderboard", "today's top scores"),
        BotCommand::new("help", "how the tests work"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_descriptions_cover_all_entry_points() {
        let commands = Command::descriptions();
        let command_list = format!("{}", commands);

        assert!(command_list.contains("daily"));
        assert!(command_list.contains("practice"));
        assert!(command_list.contains("progress"));
        assert!(command_list.contains("leaderboard"));
    }
}
