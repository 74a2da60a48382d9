//! Command and callback endpoints.

use chrono::{NaiveDate, Utc};
use teloxide::prelude::*;
use teloxide::types::Message;

use prepmitra_core::quiz::ingest::ingest_questions;
use prepmitra_core::storage::db;
use prepmitra_core::{config, get_connection, TestKind};

use super::types::{ensure_user_exists, HandlerDeps, HandlerError, UserInfo};
use crate::telegram::bot::Command;
use crate::telegram::keyboards;
use crate::telegram::quiz_flow;
use crate::telegram::Bot;

const LEADERBOARD_SIZE: i64 = 10;

/// Handles the /start command: register the user, show the test menu.
pub async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user = UserInfo::from_message(msg);
    ensure_user_exists(&deps.db_pool, &user);

    bot.send_message(
        msg.chat.id,
        format!(
            "👋 Welcome, {}!\n\n\
             Every day there's a fresh 25-question test with a 30-minute timer.\n\
             • Daily: graded, one attempt, ranked on the leaderboard\n\
             • Practice: unlimited attempts, for your eyes only\n\n\
             Pick one to begin:",
            user.display_name()
        ),
    )
    .reply_markup(keyboards::test_menu_keyboard())
    .await?;
    Ok(())
}

/// Handles /help
pub async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    use teloxide::utils::command::BotCommands;

    bot.send_message(
        msg.chat.id,
        format!(
            "{}\n\n\
             How it works: each test is 25 multiple-choice questions with a \
             30-minute limit. When the timer runs out the test is submitted \
             as-is and unanswered questions count as wrong. The daily test \
             allows one attempt per day; practice is unlimited.",
            Command::descriptions()
        ),
    )
    .await?;
    Ok(())
}

/// Handles /progress: the user's cumulative daily and practice stats.
pub async fn handle_progress_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user = UserInfo::from_message(msg);

    let stored = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_user(&conn, user.user_id)?
    };

    let text = match stored {
        Some(record) if record.total_tests > 0 || record.practice_tests > 0 => {
            let mut text = format!("📊 Progress for {}\n", user.display_name());
            if record.total_tests > 0 {
                let average = record.total_score as f64 / record.total_tests as f64;
                text.push_str(&format!(
                    "\nDaily tests: {}\nTotal score: {}\nAverage: {:.1}/25\n",
                    record.total_tests, record.total_score, average
                ));
            }
            if record.practice_tests > 0 {
                let answered = record.practice_correct + record.practice_wrong;
                let accuracy = if answered > 0 {
                    record.practice_correct as f64 * 100.0 / answered as f64
                } else {
                    0.0
                };
                text.push_str(&format!(
                    "\nPractice tests: {}\nPractice accuracy: {:.0}% ({} of {})\n",
                    record.practice_tests, accuracy, record.practice_correct, answered
                ));
            }
            text
        }
        _ => "📊 No tests taken yet. Start with /daily or /practice!".to_string(),
    };

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Handles /leaderboard: today's daily-test ranking.
pub async fn handle_leaderboard_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let today = Utc::now().date_naive();
    let rows = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_leaderboard(&conn, today, LEADERBOARD_SIZE)?
    };

    if rows.is_empty() {
        bot.send_message(
            msg.chat.id,
            "🏆 Nobody has finished today's test yet. Be the first with /daily!",
        )
        .await?;
        return Ok(());
    }

    let mut text = format!("🏆 Leaderboard for {}\n\n", today);
    for (rank, row) in rows.iter().enumerate() {
        let medal = match rank {
            0 => "🥇",
            1 => "🥈",
            2 => "🥉",
            _ => "▫️",
        };
        let name = row
            .first_name
            .clone()
            .or_else(|| row.username.clone())
            .unwrap_or_else(|| format!("user {}", row.user_id));
        text.push_str(&format!(
            "{} {} — {} pts ({}m {:02}s)\n",
            medal,
            name,
            row.score,
            row.elapsed_secs / 60,
            row.elapsed_secs % 60
        ));
    }

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Handles the hidden /addquestions upload (owner only).
///
/// Format: `/addquestions <YYYY-MM-DD> <daily|practice>` on the first
/// line, question blocks separated by blank lines after it.
pub async fn handle_addquestions_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
) -> Result<(), HandlerError> {
    let user = UserInfo::from_message(msg);
    if *config::OWNER_ID == 0 || user.user_id != *config::OWNER_ID {
        log::warn!("Rejected /addquestions from non-owner {}", user.user_id);
        return Ok(());
    }

    let (header, body) = match text.split_once('\n') {
        Some(parts) => parts,
        None => {
            bot.send_message(msg.chat.id, ADDQUESTIONS_USAGE).await?;
            return Ok(());
        }
    };

    let mut args = header.split_whitespace().skip(1);
    let date = args.next().and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    let kind = args.next().and_then(TestKind::parse);
    let (date, kind) = match (date, kind) {
        (Some(date), Some(kind)) => (date, kind),
        _ => {
            bot.send_message(msg.chat.id, ADDQUESTIONS_USAGE).await?;
            return Ok(());
        }
    };

    let (summary, total) = {
        let conn = get_connection(&deps.db_pool)?;
        let summary = ingest_questions(&conn, date, kind, body)?;
        let total = db::count_questions(&conn, date, kind)?;
        (summary, total)
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "📥 Upload for {} ({}): {} inserted, {} skipped.\n\
             Pool now holds {} question(s) — {} needed per test.",
            date,
            kind,
            summary.inserted,
            summary.skipped,
            total,
            config::quiz::QUESTIONS_PER_SESSION
        ),
    )
    .await?;
    Ok(())
}

const ADDQUESTIONS_USAGE: &str = "Usage:\n/addquestions <YYYY-MM-DD> <daily|practice>\n\
    Q: ...\nA) ...\nB) ...\nC) ...\nD) ...\nAnswer: B\nExplanation: ...\n\n\
    Separate questions with blank lines.";

/// Routes callback queries by payload prefix.
pub async fn handle_callback(bot: &Bot, deps: &HandlerDeps, q: CallbackQuery) -> Result<(), HandlerError> {
    let data = match q.data.clone() {
        Some(data) => data,
        None => return Ok(()),
    };
    let chat_id = match q.message.as_ref().map(|m| m.chat().id) {
        Some(chat_id) => chat_id,
        None => return Ok(()),
    };
    let user = UserInfo::from_callback(&q, chat_id);

    // Stop the client-side spinner before any real work
    bot.answer_callback_query(q.id.clone()).await?;

    if let Some(index) = data.strip_prefix(keyboards::ANSWER_PREFIX) {
        if let Ok(selected) = index.parse::<usize>() {
            quiz_flow::handle_answer(bot, deps, user.user_id, chat_id, selected).await?;
        }
    } else if data == keyboards::RECHECK_PAYLOAD {
        quiz_flow::handle_recheck(bot, deps, chat_id, &user).await?;
    } else if let Some(kind) = data.strip_prefix(keyboards::START_PREFIX).and_then(TestKind::parse) {
        ensure_user_exists(&deps.db_pool, &user);
        quiz_flow::start_test(bot, deps, chat_id, &user, kind).await?;
    } else {
        log::debug!("Unknown callback payload from user {}: {}", user.user_id, data);
    }
    Ok(())
}
