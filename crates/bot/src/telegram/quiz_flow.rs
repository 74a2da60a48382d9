//! The interactive test flow: start, per-answer advance, completion.
//!
//! A session finishes in one of three ways: final answer, the
//! 30-minute timer, or never (the user walks away and the timer claims
//! it). Whichever trigger claims the session from the registry calls
//! `deliver_report` exactly once.

use chrono::Utc;
use teloxide::prelude::*;

use prepmitra_core::quiz::questions::{select_session_set, Question};
use prepmitra_core::quiz::registry::AnswerOutcome;
use prepmitra_core::quiz::scoring::{self, SessionReport};
use prepmitra_core::storage::db;
use prepmitra_core::{config, get_connection, QuizError, Session, TestKind};

use crate::telegram::handlers::{HandlerDeps, HandlerError, UserInfo};
use crate::telegram::keyboards;
use crate::telegram::membership;
use crate::telegram::Bot;

/// Telegram caps messages at 4096 chars; stay under it with headroom
const MESSAGE_CHUNK_LIMIT: usize = 3500;

const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Starts a test for the user, walking the full gauntlet: membership
/// gate, daily one-attempt rule, pool size check, registry insert.
///
/// Every refusal is a user-facing message, not an error; only
/// infrastructure failures propagate.
pub async fn start_test(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    user: &UserInfo,
    kind: TestKind,
) -> Result<(), HandlerError> {
    if !membership::is_member(bot, user.user_id).await {
        deps.pending.record(user.user_id, kind).await;
        bot.send_message(
            chat_id,
            "🔒 Tests are for channel members only.\n\n\
             Join the channel below, then tap \"I've joined\".",
        )
        .reply_markup(keyboards::join_keyboard(config::FORCE_CHANNEL.as_str()))
        .await?;
        return Ok(());
    }

    let today = Utc::now().date_naive();

    if kind == TestKind::Daily {
        let attempted = {
            let conn = get_connection(&deps.db_pool)?;
            db::has_attempt(&conn, user.user_id, today)?
        };
        if attempted {
            bot.send_message(
                chat_id,
                "📅 You've already taken today's test. A fresh one arrives at midnight UTC — \
                 meanwhile /practice is unlimited.",
            )
            .await?;
            return Ok(());
        }
    }

    let pool = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_questions(&conn, today, kind)?
    };

    let questions = match select_session_set(pool) {
        Ok(questions) => questions,
        Err(QuizError::InsufficientContent { available, needed, .. }) => {
            log::warn!(
                "Refused {} test for user {}: pool has {} of {} questions",
                kind,
                user.user_id,
                available,
                needed
            );
            bot.send_message(
                chat_id,
                format!("😔 Today's {} test isn't ready yet. Please check back later.", kind),
            )
            .await?;
            return Ok(());
        }
        Err(e) => return Err(Box::new(e)),
    };

    let total = questions.len();
    let session = Session::new(user.user_id, chat_id.0, kind, today, questions);
    let first = match session.current_question().cloned() {
        Some(q) => q,
        None => return Ok(()), // unreachable: select_session_set refuses empty sets
    };

    match deps.registry.create(session).await {
        Ok(()) => {}
        Err(QuizError::SessionActive(_)) => {
            bot.send_message(chat_id, "⏳ You already have a test in progress. Finish it first.")
                .await?;
            return Ok(());
        }
        Err(e) => return Err(Box::new(e)),
    }

    // The timer and the final answer race on the registry entry; the
    // loser finds it gone and does nothing.
    let timer = {
        let bot = bot.clone();
        let deps = deps.clone();
        let user_id = user.user_id;
        tokio::spawn(async move {
            tokio::time::sleep(config::quiz::session_timeout()).await;
            if let Some(session) = deps.registry.complete_if_active(user_id).await {
                log::info!("Session for user {} timed out", user_id);
                if let Err(e) = deliver_report(&bot, &deps, session, true).await {
                    log::error!("Failed to finalize timed-out session for user {}: {}", user_id, e);
                }
            }
        })
    };
    deps.registry.arm_timeout(user.user_id, timer.abort_handle()).await;

    log::info!("Started {} test for user {} ({} questions)", kind, user.user_id, total);

    bot.send_message(chat_id, intro_text(kind, total)).await?;
    send_question(bot, chat_id, &first, 1, total).await?;
    Ok(())
}

/// Applies one answer button press.
///
/// Presses with no live session behind them (timed out, already
/// finished, duplicate tap on an old keyboard) are dropped silently.
pub async fn handle_answer(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    chat_id: ChatId,
    selected: usize,
) -> Result<(), HandlerError> {
    match deps.registry.apply_answer(user_id, selected).await {
        None => {
            log::debug!("Dropped stray answer from user {}", user_id);
            Ok(())
        }
        Some(AnswerOutcome::Next {
            correct,
            answered,
            question,
            number,
            total,
        }) => {
            bot.send_message(chat_id, feedback_text(correct, selected, &answered))
                .await?;
            send_question(bot, chat_id, &question, number, total).await?;
            Ok(())
        }
        Some(AnswerOutcome::Finished {
            correct,
            answered,
            session,
        }) => {
            bot.send_message(chat_id, feedback_text(correct, selected, &answered))
                .await?;
            deliver_report(bot, deps, session, false).await
        }
    }
}

/// The "I've joined" button: re-run the gate and resume the stashed
/// test start if it passes.
pub async fn handle_recheck(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, user: &UserInfo) -> Result<(), HandlerError> {
    if !membership::is_member(bot, user.user_id).await {
        bot.send_message(chat_id, "🔒 Still not seeing you in the channel. Join it and try again.")
            .await?;
        return Ok(());
    }

    match deps.pending.take(user.user_id).await {
        Some(kind) => start_test(bot, deps, chat_id, user, kind).await,
        None => {
            bot.send_message(chat_id, "✅ You're in! Pick a test with /start.")
                .await?;
            Ok(())
        }
    }
}

/// Persists the claimed session and sends the results summary.
async fn deliver_report(bot: &Bot, deps: &HandlerDeps, session: Session, timed_out: bool) -> Result<(), HandlerError> {
    let chat_id = ChatId(session.chat_id);
    let report = {
        let conn = get_connection(&deps.db_pool)?;
        match scoring::finalize(&conn, &session, Utc::now()) {
            Ok(report) => report,
            Err(e) if e.is_duplicate_attempt() => {
                log::warn!(
                    "Dropped duplicate daily result for user {}: an attempt was already recorded",
                    session.user_id
                );
                bot.send_message(
                    chat_id,
                    "📅 Today's test was already recorded for you, so this run wasn't scored.",
                )
                .await?;
                return Ok(());
            }
            Err(e) => return Err(Box::new(e)),
        }
    };

    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "Session report for chat {}: {}",
            session.chat_id,
            serde_json::to_string(&report).unwrap_or_default()
        );
    }

    if timed_out {
        bot.send_message(
            chat_id,
            format!(
                "⏰ Time's up! Your test was submitted with the {} answer(s) you gave.",
                report.results.iter().filter(|r| r.selected.is_some()).count()
            ),
        )
        .await?;
    }

    send_chunked(bot, chat_id, &report_text(&report)).await?;
    Ok(())
}

fn intro_text(kind: TestKind, total: usize) -> String {
    let grading = match kind {
        TestKind::Daily => "Graded — your score goes on today's /leaderboard.",
        TestKind::Practice => "Practice — take as many as you like.",
    };
    format!(
        "🏁 {} questions, {} minutes on the clock. {}\n\n\
         Unanswered questions count as wrong when time runs out. Good luck!",
        total,
        config::quiz::SESSION_TIMEOUT_MINS,
        grading
    )
}

async fn send_question(bot: &Bot, chat_id: ChatId, question: &Question, number: usize, total: usize) -> Result<(), HandlerError> {
    bot.send_message(chat_id, format!("Question {}/{}\n\n{}", number, total, question.prompt))
        .reply_markup(keyboards::answer_keyboard(&question.options))
        .await?;
    Ok(())
}

fn feedback_text(correct: bool, selected: usize, answered: &Question) -> String {
    let mut text = if correct {
        "✅ Correct!".to_string()
    } else {
        let right = answered.correct_index;
        let picked = answered
            .options
            .get(selected)
            .map(|o| format!("{}) {}", OPTION_LETTERS[selected], o))
            .unwrap_or_else(|| "—".to_string());
        format!(
            "❌ Wrong. You picked {}.\nCorrect answer: {}) {}",
            picked, OPTION_LETTERS[right], answered.options[right]
        )
    };
    if !correct {
        if let Some(explanation) = &answered.explanation {
            text.push_str("\n💡 ");
            text.push_str(explanation);
        }
    }
    text
}

fn report_text(report: &SessionReport) -> String {
    let minutes = report.elapsed_secs / 60;
    let seconds = report.elapsed_secs % 60;

    let mut text = format!(
        "🏆 {} test finished!\n\n\
         Score: {}/{}\n\
         Time: {}m {:02}s\n",
        match report.kind {
            TestKind::Daily => "Daily",
            TestKind::Practice => "Practice",
        },
        report.score,
        report.total,
        minutes,
        seconds
    );

    if report.kind == TestKind::Daily {
        text.push_str("\nSee where you placed with /leaderboard.\n");
    }

    let missed: Vec<(usize, &prepmitra_core::quiz::scoring::QuestionResult)> = report
        .results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.correct)
        .collect();

    if missed.is_empty() {
        text.push_str("\n💯 Perfect score — nothing to review!");
        return text;
    }

    text.push_str("\n📖 Review:\n");
    for (index, result) in missed {
        text.push_str(&format!(
            "\n{}. {}\n   Answer: {}) {}",
            index + 1,
            result.prompt,
            OPTION_LETTERS[result.correct_index],
            result.options[result.correct_index]
        ));
        match result.selected {
            Some(picked) => {
                if let Some(option) = result.options.get(picked) {
                    text.push_str(&format!("\n   You picked: {}) {}", OPTION_LETTERS[picked], option));
                }
            }
            None => text.push_str("\n   You picked: (unanswered)"),
        }
        if let Some(explanation) = &result.explanation {
            text.push_str(&format!("\n   💡 {}", explanation));
        }
    }
    text
}

/// Splits long texts on line boundaries so every piece fits a message.
async fn send_chunked(bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), HandlerError> {
    if text.len() <= MESSAGE_CHUNK_LIMIT {
        bot.send_message(chat_id, text).await?;
        return Ok(());
    }

    let mut chunk = String::new();
    for line in text.lines() {
        if chunk.len() + line.len() + 1 > MESSAGE_CHUNK_LIMIT && !chunk.is_empty() {
            bot.send_message(chat_id, chunk.as_str()).await?;
            chunk.clear();
        }
        if !chunk.is_empty() {
            chunk.push('\n');
        }
        chunk.push_str(line);
    }
    if !chunk.is_empty() {
        bot.send_message(chat_id, chunk.as_str()).await?;
    }
    Ok(())
}
