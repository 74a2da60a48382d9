//! Session registry, the single owner of all live test sessions.
//!
//! Every mutation goes through one `tokio::sync::Mutex`, so the two
//! completion triggers (final answer and the 30-minute timer) race on
//! the map entry itself: whichever removes the entry claims the session,
//! the loser observes "already completed" and does nothing.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use crate::errors::{QuizError, Result};
use crate::quiz::questions::Question;
use crate::quiz::session::Session;

struct ActiveSession {
    session: Session,
    /// One-shot timeout task, aborted when any other path completes first
    timeout: Option<AbortHandle>,
}

/// What an answer event produced.
pub enum AnswerOutcome {
    /// The session continues; `question` is the next prompt to send.
    Next {
        correct: bool,
        answered: Question,
        question: Question,
        /// 1-based number of the next question
        number: usize,
        total: usize,
    },
    /// That was the last question; the caller owns the session now and
    /// must hand it to the scoring sink exactly once.
    Finished {
        correct: bool,
        answered: Question,
        session: Session,
    },
}

/// Registry of live sessions, keyed by user id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<i64, ActiveSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new session for its user.
    ///
    /// Refuses with `SessionActive` when one already exists, so
    /// concurrent start requests can never yield two sessions.
    pub async fn create(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.user_id) {
            return Err(QuizError::SessionActive(session.user_id));
        }
        sessions.insert(
            session.user_id,
            ActiveSession {
                session,
                timeout: None,
            },
        );
        Ok(())
    }

    /// Stores the cancellable timeout handle on the live session.
    ///
    /// If the session is already gone the handle is aborted immediately
    /// so no timer can ever act on a stale or reused user-id slot.
    pub async fn arm_timeout(&self, user_id: i64, handle: AbortHandle) {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&user_id) {
            Some(entry) => entry.timeout = Some(handle),
            None => handle.abort(),
        }
    }

    /// Applies one answer event.
    ///
    /// Returns `None` when the user has no live session (stray events
    /// are ignored, per the error taxonomy). Completion by the final
    /// answer removes the entry and aborts the timer under the same
    /// lock acquisition, so the timeout path can never double-complete.
    pub async fn apply_answer(&self, user_id: i64, selected: usize) -> Option<AnswerOutcome> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&user_id)?;

        let correct = entry.session.record_answer(selected);
        let answered = entry.session.questions[entry.session.current - 1].clone();

        if entry.session.is_finished() {
            let entry = sessions.remove(&user_id)?;
            if let Some(handle) = entry.timeout {
                handle.abort();
            }
            Some(AnswerOutcome::Finished {
                correct,
                answered,
                session: entry.session,
            })
        } else {
            let question = entry.session.current_question().cloned()?;
            Some(AnswerOutcome::Next {
                correct,
                answered,
                question,
                number: entry.session.current + 1,
                total: entry.session.questions.len(),
            })
        }
    }

    /// Claims the session for completion, used by the timeout path.
    ///
    /// Returns `None` when another path already completed it. The
    /// stored timeout handle is dropped without an abort: the caller
    /// here is normally the timer task itself, and aborting its own
    /// handle would cancel it before it can deliver the results.
    pub async fn complete_if_active(&self, user_id: i64) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.remove(&user_id)?;
        drop(entry.timeout);
        Some(entry.session)
    }

    pub async fn is_active(&self, user_id: i64) -> bool {
        self.sessions.lock().await.contains_key(&user_id)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
