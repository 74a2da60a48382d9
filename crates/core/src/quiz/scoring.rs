//! Scoring and persistence sink for completed sessions.
//!
//! `finalize` is called exactly once per session by whichever completion
//! trigger claims it from the registry.

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::quiz::session::{Session, TestKind};
use crate::storage::db::{self, DbConnection};

/// Per-question line of the results summary, in original question order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QuestionResult {
    pub prompt: String,
    pub options: [String; 4],
    /// What the user picked; `None` when the timer cut the session short
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub correct: bool,
    pub explanation: Option<String>,
}

/// Everything the messaging layer needs to report a finished test.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionReport {
    pub kind: TestKind,
    pub score: u32,
    pub total: usize,
    pub elapsed_secs: i64,
    pub results: Vec<QuestionResult>,
}

/// Persists a completed session and builds its report.
///
/// Daily sessions produce one attempt record and bump the user's daily
/// counters; practice sessions bump the practice counters, with every
/// unanswered question counted as wrong.
pub fn finalize(conn: &DbConnection, session: &Session, completed_at: DateTime<Utc>) -> Result<SessionReport> {
    let elapsed_secs = session.elapsed_secs(completed_at);
    let total = session.questions.len();
    let correct = session.correct_count();

    match session.kind {
        TestKind::Daily => {
            db::insert_attempt(conn, session.user_id, session.quiz_date, correct as i64, elapsed_secs)?;
            db::add_daily_result(conn, session.user_id, correct as i64)?;
        }
        TestKind::Practice => {
            let wrong = (total - correct) as i64;
            db::add_practice_result(conn, session.user_id, correct as i64, wrong)?;
        }
    }

    let results = session
        .questions
        .iter()
        .zip(&session.answers)
        .map(|(question, selected)| QuestionResult {
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            selected: *selected,
            correct_index: question.correct_index,
            correct: *selected == Some(question.correct_index),
            explanation: question.explanation.clone(),
        })
        .collect();

    Ok(SessionReport {
        kind: session.kind,
        score: correct as u32,
        total,
        elapsed_secs,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::questions::Question;
    use crate::storage::db::{create_pool, create_user, get_connection, get_leaderboard, get_user, has_attempt};
    use chrono::{Duration, NaiveDate};

    fn make_session(user_id: i64, kind: TestKind, count: usize) -> Session {
        let quiz_date = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
        let questions = (0..count)
            .map(|i| Question {
                id: i as i64,
                quiz_date,
                kind,
                prompt: format!("q{}", i),
                options: ["a".into(), "b".into(), "c".into(), "d".into()],
                correct_index: i % 4,
                explanation: Some(format!("because {}", i)),
            })
            .collect();
        Session::new(user_id, user_id, kind, quiz_date, questions)
    }

    fn test_conn() -> (tempfile::TempDir, DbConnection) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let conn = get_connection(&pool).unwrap();
        (dir, conn)
    }

    #[test]
    fn daily_finalize_writes_attempt_and_counters() {
        let (_dir, conn) = test_conn();
        create_user(&conn, 1, None, None).unwrap();

        let mut session = make_session(1, TestKind::Daily, 4);
        for i in 0..4 {
            session.record_answer(i % 4); // all correct
        }
        let completed_at = session.started_at + Duration::seconds(90);

        let report = finalize(&conn, &session, completed_at).unwrap();
        assert_eq!(report.score, 4);
        assert_eq!(report.elapsed_secs, 90);
        assert!(report.results.iter().all(|r| r.correct));

        let user = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.total_tests, 1);
        assert_eq!(user.total_score, 4);
        assert!(has_attempt(&conn, 1, session.quiz_date).unwrap());

        let board = get_leaderboard(&conn, session.quiz_date, 5).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].score, 4);
    }

    #[test]
    fn second_daily_finalize_surfaces_duplicate_attempt() {
        let (_dir, conn) = test_conn();
        create_user(&conn, 4, None, None).unwrap();

        let mut first = make_session(4, TestKind::Daily, 2);
        first.record_answer(0);
        first.record_answer(1);
        finalize(&conn, &first, first.started_at).unwrap();

        // A second session for the same (user, date) that raced past
        // the pre-check must fail on the attempt backstop, detectably
        let mut second = make_session(4, TestKind::Daily, 2);
        second.record_answer(0);
        second.record_answer(1);
        let err = finalize(&conn, &second, second.started_at).unwrap_err();
        assert!(err.is_duplicate_attempt());
    }

    #[test]
    fn practice_counts_unanswered_as_wrong() {
        let (_dir, conn) = test_conn();
        create_user(&conn, 2, None, None).unwrap();

        // Answer 3 of 5 (2 correct), leave 2 unanswered as if timed out
        let mut session = make_session(2, TestKind::Practice, 5);
        session.record_answer(0); // correct (q0 expects 0)
        session.record_answer(1); // correct (q1 expects 1)
        session.record_answer(0); // wrong   (q2 expects 2)

        let completed_at = session.started_at + Duration::seconds(1800);
        let report = finalize(&conn, &session, completed_at).unwrap();
        assert_eq!(report.score, 2);
        assert_eq!(report.results[3].selected, None);
        assert!(!report.results[3].correct);

        let user = get_user(&conn, 2).unwrap().unwrap();
        assert_eq!(user.practice_tests, 1);
        assert_eq!(user.practice_correct, 2);
        assert_eq!(user.practice_wrong, 3);
        assert_eq!(user.total_tests, 0);
    }

    #[test]
    fn report_preserves_original_question_order() {
        let (_dir, conn) = test_conn();
        create_user(&conn, 3, None, None).unwrap();

        let mut session = make_session(3, TestKind::Practice, 3);
        session.record_answer(3);
        session.record_answer(3);
        session.record_answer(3);

        let report = finalize(&conn, &session, session.started_at).unwrap();
        let prompts: Vec<&str> = report.results.iter().map(|r| r.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["q0", "q1", "q2"]);
    }
}
