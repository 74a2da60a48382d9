//! Question records and session set selection

use chrono::NaiveDate;
use rand::seq::SliceRandom;

use crate::config;
use crate::errors::{QuizError, Result};
use crate::quiz::session::TestKind;

/// A dated multiple-choice question.
///
/// Immutable once created; purged by the maintenance sweep after the
/// retention window.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub quiz_date: NaiveDate,
    pub kind: TestKind,
    pub prompt: String,
    pub options: [String; 4],
    /// Index into `options` of the right answer (0..=3)
    pub correct_index: usize,
    pub explanation: Option<String>,
}

/// Draws a full session set from the pool: uniform shuffle, take 25.
///
/// A pool smaller than a session is refused outright rather than
/// producing a short session.
pub fn select_session_set(pool: Vec<Question>) -> Result<Vec<Question>> {
    let needed = config::quiz::QUESTIONS_PER_SESSION;
    if pool.len() < needed {
        let (kind, date, available) = pool
            .first()
            .map(|q| (q.kind.as_str(), q.quiz_date, pool.len()))
            .unwrap_or(("daily", NaiveDate::MIN, 0));
        return Err(QuizError::InsufficientContent {
            kind,
            date,
            available,
            needed,
        });
    }

    let mut pool = pool;
    pool.shuffle(&mut rand::thread_rng());
    pool.truncate(needed);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pool(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                id: i as i64,
                quiz_date: NaiveDate::from_ymd_opt(2026, 8, 23).unwrap(),
                kind: TestKind::Daily,
                prompt: format!("q{}", i),
                options: ["a".into(), "b".into(), "c".into(), "d".into()],
                correct_index: 0,
                explanation: None,
            })
            .collect()
    }

    #[test]
    fn exact_pool_returns_all_in_some_order() {
        let set = select_session_set(make_pool(25)).unwrap();
        assert_eq!(set.len(), 25);

        let mut ids: Vec<i64> = set.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..25).collect::<Vec<i64>>());
    }

    #[test]
    fn oversized_pool_yields_exactly_one_session_worth() {
        let set = select_session_set(make_pool(30)).unwrap();
        assert_eq!(set.len(), 25);
    }

    #[test]
    fn short_pool_is_refused_never_truncated() {
        let err = select_session_set(make_pool(24)).unwrap_err();
        match err {
            QuizError::InsufficientContent { available, needed, .. } => {
                assert_eq!(available, 24);
                assert_eq!(needed, 25);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn empty_pool_is_refused() {
        assert!(matches!(
            select_session_set(Vec::new()),
            Err(QuizError::InsufficientContent { available: 0, .. })
        ));
    }
}
