//! End-to-end tests for the quiz engine: start → answer → finalize,
//! the daily one-attempt rule, timeout completion, and the retention
//! sweep, all against a real on-disk SQLite database.
//!
//! Run with: cargo test -p prepmitra-core --test session_flow_test

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

use prepmitra_core::quiz::ingest;
use prepmitra_core::quiz::questions::select_session_set;
use prepmitra_core::quiz::registry::{AnswerOutcome, SessionRegistry};
use prepmitra_core::quiz::scoring::finalize;
use prepmitra_core::quiz::session::{Session, TestKind};
use prepmitra_core::storage::db;
use prepmitra_core::QuizError;

struct Fixture {
    _dir: tempfile::TempDir,
    pool: db::DbPool,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quiz.sqlite");
    let pool = db::create_pool(path.to_str().unwrap()).unwrap();
    Fixture { _dir: dir, pool }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 23).unwrap()
}

fn seed_questions(conn: &db::DbConnection, date: NaiveDate, kind: TestKind, count: usize) {
    for i in 0..count {
        db::insert_question(
            conn,
            date,
            kind,
            &format!("question {}", i),
            &["a".into(), "b".into(), "c".into(), "d".into()],
            0,
            Some("first option is always right here"),
        )
        .unwrap();
    }
}

/// Scenario A: 30 daily questions, fresh user, all answers correct.
#[tokio::test]
async fn full_daily_run_scores_25_of_25() {
    let fx = fixture();
    let conn = db::get_connection(&fx.pool).unwrap();
    db::create_user(&conn, 10, Some("riya".into()), None).unwrap();
    seed_questions(&conn, today(), TestKind::Daily, 30);

    assert!(!db::has_attempt(&conn, 10, today()).unwrap());

    let pool = db::get_questions(&conn, today(), TestKind::Daily).unwrap();
    let set = select_session_set(pool).unwrap();
    assert_eq!(set.len(), 25);

    let registry = SessionRegistry::new();
    registry
        .create(Session::new(10, 10, TestKind::Daily, today(), set))
        .await
        .unwrap();

    // Every correct_index is 0; answer 0 throughout
    let mut finished = None;
    for _ in 0..24 {
        match registry.apply_answer(10, 0).await {
            Some(AnswerOutcome::Next { correct: true, .. }) => {}
            other => panic!("expected Next, got {:?}", other.is_some()),
        }
    }
    if let Some(AnswerOutcome::Finished { correct: true, session, .. }) = registry.apply_answer(10, 0).await {
        finished = Some(session);
    }
    let session = finished.expect("25th answer must finish the session");

    let report = finalize(&conn, &session, Utc::now()).unwrap();
    assert_eq!(report.score, 25);
    assert_eq!(report.total, 25);

    let user = db::get_user(&conn, 10).unwrap().unwrap();
    assert_eq!(user.total_tests, 1);
    assert_eq!(user.total_score, 25);
    assert!(db::has_attempt(&conn, 10, today()).unwrap());
    assert!(!registry.is_active(10).await);
}

/// Scenario B: an existing attempt blocks a second daily start.
#[tokio::test]
async fn second_daily_start_is_refused() {
    let fx = fixture();
    let conn = db::get_connection(&fx.pool).unwrap();
    db::create_user(&conn, 11, None, None).unwrap();
    seed_questions(&conn, today(), TestKind::Daily, 25);
    db::insert_attempt(&conn, 11, today(), 20, 700).unwrap();

    // The caller's pre-check, exactly as the bot layer performs it
    let start_result = if db::has_attempt(&conn, 11, today()).unwrap() {
        Err(QuizError::AlreadyAttempted(today()))
    } else {
        Ok(())
    };
    assert!(matches!(start_result, Err(QuizError::AlreadyAttempted(_))));

    let registry = SessionRegistry::new();
    assert_eq!(registry.active_count().await, 0);
}

/// Scenario C: timeout claims a half-answered session; unanswered
/// questions count wrong.
#[tokio::test]
async fn timeout_completes_partial_session() {
    let fx = fixture();
    let conn = db::get_connection(&fx.pool).unwrap();
    db::create_user(&conn, 12, None, None).unwrap();
    seed_questions(&conn, today(), TestKind::Practice, 25);

    let pool = db::get_questions(&conn, today(), TestKind::Practice).unwrap();
    let set = select_session_set(pool).unwrap();

    let registry = Arc::new(SessionRegistry::new());
    registry
        .create(Session::new(12, 12, TestKind::Practice, today(), set))
        .await
        .unwrap();

    for _ in 0..10 {
        assert!(registry.apply_answer(12, 0).await.is_some());
    }

    // The timer fires
    let session = registry.complete_if_active(12).await.expect("session still live");
    let completed_at = session.started_at + Duration::minutes(30);
    let report = finalize(&conn, &session, completed_at).unwrap();

    assert_eq!(report.score, 10);
    assert_eq!(report.elapsed_secs, 1800);

    let user = db::get_user(&conn, 12).unwrap().unwrap();
    assert_eq!(user.practice_tests, 1);
    assert_eq!(user.practice_correct, 10);
    assert_eq!(user.practice_wrong, 15);

    // Late answers after the timeout are no-ops
    assert!(registry.apply_answer(12, 0).await.is_none());
}

/// Scenario D: the sweep deletes by date, computed from trigger time.
#[test]
fn retention_sweep_keeps_recent_records() {
    let fx = fixture();
    let conn = db::get_connection(&fx.pool).unwrap();

    let trigger = today();
    let four_days_old = trigger - Duration::days(4);
    let two_days_old = trigger - Duration::days(2);

    seed_questions(&conn, four_days_old, TestKind::Daily, 1);
    seed_questions(&conn, two_days_old, TestKind::Daily, 1);
    db::insert_attempt(&conn, 1, four_days_old, 5, 60).unwrap();
    db::insert_attempt(&conn, 1, two_days_old, 6, 60).unwrap();

    let cutoff = trigger - Duration::days(prepmitra_core::config::maintenance::RETENTION_DAYS);
    let (questions, attempts) = db::purge_expired(&conn, cutoff).unwrap();
    assert_eq!((questions, attempts), (1, 1));

    assert!(db::get_questions(&conn, four_days_old, TestKind::Daily).unwrap().is_empty());
    assert_eq!(db::get_questions(&conn, two_days_old, TestKind::Daily).unwrap().len(), 1);
    assert!(db::has_attempt(&conn, 1, two_days_old).unwrap());
}

/// An upload seeds enough content for a session to start.
#[tokio::test]
async fn ingested_upload_feeds_a_session() {
    let fx = fixture();
    let conn = db::get_connection(&fx.pool).unwrap();
    db::create_user(&conn, 13, None, None).unwrap();

    let mut upload = String::new();
    for i in 0..25 {
        upload.push_str(&format!(
            "Q: question number {}?\nA) wrong\nB) right\nC) wrong\nD) wrong\nAnswer: B\n\n",
            i
        ));
    }
    // One malformed block must not poison the batch
    upload.push_str("Q: missing options\nAnswer: A\n");

    let summary = ingest::ingest_questions(&conn, today(), TestKind::Practice, &upload).unwrap();
    assert_eq!(summary.inserted, 25);
    assert_eq!(summary.skipped, 1);

    let pool = db::get_questions(&conn, today(), TestKind::Practice).unwrap();
    let set = select_session_set(pool).unwrap();

    let registry = SessionRegistry::new();
    registry
        .create(Session::new(13, 13, TestKind::Practice, today(), set))
        .await
        .unwrap();

    // Option B (index 1) is right for every ingested question
    let mut last = None;
    for _ in 0..25 {
        last = registry.apply_answer(13, 1).await;
    }
    match last {
        Some(AnswerOutcome::Finished { session, .. }) => {
            let report = finalize(&conn, &session, Utc::now()).unwrap();
            assert_eq!(report.score, 25);
        }
        _ => panic!("expected the 25th answer to finish"),
    }
}
