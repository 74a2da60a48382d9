use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result;

use crate::quiz::questions::Question;
use crate::quiz::session::TestKind;

/// A bot user with cumulative test counters.
///
/// Created on first contact. Counters are mutated only by the scoring
/// sink after a session completes; rows are never deleted.
#[derive(Debug, Clone)]
pub struct User {
    /// Telegram ID of the user
    pub telegram_id: i64,
    /// Telegram username, if available
    pub username: Option<String>,
    /// Display name
    pub first_name: Option<String>,
    /// Number of finished daily tests
    pub total_tests: i64,
    /// Sum of all daily test scores
    pub total_score: i64,
    /// Number of finished practice tests
    pub practice_tests: i64,
    /// Correct answers across all practice tests
    pub practice_correct: i64,
    /// Wrong (or unanswered) answers across all practice tests
    pub practice_wrong: i64,
}

/// One row of the daily leaderboard.
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub score: i64,
    pub elapsed_secs: i64,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures
/// the schema exists on the first connection.
pub fn create_pool(database_path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = migrate_schema(&conn) {
        log::warn!("Failed to migrate schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Ensure all tables and indexes exist. Safe to run repeatedly.
pub fn migrate_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id INTEGER PRIMARY KEY,
            username TEXT,
            first_name TEXT,
            total_tests INTEGER NOT NULL DEFAULT 0,
            total_score INTEGER NOT NULL DEFAULT 0,
            practice_tests INTEGER NOT NULL DEFAULT 0,
            practice_correct INTEGER NOT NULL DEFAULT 0,
            practice_wrong INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            quiz_date TEXT NOT NULL,
            quiz_type TEXT NOT NULL,
            prompt TEXT NOT NULL,
            option_a TEXT NOT NULL,
            option_b TEXT NOT NULL,
            option_c TEXT NOT NULL,
            option_d TEXT NOT NULL,
            correct_index INTEGER NOT NULL,
            explanation TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_questions_date_type ON questions(quiz_date, quiz_type)",
        [],
    )?;

    // UNIQUE(user_id, quiz_date) backs the one-daily-attempt-per-day rule
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            quiz_date TEXT NOT NULL,
            score INTEGER NOT NULL,
            elapsed_secs INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id, quiz_date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attempts_date ON attempts(quiz_date)",
        [],
    )?;

    Ok(())
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn date_from_sql(idx: usize, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

/// Creates a new user with zeroed counters.
pub fn create_user(
    conn: &DbConnection,
    telegram_id: i64,
    username: Option<String>,
    first_name: Option<String>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, username, first_name) VALUES (?1, ?2, ?3)",
        &[
            &telegram_id as &dyn rusqlite::ToSql,
            &username as &dyn rusqlite::ToSql,
            &first_name as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Fetches a user by Telegram ID.
///
/// Returns `Ok(None)` when the user has never contacted the bot.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT telegram_id, username, first_name, total_tests, total_score,
                practice_tests, practice_correct, practice_wrong
         FROM users WHERE telegram_id = ?",
    )?;
    let mut rows = stmt.query(&[&telegram_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(User {
            telegram_id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            total_tests: row.get(3)?,
            total_score: row.get(4)?,
            practice_tests: row.get(5)?,
            practice_correct: row.get(6)?,
            practice_wrong: row.get(7)?,
        }))
    } else {
        Ok(None)
    }
}

/// Returns every known user, used by the daily broadcast.
pub fn get_all_users(conn: &DbConnection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT telegram_id, username, first_name, total_tests, total_score,
                practice_tests, practice_correct, practice_wrong
         FROM users ORDER BY telegram_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(User {
            telegram_id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            total_tests: row.get(3)?,
            total_score: row.get(4)?,
            practice_tests: row.get(5)?,
            practice_correct: row.get(6)?,
            practice_wrong: row.get(7)?,
        })
    })?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Applies a finished daily test to the user's cumulative counters.
pub fn add_daily_result(conn: &DbConnection, telegram_id: i64, score: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET total_tests = total_tests + 1, total_score = total_score + ?1
         WHERE telegram_id = ?2",
        &[&score as &dyn rusqlite::ToSql, &telegram_id as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Applies a finished practice test to the user's cumulative counters.
pub fn add_practice_result(conn: &DbConnection, telegram_id: i64, correct: i64, wrong: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET practice_tests = practice_tests + 1,
                          practice_correct = practice_correct + ?1,
                          practice_wrong = practice_wrong + ?2
         WHERE telegram_id = ?3",
        &[
            &correct as &dyn rusqlite::ToSql,
            &wrong as &dyn rusqlite::ToSql,
            &telegram_id as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Inserts one question for a given date and test type.
pub fn insert_question(
    conn: &DbConnection,
    date: NaiveDate,
    kind: TestKind,
    prompt: &str,
    options: &[String; 4],
    correct_index: usize,
    explanation: Option<&str>,
) -> Result<()> {
    let date_str = date_to_sql(date);
    let kind_str = kind.as_str();
    let correct = correct_index as i64;
    conn.execute(
        "INSERT INTO questions (quiz_date, quiz_type, prompt, option_a, option_b, option_c, option_d, correct_index, explanation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        &[
            &date_str as &dyn rusqlite::ToSql,
            &kind_str as &dyn rusqlite::ToSql,
            &prompt as &dyn rusqlite::ToSql,
            &options[0] as &dyn rusqlite::ToSql,
            &options[1] as &dyn rusqlite::ToSql,
            &options[2] as &dyn rusqlite::ToSql,
            &options[3] as &dyn rusqlite::ToSql,
            &correct as &dyn rusqlite::ToSql,
            &explanation as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Fetches the full question pool for a date and test type.
pub fn get_questions(conn: &DbConnection, date: NaiveDate, kind: TestKind) -> Result<Vec<Question>> {
    let date_str = date_to_sql(date);
    let kind_str = kind.as_str();
    let mut stmt = conn.prepare(
        "SELECT id, quiz_date, prompt, option_a, option_b, option_c, option_d, correct_index, explanation
         FROM questions WHERE quiz_date = ?1 AND quiz_type = ?2 ORDER BY id",
    )?;
    let rows = stmt.query_map(
        &[&date_str as &dyn rusqlite::ToSql, &kind_str as &dyn rusqlite::ToSql],
        |row| {
            let date_raw: String = row.get(1)?;
            Ok(Question {
                id: row.get(0)?,
                quiz_date: date_from_sql(1, &date_raw)?,
                kind,
                prompt: row.get(2)?,
                options: [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
                correct_index: row.get::<_, i64>(7)? as usize,
                explanation: row.get(8)?,
            })
        },
    )?;

    let mut questions = Vec::new();
    for row in rows {
        questions.push(row?);
    }
    Ok(questions)
}

/// Counts questions available for a date and test type.
pub fn count_questions(conn: &DbConnection, date: NaiveDate, kind: TestKind) -> Result<i64> {
    let date_str = date_to_sql(date);
    let kind_str = kind.as_str();
    conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE quiz_date = ?1 AND quiz_type = ?2",
        &[&date_str as &dyn rusqlite::ToSql, &kind_str as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )
}

/// True if the user already has a finalized daily attempt for the date.
pub fn has_attempt(conn: &DbConnection, user_id: i64, date: NaiveDate) -> Result<bool> {
    let date_str = date_to_sql(date);
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attempts WHERE user_id = ?1 AND quiz_date = ?2",
        &[&user_id as &dyn rusqlite::ToSql, &date_str as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Records one finalized daily attempt.
///
/// The session registry guarantees this is reached at most once per
/// session; the UNIQUE(user_id, quiz_date) constraint backs that up
/// at the storage layer.
pub fn insert_attempt(
    conn: &DbConnection,
    user_id: i64,
    date: NaiveDate,
    score: i64,
    elapsed_secs: i64,
) -> Result<()> {
    let date_str = date_to_sql(date);
    conn.execute(
        "INSERT INTO attempts (user_id, quiz_date, score, elapsed_secs) VALUES (?1, ?2, ?3, ?4)",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &date_str as &dyn rusqlite::ToSql,
            &score as &dyn rusqlite::ToSql,
            &elapsed_secs as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Today's ranking: best score first, faster finish breaks ties.
pub fn get_leaderboard(conn: &DbConnection, date: NaiveDate, limit: i64) -> Result<Vec<LeaderboardRow>> {
    let date_str = date_to_sql(date);
    let mut stmt = conn.prepare(
        "SELECT a.user_id, u.username, u.first_name, a.score, a.elapsed_secs
         FROM attempts a LEFT JOIN users u ON u.telegram_id = a.user_id
         WHERE a.quiz_date = ?1
         ORDER BY a.score DESC, a.elapsed_secs ASC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(
        &[&date_str as &dyn rusqlite::ToSql, &limit as &dyn rusqlite::ToSql],
        |row| {
            Ok(LeaderboardRow {
                user_id: row.get(0)?,
                username: row.get(1)?,
                first_name: row.get(2)?,
                score: row.get(3)?,
                elapsed_secs: row.get(4)?,
            })
        },
    )?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Counts questions and attempts older than the cutoff date (exclusive).
pub fn count_expired(conn: &DbConnection, cutoff: NaiveDate) -> Result<(i64, i64)> {
    let cutoff_str = date_to_sql(cutoff);
    let questions: i64 = conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE quiz_date < ?1",
        &[&cutoff_str as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    let attempts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attempts WHERE quiz_date < ?1",
        &[&cutoff_str as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    Ok((questions, attempts))
}

/// Deletes questions and attempts dated before the cutoff.
///
/// The cutoff is computed from the sweep's trigger time, not from each
/// record's creation time. Returns (questions_deleted, attempts_deleted).
pub fn purge_expired(conn: &DbConnection, cutoff: NaiveDate) -> Result<(usize, usize)> {
    let cutoff_str = date_to_sql(cutoff);
    let questions = conn.execute(
        "DELETE FROM questions WHERE quiz_date < ?1",
        &[&cutoff_str as &dyn rusqlite::ToSql],
    )?;
    let attempts = conn.execute(
        "DELETE FROM attempts WHERE quiz_date < ?1",
        &[&cutoff_str as &dyn rusqlite::ToSql],
    )?;

    if questions > 0 || attempts > 0 {
        log::info!("Purged {} question(s) and {} attempt(s)", questions, attempts);
    }

    Ok((questions, attempts))
}
