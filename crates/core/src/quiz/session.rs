use chrono::{DateTime, NaiveDate, Utc};

use crate::quiz::questions::Question;

/// Which of the two test flavors a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Graded, one attempt per day, feeds the leaderboard
    Daily,
    /// Unlimited attempts, tracked only in personal practice counters
    Practice,
}

impl TestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Daily => "daily",
            TestKind::Practice => "practice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(TestKind::Daily),
            "practice" => Some(TestKind::Practice),
            _ => None,
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's in-progress test.
///
/// The question slice is snapshotted at creation; answers are compared
/// against that snapshot even if the store changes mid-session. The
/// registry owns the only live copy and hands it out exactly once on
/// completion.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub chat_id: i64,
    pub kind: TestKind,
    pub quiz_date: NaiveDate,
    pub questions: Vec<Question>,
    /// Index of the question currently awaiting an answer
    pub current: usize,
    pub score: u32,
    /// Selected option per question, in question order. `None` = unanswered.
    pub answers: Vec<Option<usize>>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: i64, chat_id: i64, kind: TestKind, quiz_date: NaiveDate, questions: Vec<Question>) -> Self {
        let answers = vec![None; questions.len()];
        Self {
            user_id,
            chat_id,
            kind,
            quiz_date,
            questions,
            current: 0,
            score: 0,
            answers,
            started_at: Utc::now(),
        }
    }

    /// The question awaiting an answer, or `None` once all are done.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    /// Records the selected option for the current question and advances.
    ///
    /// Returns whether the selection was correct. Out-of-range events
    /// after the last question are ignored.
    pub fn record_answer(&mut self, selected: usize) -> bool {
        let Some(question) = self.questions.get(self.current) else {
            return false;
        };
        let correct = selected == question.correct_index;
        self.answers[self.current] = Some(selected);
        if correct {
            self.score += 1;
        }
        self.current += 1;
        correct
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    /// Correct answers recorded so far.
    pub fn correct_count(&self) -> usize {
        self.answers
            .iter()
            .zip(&self.questions)
            .filter(|(answer, q)| **answer == Some(q.correct_index))
            .count()
    }

    /// Whole seconds since the session started, never negative.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}
