//! Bulk question ingestion from free-text upload blocks.
//!
//! Upload format, one block per question, blocks separated by blank
//! lines:
//!
//! ```text
//! Q: The powerhouse of the cell is?
//! A) Nucleus
//! B) Mitochondria
//! C) Ribosome
//! D) Golgi body
//! Answer: B
//! Explanation: Mitochondria produce most of the cell's ATP.
//! ```
//!
//! Malformed blocks are skipped (never aborting the batch), but each
//! skip carries a structured parse error and the total is logged so a
//! silent upload shortfall is diagnosable.

use chrono::NaiveDate;
use thiserror::Error;

use crate::errors::Result;
use crate::quiz::session::TestKind;
use crate::storage::db::{self, DbConnection};

/// Why one question block failed to parse.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing question line (expected 'Q:')")]
    MissingPrompt,
    #[error("expected exactly 4 options, found {0}")]
    WrongOptionCount(usize),
    #[error("missing 'Answer:' line")]
    MissingAnswer,
    #[error("answer must be one of A-D, got '{0}'")]
    BadAnswer(String),
}

/// A validated question block, ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub prompt: String,
    pub options: [String; 4],
    pub correct_index: usize,
    pub explanation: Option<String>,
}

/// Outcome of a whole upload: parsed questions plus per-block failures.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub parsed: Vec<ParsedQuestion>,
    /// (1-based block number, error) for every skipped block
    pub skipped: Vec<(usize, ParseError)>,
}

/// Counts reported back to the uploader.
#[derive(Debug, Clone, Copy)]
pub struct IngestSummary {
    pub inserted: usize,
    pub skipped: usize,
}

fn option_line(line: &str, letter: char) -> Option<String> {
    let rest = line.strip_prefix(letter).or_else(|| line.strip_prefix(letter.to_ascii_lowercase()))?;
    let rest = rest.strip_prefix(')').or_else(|| rest.strip_prefix('.'))?;
    Some(rest.trim().to_string())
}

/// Parses a single question block.
pub fn parse_block(block: &str) -> std::result::Result<ParsedQuestion, ParseError> {
    let mut prompt: Option<String> = None;
    let mut options: Vec<String> = Vec::new();
    let mut answer: Option<String> = None;
    let mut explanation: Option<String> = None;

    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("Q:") {
            prompt = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Answer:") {
            answer = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Explanation:") {
            explanation = Some(rest.trim().to_string());
        } else if options.len() < 4 {
            let letter = (b'A' + options.len() as u8) as char;
            if let Some(text) = option_line(line, letter) {
                options.push(text);
            } else if prompt.is_some() {
                // Continuation of the prompt before options start
                if options.is_empty() && answer.is_none() {
                    if let Some(p) = prompt.as_mut() {
                        p.push(' ');
                        p.push_str(line);
                    }
                }
            }
        }
    }

    let prompt = prompt.filter(|p| !p.is_empty()).ok_or(ParseError::MissingPrompt)?;
    if options.len() != 4 {
        return Err(ParseError::WrongOptionCount(options.len()));
    }
    let answer = answer.ok_or(ParseError::MissingAnswer)?;
    let correct_index = match answer.to_ascii_uppercase().as_str() {
        "A" => 0,
        "B" => 1,
        "C" => 2,
        "D" => 3,
        other => return Err(ParseError::BadAnswer(other.to_string())),
    };

    let mut options_arr: [String; 4] = Default::default();
    for (slot, option) in options_arr.iter_mut().zip(options) {
        *slot = option;
    }

    Ok(ParsedQuestion {
        prompt,
        options: options_arr,
        correct_index,
        explanation: explanation.filter(|e| !e.is_empty()),
    })
}

/// Splits an upload into blocks and parses each one.
pub fn parse_batch(text: &str) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (index, block) in text.split("\n\n").filter(|b| !b.trim().is_empty()).enumerate() {
        match parse_block(block) {
            Ok(question) => outcome.parsed.push(question),
            Err(e) => outcome.skipped.push((index + 1, e)),
        }
    }

    outcome
}

/// Parses an upload and inserts every valid question for (date, kind).
pub fn ingest_questions(conn: &DbConnection, date: NaiveDate, kind: TestKind, text: &str) -> Result<IngestSummary> {
    let outcome = parse_batch(text);

    for question in &outcome.parsed {
        db::insert_question(
            conn,
            date,
            kind,
            &question.prompt,
            &question.options,
            question.correct_index,
            question.explanation.as_deref(),
        )?;
    }

    if !outcome.skipped.is_empty() {
        log::warn!(
            "Question upload for {} ({}): skipped {} malformed block(s)",
            date,
            kind,
            outcome.skipped.len()
        );
        for (block, err) in &outcome.skipped {
            log::debug!("  block {}: {}", block, err);
        }
    }

    Ok(IngestSummary {
        inserted: outcome.parsed.len(),
        skipped: outcome.skipped.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_BLOCK: &str = "Q: The powerhouse of the cell is?\n\
                              A) Nucleus\n\
                              B) Mitochondria\n\
                              C) Ribosome\n\
                              D) Golgi body\n\
                              Answer: B\n\
                              Explanation: Mitochondria produce most of the cell's ATP.";

    #[test]
    fn valid_block_parses() {
        let q = parse_block(GOOD_BLOCK).unwrap();
        assert_eq!(q.prompt, "The powerhouse of the cell is?");
        assert_eq!(q.options[1], "Mitochondria");
        assert_eq!(q.correct_index, 1);
        assert!(q.explanation.is_some());
    }

    #[test]
    fn explanation_is_optional() {
        let block = "Q: 2+2?\nA) 3\nB) 4\nC) 5\nD) 6\nAnswer: b";
        let q = parse_block(block).unwrap();
        assert_eq!(q.correct_index, 1);
        assert_eq!(q.explanation, None);
    }

    #[test]
    fn missing_option_is_a_structured_error() {
        let block = "Q: 2+2?\nA) 3\nB) 4\nC) 5\nAnswer: B";
        assert_eq!(parse_block(block).unwrap_err(), ParseError::WrongOptionCount(3));
    }

    #[test]
    fn bad_answer_letter_is_rejected() {
        let block = "Q: 2+2?\nA) 3\nB) 4\nC) 5\nD) 6\nAnswer: E";
        assert_eq!(parse_block(block).unwrap_err(), ParseError::BadAnswer("E".into()));
    }

    #[test]
    fn batch_skips_malformed_blocks_but_keeps_count() {
        let text = format!("{}\n\nQ: broken block\n\n{}", GOOD_BLOCK, GOOD_BLOCK);
        let outcome = parse_batch(&text);
        assert_eq!(outcome.parsed.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].0, 2);
    }
}
