//! Quiz engine: question store, session lifecycle, scoring, ingestion

pub mod ingest;
pub mod questions;
pub mod registry;
pub mod scoring;
pub mod session;

// Re-exports for convenience
pub use questions::{select_session_set, Question};
pub use registry::{AnswerOutcome, SessionRegistry};
pub use scoring::{finalize, SessionReport};
pub use session::{Session, TestKind};
