//! Domain types for timed topic tests: questions, sessions, attempts and grading.
//!
//! Everything here is plain data plus pure functions. Storage lives in
//! `exam-offline`, the remote contract in `exam-remote`.

pub mod attempt;
pub mod grading;
pub mod question;
pub mod session;
pub mod topic;

pub use attempt::{Attempt, AttemptStatus, UserAnswer};
pub use grading::{grade, validate_answer, Grade, DEFAULT_NUMERIC_TOLERANCE};
pub use question::{Difficulty, Question, QuestionKind, QuestionMetadata, QuestionSyncMetadata};
pub use session::{accuracy_percent, SessionStatus, TestSession};
pub use topic::TopicCount;

/// Errors raised by the pure domain layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Unknown session status: {0}")]
    UnknownSessionStatus(String),
    #[error("Unknown attempt status: {0}")]
    UnknownAttemptStatus(String),
    #[error("Unknown difficulty: {0}")]
    UnknownDifficulty(String),
    #[error("Answer shape {got} does not fit a {expected} question")]
    AnswerMismatch {
        expected: &'static str,
        got: &'static str,
    },
    #[error("Option {index} out of range ({options} options)")]
    OptionOutOfRange { index: u32, options: usize },
    #[error("Empty selection")]
    EmptySelection,
}
