use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Progress of a single question inside a session. Marking for review is
/// tracked separately and can be set at any status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Unvisited,
    Viewed,
    Answered,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unvisited => "unvisited",
            Self::Viewed => "viewed",
            Self::Answered => "answered",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unvisited" => Ok(Self::Unvisited),
            "viewed" => Ok(Self::Viewed),
            "answered" => Ok(Self::Answered),
            other => Err(ModelError::UnknownAttemptStatus(other.to_string())),
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's answer. The shape must agree with the question variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UserAnswer {
    /// Single chosen option index (multiple choice).
    Option(u32),
    /// Chosen option indices (multiple select).
    Options(Vec<u32>),
    /// Typed numeric value (numerical).
    Numeric(f64),
}

impl UserAnswer {
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Option(_) => "option",
            Self::Options(_) => "options",
            Self::Numeric(_) => "numeric",
        }
    }
}

/// Per-question record inside a session. `(session_id, question_id)` is the
/// natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub session_id: String,
    pub question_id: String,
    pub attempt_order: u32,
    pub user_answer: Option<UserAnswer>,
    pub marked_for_review: bool,
    pub status: AttemptStatus,
    pub is_correct: Option<bool>,
    pub score: f64,
    pub time_spent_secs: u32,
    pub is_synced: bool,
}

impl Attempt {
    /// A fresh, unvisited attempt slot.
    pub fn new(session_id: &str, question_id: &str, attempt_order: u32) -> Self {
        Self {
            session_id: session_id.to_string(),
            question_id: question_id.to_string(),
            attempt_order,
            user_answer: None,
            marked_for_review: false,
            status: AttemptStatus::Unvisited,
            is_correct: None,
            score: 0.0,
            time_spent_secs: 0,
            is_synced: true,
        }
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.session_id, &self.question_id)
    }
}
