use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Lifecycle of a test session.
///
/// `Created -> Ongoing <-> Paused -> Completed`. `Completed` is terminal and
/// is only reached through finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Ongoing,
    Paused,
    Completed,
}

impl SessionStatus {
    /// Statuses a user can pick back up.
    pub const RESUMABLE: [SessionStatus; 3] = [Self::Ongoing, Self::Paused, Self::Created];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Ongoing => "ongoing",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    pub fn is_resumable(self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// Whether `self -> next` is a legal edge of the state machine.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Ongoing)
                | (Self::Ongoing, Self::Paused)
                | (Self::Paused, Self::Ongoing)
                | (Self::Ongoing, Self::Completed)
                | (Self::Paused, Self::Completed)
        )
    }
}

impl FromStr for SessionStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "ongoing" => Ok(Self::Ongoing),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(ModelError::UnknownSessionStatus(other.to_string())),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated test and, once completed, its aggregate outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSession {
    pub id: String,
    pub user_id: String,
    pub topics: Vec<String>,
    pub status: SessionStatus,
    pub time_remaining_secs: u32,
    pub total_questions: u32,
    pub total_marks: u32,
    pub score: Option<f64>,
    pub accuracy: Option<u32>,
    pub correct_count: Option<u32>,
    pub attempted_count: Option<u32>,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub updated_at: u64,
    /// `false` while the row carries local changes not yet pushed upstream.
    pub is_synced: bool,
}

/// `round(100 * correct / attempted)`, or 0 when nothing was attempted.
pub fn accuracy_percent(correct: u32, attempted: u32) -> u32 {
    if attempted == 0 {
        return 0;
    }
    (100.0 * f64::from(correct) / f64::from(attempted)).round() as u32
}
