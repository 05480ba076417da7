use serde::{Deserialize, Serialize};

/// A user's report against a question. Unique per `(user_id, question_id)`
/// on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionReport {
    pub user_id: String,
    pub question_id: String,
    pub reason: String,
    pub details: Option<String>,
}
