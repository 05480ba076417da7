use exam_model::{accuracy_percent, Attempt, AttemptStatus, TestSession};
use serde::Serialize;

/// Result breakdown of a test.
///
/// `skipped` counts questions that were opened but left unanswered;
/// `unvisited` counts questions never opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    pub session_id: String,
    pub total_questions: u32,
    pub total_marks: u32,
    pub attempted: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub skipped: u32,
    pub unvisited: u32,
    pub marked_for_review: u32,
    pub score: f64,
    pub accuracy: u32,
    pub time_spent_secs: u32,
}

impl TestSummary {
    pub fn from_attempts(session: &TestSession, attempts: &[Attempt]) -> Self {
        let mut summary = Self {
            session_id: session.id.clone(),
            total_questions: attempts.len() as u32,
            total_marks: session.total_marks,
            attempted: 0,
            correct: 0,
            incorrect: 0,
            skipped: 0,
            unvisited: 0,
            marked_for_review: 0,
            score: 0.0,
            accuracy: 0,
            time_spent_secs: 0,
        };

        for attempt in attempts {
            if attempt.user_answer.is_some() {
                summary.attempted += 1;
                match attempt.is_correct {
                    Some(true) => summary.correct += 1,
                    Some(false) => summary.incorrect += 1,
                    None => {}
                }
            } else {
                match attempt.status {
                    AttemptStatus::Unvisited => summary.unvisited += 1,
                    AttemptStatus::Viewed | AttemptStatus::Answered => summary.skipped += 1,
                }
            }
            if attempt.marked_for_review {
                summary.marked_for_review += 1;
            }
            summary.score += attempt.score;
            summary.time_spent_secs = summary.time_spent_secs.saturating_add(attempt.time_spent_secs);
        }

        summary.accuracy = accuracy_percent(summary.correct, summary.attempted);
        summary
    }
}
