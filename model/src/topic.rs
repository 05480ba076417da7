use serde::{Deserialize, Serialize};

/// Number of questions available for one topic of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub question_count: u32,
}

impl TopicCount {
    pub fn new(topic: impl Into<String>, question_count: u32) -> Self {
        Self {
            topic: topic.into(),
            question_count,
        }
    }
}
