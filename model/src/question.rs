use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Difficulty band assigned to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(ModelError::UnknownDifficulty(other.to_string())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The answerable part of a question. Each variant carries only the fields
/// that are meaningful for it: numerical questions have no options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "question_type", rename_all = "snake_case")]
pub enum QuestionKind {
    Numerical {
        correct_answer: f64,
    },
    MultipleChoice {
        options: Vec<String>,
        correct_option: u32,
    },
    MultipleSelect {
        options: Vec<String>,
        correct_options: BTreeSet<u32>,
    },
}

impl QuestionKind {
    /// Discriminant string, as stored in the `question_type` column.
    pub fn question_type(&self) -> &'static str {
        match self {
            Self::Numerical { .. } => "numerical",
            Self::MultipleChoice { .. } => "multiple_choice",
            Self::MultipleSelect { .. } => "multiple_select",
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::Numerical { .. } => None,
            Self::MultipleChoice { options, .. } | Self::MultipleSelect { options, .. } => {
                Some(options)
            }
        }
    }
}

/// Provenance details nested inside a question record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    pub question_set: Option<String>,
    pub paper_type: Option<String>,
    pub language: Option<String>,
}

/// An immutable exam item. The remote store owns it; the local copy is a
/// read-mostly replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub year: u16,
    pub question_number: u32,
    pub subject: String,
    pub topic: Option<String>,
    pub question_text: String,
    pub difficulty: Difficulty,
    pub marks: u32,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub source: Option<String>,
    pub verified: bool,
    pub explanation: Option<String>,
    #[serde(default)]
    pub metadata: QuestionMetadata,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Per-subject freshness record for the local question cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSyncMetadata {
    pub subject: String,
    pub last_fetched_at: u64,
    pub last_sync: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numerical() -> Question {
        Question {
            id: "q1".to_string(),
            year: 2021,
            question_number: 12,
            subject: "Algorithms".to_string(),
            topic: Some("Sorting".to_string()),
            question_text: "How many swaps?".to_string(),
            difficulty: Difficulty::Medium,
            marks: 2,
            kind: QuestionKind::Numerical {
                correct_answer: 4.0,
            },
            tags: BTreeSet::new(),
            source: None,
            verified: true,
            explanation: None,
            metadata: QuestionMetadata::default(),
            created_at: 10,
            updated_at: 20,
        }
    }

    #[test]
    fn numerical_json_has_no_options() {
        let json = serde_json::to_value(numerical()).unwrap();
        assert_eq!(json["question_type"], "numerical");
        assert!(json.get("options").is_none());
    }

    #[test]
    fn question_type_discriminant_matches_serde_tag() {
        let kinds = vec![
            QuestionKind::Numerical {
                correct_answer: 1.5,
            },
            QuestionKind::MultipleChoice {
                options: vec!["a".into(), "b".into()],
                correct_option: 1,
            },
            QuestionKind::MultipleSelect {
                options: vec!["a".into(), "b".into()],
                correct_options: [0, 1].into_iter().collect(),
            },
        ];
        for kind in kinds {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json["question_type"], kind.question_type());
        }
    }

    #[test]
    fn missing_tags_and_metadata_default() {
        let mut json = serde_json::to_value(numerical()).unwrap();
        let obj = json.as_object_mut().unwrap();
        obj.remove("tags");
        obj.remove("metadata");
        let q: Question = serde_json::from_value(json).unwrap();
        assert!(q.tags.is_empty());
        assert_eq!(q.metadata, QuestionMetadata::default());
    }

    #[test]
    fn difficulty_parse() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("brutal".parse::<Difficulty>().is_err());
    }
}
