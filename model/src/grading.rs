//! Answer validation and scoring.
//!
//! - Numerical: correct within an absolute tolerance, no negative marking.
//! - Multiple choice: exact index match; a wrong answer costs a third of the marks.
//! - Multiple select: the chosen set must equal the correct set; no negative marking.
//!
//! An unanswered question always scores zero and is never correct.

use std::collections::BTreeSet;

use crate::{ModelError, QuestionKind, UserAnswer};

/// Default absolute tolerance for numerical answers.
pub const DEFAULT_NUMERIC_TOLERANCE: f64 = 0.01;

/// Outcome of grading one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub is_correct: bool,
    pub score: f64,
}

impl Grade {
    const UNANSWERED: Grade = Grade {
        is_correct: false,
        score: 0.0,
    };
}

/// Check that `answer` has the shape `kind` expects and references only
/// existing options.
pub fn validate_answer(kind: &QuestionKind, answer: &UserAnswer) -> Result<(), ModelError> {
    match (kind, answer) {
        (QuestionKind::Numerical { .. }, UserAnswer::Numeric(_)) => Ok(()),
        (QuestionKind::MultipleChoice { options, .. }, UserAnswer::Option(index)) => {
            check_index(*index, options.len())
        }
        (QuestionKind::MultipleSelect { options, .. }, UserAnswer::Options(indices)) => {
            if indices.is_empty() {
                return Err(ModelError::EmptySelection);
            }
            indices
                .iter()
                .try_for_each(|index| check_index(*index, options.len()))
        }
        (kind, answer) => Err(ModelError::AnswerMismatch {
            expected: kind.question_type(),
            got: answer.shape(),
        }),
    }
}

fn check_index(index: u32, options: usize) -> Result<(), ModelError> {
    if (index as usize) < options {
        Ok(())
    } else {
        Err(ModelError::OptionOutOfRange { index, options })
    }
}

/// Grade an answer against a question worth `marks`.
pub fn grade(
    kind: &QuestionKind,
    marks: u32,
    answer: Option<&UserAnswer>,
    tolerance: f64,
) -> Result<Grade, ModelError> {
    let Some(answer) = answer else {
        return Ok(Grade::UNANSWERED);
    };
    validate_answer(kind, answer)?;

    let marks = f64::from(marks);
    let grade = match (kind, answer) {
        (QuestionKind::Numerical { correct_answer }, UserAnswer::Numeric(value)) => {
            let is_correct = (value - correct_answer).abs() <= tolerance;
            Grade {
                is_correct,
                score: if is_correct { marks } else { 0.0 },
            }
        }
        (QuestionKind::MultipleChoice { correct_option, .. }, UserAnswer::Option(chosen)) => {
            if chosen == correct_option {
                Grade {
                    is_correct: true,
                    score: marks,
                }
            } else {
                Grade {
                    is_correct: false,
                    score: -marks / 3.0,
                }
            }
        }
        (QuestionKind::MultipleSelect { correct_options, .. }, UserAnswer::Options(chosen)) => {
            let chosen: BTreeSet<u32> = chosen.iter().copied().collect();
            let is_correct = &chosen == correct_options;
            Grade {
                is_correct,
                score: if is_correct { marks } else { 0.0 },
            }
        }
        (kind, answer) => {
            return Err(ModelError::AnswerMismatch {
                expected: kind.question_type(),
                got: answer.shape(),
            })
        }
    };
    Ok(grade)
}
