use std::collections::HashMap;

use thiserror::Error;

use crate::db::models::{Answer, Question, QuestionOption};
use crate::db::types::QuestionKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum AdjustmentError {
    #[error("a reason is required when adjustment or bonus is non-zero")]
    MissingReason,
    #[error("bonus_points must be non-negative")]
    NegativeBonus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawScore {
    pub(crate) score: i32,
    pub(crate) correct_count: i32,
    /// Essay questions are never auto-scored; they stay pending manual
    /// review rather than silently contributing zero.
    pub(crate) essay_pending_count: i32,
}

/// Uniform per-question weight over the exam's multiple-choice questions.
pub(crate) fn max_score(questions: &[Question], points_per_question: i32) -> i32 {
    let choice_count =
        questions.iter().filter(|q| q.kind == QuestionKind::MultipleChoice).count() as i32;
    choice_count * points_per_question
}

/// Compares each recorded answer against the question's single marked-correct
/// option. Answers to unknown questions or without a marked key award nothing.
pub(crate) fn compute_raw_score(
    questions: &[Question],
    options: &[QuestionOption],
    answers: &[Answer],
    points_per_question: i32,
) -> RawScore {
    let answer_by_question: HashMap<&str, &str> = answers
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer.answer_text.as_str()))
        .collect();

    let correct_by_question: HashMap<&str, &str> = options
        .iter()
        .filter(|option| option.is_correct)
        .map(|option| (option.question_id.as_str(), option.id.as_str()))
        .collect();

    let mut correct_count = 0;
    let mut essay_pending_count = 0;

    for question in questions {
        match question.kind {
            QuestionKind::Essay => {
                essay_pending_count += 1;
            }
            QuestionKind::MultipleChoice => {
                let selected = answer_by_question.get(question.id.as_str());
                let key = correct_by_question.get(question.id.as_str());
                if let (Some(selected), Some(key)) = (selected, key) {
                    if selected == key {
                        correct_count += 1;
                    }
                }
            }
        }
    }

    RawScore {
        score: correct_count * points_per_question,
        correct_count,
        essay_pending_count,
    }
}

pub(crate) fn clamp_final_score(
    original_score: i32,
    manual_adjustment: i32,
    bonus_points: i32,
    max_score: i32,
) -> i32 {
    (original_score + manual_adjustment + bonus_points).clamp(0, max_score)
}

pub(crate) fn validate_adjustment(
    manual_adjustment: i32,
    bonus_points: i32,
    reason: &str,
) -> Result<(), AdjustmentError> {
    if bonus_points < 0 {
        return Err(AdjustmentError::NegativeBonus);
    }
    if (manual_adjustment != 0 || bonus_points != 0) && reason.trim().is_empty() {
        return Err(AdjustmentError::MissingReason);
    }
    Ok(())
}
