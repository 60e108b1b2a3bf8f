use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Answer, ExamAttempt, Question, QuestionOption};
use crate::db::types::{AttemptStatus, QuestionKind};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct JoinRequest {
    #[validate(length(min = 1, max = 64, message = "token must not be empty"))]
    pub(crate) token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerUpsertRequest {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "answerText")]
    #[validate(length(max = 20000, message = "answer_text is too long"))]
    pub(crate) answer_text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ScoreAdjustRequest {
    #[serde(default)]
    #[serde(alias = "manualAdjustment")]
    pub(crate) manual_adjustment: i32,
    #[serde(default)]
    #[serde(alias = "bonusPoints")]
    pub(crate) bonus_points: i32,
    #[serde(default)]
    #[validate(length(max = 2000, message = "reason is too long"))]
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublishRequest {
    #[serde(alias = "isPublished")]
    pub(crate) is_published: bool,
}

/// Student-facing option view. Never exposes is_correct.
#[derive(Debug, Serialize)]
pub(crate) struct OptionView {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) order_index: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) order_index: i32,
    pub(crate) options: Vec<OptionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerView {
    pub(crate) question_id: String,
    pub(crate) answer_text: String,
    pub(crate) updated_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) submit_reason: Option<String>,
    pub(crate) deadline: String,
    pub(crate) time_remaining_seconds: i64,
    pub(crate) tab_switch_count: i32,
    pub(crate) questions: Vec<QuestionView>,
    pub(crate) answers: Vec<AnswerView>,
}

/// Minimal state echo used where the full view would be wasteful:
/// submit responses and violation reports.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptStateResponse {
    pub(crate) id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<String>,
    pub(crate) submit_reason: Option<String>,
    pub(crate) tab_switch_count: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) published: bool,
    pub(crate) score: Option<i32>,
    pub(crate) final_score: Option<i32>,
    pub(crate) max_score: Option<i32>,
    pub(crate) essay_pending_count: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TeacherAttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) submit_reason: Option<String>,
    pub(crate) score: Option<i32>,
    pub(crate) original_score: Option<i32>,
    pub(crate) manual_adjustment: i32,
    pub(crate) bonus_points: i32,
    pub(crate) final_score: Option<i32>,
    pub(crate) max_score: i32,
    pub(crate) adjustment_reason: Option<String>,
    pub(crate) adjusted_by: Option<String>,
    pub(crate) adjusted_at: Option<String>,
    pub(crate) tab_switch_count: i32,
    pub(crate) is_published: bool,
}

impl AttemptStateResponse {
    pub(crate) fn from_attempt(attempt: &ExamAttempt) -> Self {
        Self {
            id: attempt.id.clone(),
            status: attempt.status,
            submitted_at: attempt.submitted_at.map(format_primitive),
            submit_reason: attempt.submit_reason.clone(),
            tab_switch_count: attempt.tab_switch_count,
        }
    }
}

impl TeacherAttemptResponse {
    pub(crate) fn from_attempt(attempt: &ExamAttempt) -> Self {
        Self {
            id: attempt.id.clone(),
            exam_id: attempt.exam_id.clone(),
            student_id: attempt.student_id.clone(),
            status: attempt.status,
            started_at: format_primitive(attempt.started_at),
            submitted_at: attempt.submitted_at.map(format_primitive),
            submit_reason: attempt.submit_reason.clone(),
            score: attempt.score,
            original_score: attempt.original_score,
            manual_adjustment: attempt.manual_adjustment,
            bonus_points: attempt.bonus_points,
            final_score: attempt.final_score,
            max_score: attempt.max_score,
            adjustment_reason: attempt.adjustment_reason.clone(),
            adjusted_by: attempt.adjusted_by.clone(),
            adjusted_at: attempt.adjusted_at.map(format_primitive),
            tab_switch_count: attempt.tab_switch_count,
            is_published: attempt.is_published,
        }
    }
}

pub(crate) fn question_views(
    questions: &[Question],
    options: &[QuestionOption],
) -> Vec<QuestionView> {
    questions
        .iter()
        .map(|question| QuestionView {
            id: question.id.clone(),
            kind: question.kind,
            prompt: question.prompt.clone(),
            order_index: question.order_index,
            options: options
                .iter()
                .filter(|option| option.question_id == question.id)
                .map(|option| OptionView {
                    id: option.id.clone(),
                    label: option.label.clone(),
                    order_index: option.order_index,
                })
                .collect(),
        })
        .collect()
}

pub(crate) fn answer_views(answers: &[Answer]) -> Vec<AnswerView> {
    answers
        .iter()
        .map(|answer| AnswerView {
            question_id: answer.question_id.clone(),
            answer_text: answer.answer_text.clone(),
            updated_at: format_primitive(answer.updated_at),
        })
        .collect()
}
