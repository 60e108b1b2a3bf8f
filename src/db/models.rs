use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AttemptStatus, ExamStatus, QuestionKind, UserRole, ViolationKind, ViolationStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) status: ExamStatus,
    pub(crate) token_hash: String,
    pub(crate) duration_minutes: i32,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) points_per_question: i32,
    pub(crate) max_tab_switches: i32,
    pub(crate) require_fullscreen: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) order_index: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) label: String,
    pub(crate) is_correct: bool,
    pub(crate) order_index: i32,
}

/// One student's run through one exam. Unique per (exam_id, student_id);
/// re-joining resumes the existing row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamAttempt {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) submit_reason: Option<String>,
    pub(crate) score: Option<i32>,
    pub(crate) original_score: Option<i32>,
    pub(crate) manual_adjustment: i32,
    pub(crate) bonus_points: i32,
    pub(crate) final_score: Option<i32>,
    pub(crate) max_score: i32,
    pub(crate) adjustment_reason: Option<String>,
    pub(crate) adjusted_by: Option<String>,
    pub(crate) adjusted_at: Option<PrimitiveDateTime>,
    pub(crate) tab_switch_count: i32,
    pub(crate) is_published: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) answer_text: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Violation {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) kind: ViolationKind,
    pub(crate) occurred_at: PrimitiveDateTime,
    pub(crate) duration_ms: Option<i64>,
    pub(crate) content: Option<String>,
    pub(crate) status: ViolationStatus,
    pub(crate) teacher_notes: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}
