use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Violation;
use crate::db::types::{ViolationKind, ViolationStatus};
use crate::schemas::attempt::AttemptStateResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ViolationCreateRequest {
    pub(crate) kind: ViolationKind,
    #[serde(default)]
    #[serde(alias = "durationMs")]
    pub(crate) duration_ms: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 10000, message = "content is too long"))]
    pub(crate) content: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ViolationReviewRequest {
    pub(crate) status: ViolationStatus,
    #[serde(default)]
    #[validate(length(max = 2000, message = "notes are too long"))]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ViolationResponse {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) kind: ViolationKind,
    pub(crate) occurred_at: String,
    pub(crate) duration_ms: Option<i64>,
    pub(crate) content: Option<String>,
    pub(crate) status: ViolationStatus,
    pub(crate) teacher_notes: Option<String>,
}

/// Report responses echo the attempt so the client learns immediately
/// when the tab-switch policy has force-submitted it.
#[derive(Debug, Serialize)]
pub(crate) struct ViolationReportResponse {
    pub(crate) violation: ViolationResponse,
    pub(crate) attempt: AttemptStateResponse,
}

impl ViolationResponse {
    pub(crate) fn from_violation(violation: &Violation) -> Self {
        Self {
            id: violation.id.clone(),
            attempt_id: violation.attempt_id.clone(),
            kind: violation.kind,
            occurred_at: format_primitive(violation.occurred_at),
            duration_ms: violation.duration_ms,
            content: violation.content.clone(),
            status: violation.status,
            teacher_notes: violation.teacher_notes.clone(),
        }
    }
}
