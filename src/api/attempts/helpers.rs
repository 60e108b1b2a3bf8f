use time::PrimitiveDateTime;

use crate::api::errors::ApiError;
pub(crate) use crate::core::time::primitive_now_utc as now_primitive;
use crate::db::models::{Exam, ExamAttempt};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{answer_views, question_views, AttemptResponse};
use crate::services::{attempt_timing, scoring};

pub(crate) const DEADLINE_EXPIRED_REASON: &str = "deadline-expired";
pub(crate) const STUDENT_SUBMIT_REASON: &str = "student-submit";

pub(crate) async fn fetch_exam(pool: &sqlx::PgPool, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(pool, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

pub(crate) async fn fetch_attempt(
    pool: &sqlx::PgPool,
    attempt_id: &str,
) -> Result<ExamAttempt, ApiError> {
    repositories::attempts::find_by_id(pool, attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))
}

/// Lazy deadline enforcement: every read or mutation re-derives the
/// authoritative deadline and, if it has passed while the attempt is
/// still in progress, transitions it first. The recorded submission
/// time is the deadline itself, not the observation time.
pub(crate) async fn enforce_deadline(
    attempt: &ExamAttempt,
    exam: &Exam,
    pool: &sqlx::PgPool,
) -> Result<(PrimitiveDateTime, ExamAttempt), ApiError> {
    let deadline = attempt_timing::compute_deadline(
        attempt.started_at,
        exam.duration_minutes,
        exam.end_time,
    );

    let now = now_primitive();
    if attempt.status == AttemptStatus::InProgress
        && attempt_timing::is_past_deadline(now, deadline)
    {
        let won = repositories::attempts::submit_in_progress(
            pool,
            &attempt.id,
            deadline,
            DEADLINE_EXPIRED_REASON,
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to expire attempt"))?;

        if won {
            tracing::info!(
                attempt_id = %attempt.id,
                exam_id = %attempt.exam_id,
                "Attempt expired at deadline"
            );
            finalize_raw_score(pool, &attempt.id, exam).await?;
        }

        let refreshed = repositories::attempts::fetch_one_by_id(pool, &attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to refresh attempt"))?;
        return Ok((deadline, refreshed));
    }

    Ok((deadline, attempt.clone()))
}

/// Computes and persists the raw score for a freshly terminal attempt.
/// Only the caller that won the guarded transition should invoke this.
pub(crate) async fn finalize_raw_score(
    pool: &sqlx::PgPool,
    attempt_id: &str,
    exam: &Exam,
) -> Result<(), ApiError> {
    let questions = repositories::questions::list_by_exam(pool, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_by_exam(pool, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question options"))?;
    let answers = repositories::answers::list_by_attempt(pool, attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    let raw = scoring::compute_raw_score(&questions, &options, &answers, exam.points_per_question);
    let max_score = scoring::max_score(&questions, exam.points_per_question);

    repositories::attempts::record_raw_score(pool, attempt_id, raw.score, max_score, now_primitive())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record score"))?;

    tracing::info!(
        attempt_id = %attempt_id,
        score = raw.score,
        max_score,
        correct = raw.correct_count,
        essays_pending = raw.essay_pending_count,
        "Raw score recorded"
    );

    Ok(())
}

/// Full student-facing view: questions without answer keys, saved
/// answers, and the remaining time against the authoritative deadline.
pub(crate) async fn attempt_view(
    pool: &sqlx::PgPool,
    attempt: &ExamAttempt,
    exam: &Exam,
    deadline: PrimitiveDateTime,
) -> Result<AttemptResponse, ApiError> {
    let questions = repositories::questions::list_by_exam(pool, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_by_exam(pool, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question options"))?;
    let answers = repositories::answers::list_by_attempt(pool, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    let time_remaining_seconds = if attempt.status == AttemptStatus::InProgress {
        attempt_timing::remaining_seconds(now_primitive(), deadline)
    } else {
        0
    };

    Ok(AttemptResponse {
        id: attempt.id.clone(),
        exam_id: attempt.exam_id.clone(),
        status: attempt.status,
        started_at: crate::core::time::format_primitive(attempt.started_at),
        submitted_at: attempt.submitted_at.map(crate::core::time::format_primitive),
        submit_reason: attempt.submit_reason.clone(),
        deadline: crate::core::time::format_primitive(deadline),
        time_remaining_seconds,
        tab_switch_count: attempt.tab_switch_count,
        questions: question_views(&questions, &options),
        answers: answer_views(&answers),
    })
}
