use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::core::state::AppState;
use crate::db::types::ViolationStatus;
use crate::repositories;
use crate::schemas::attempt::{PublishRequest, ScoreAdjustRequest, TeacherAttemptResponse};
use crate::schemas::violation::{ViolationResponse, ViolationReviewRequest};
use crate::services::scoring;

pub(in crate::api::attempts) async fn review_attempt(
    Path(attempt_id): Path<String>,
    CurrentTeacher(_user): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<TeacherAttemptResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (_deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    Ok(Json(TeacherAttemptResponse::from_attempt(&attempt)))
}

pub(in crate::api::attempts) async fn list_violations(
    Path(attempt_id): Path<String>,
    CurrentTeacher(_user): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<ViolationResponse>>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;

    let violations = repositories::violations::list_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch violations"))?;

    Ok(Json(violations.iter().map(ViolationResponse::from_violation).collect()))
}

pub(in crate::api::attempts) async fn review_violation(
    Path(violation_id): Path<String>,
    CurrentTeacher(user): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ViolationReviewRequest>,
) -> Result<Json<ViolationResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    if payload.status == ViolationStatus::Pending {
        return Err(ApiError::BadRequest(
            "Review status must be verified or dismissed".to_string(),
        ));
    }

    let violation = repositories::violations::review(
        state.db(),
        &violation_id,
        payload.status,
        payload.notes.as_deref(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to review violation"))?
    .ok_or_else(|| ApiError::NotFound("Violation not found".to_string()))?;

    tracing::info!(
        violation_id = %violation.id,
        attempt_id = %violation.attempt_id,
        status = ?violation.status,
        reviewed_by = %user.id,
        "Violation reviewed"
    );

    Ok(Json(ViolationResponse::from_violation(&violation)))
}

pub(in crate::api::attempts) async fn adjust_score(
    Path(attempt_id): Path<String>,
    CurrentTeacher(user): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ScoreAdjustRequest>,
) -> Result<Json<TeacherAttemptResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    scoring::validate_adjustment(
        payload.manual_adjustment,
        payload.bonus_points,
        &payload.reason,
    )
    .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (_deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    if !attempt.status.is_terminal() {
        return Err(ApiError::Conflict("Attempt is still in progress".to_string()));
    }

    let original_score = attempt
        .original_score
        .ok_or_else(|| ApiError::Conflict("Attempt has not been scored yet".to_string()))?;

    let final_score = scoring::clamp_final_score(
        original_score,
        payload.manual_adjustment,
        payload.bonus_points,
        attempt.max_score,
    );

    let updated = repositories::attempts::apply_adjustment(
        state.db(),
        &attempt.id,
        payload.manual_adjustment,
        payload.bonus_points,
        final_score,
        payload.reason.trim(),
        &user.id,
        helpers::now_primitive(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to apply adjustment"))?;

    if !updated {
        return Err(ApiError::Conflict("Attempt is still in progress".to_string()));
    }

    tracing::info!(
        attempt_id = %attempt.id,
        adjusted_by = %user.id,
        manual_adjustment = payload.manual_adjustment,
        bonus_points = payload.bonus_points,
        final_score,
        "Score adjusted"
    );

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to refresh attempt"))?;

    Ok(Json(TeacherAttemptResponse::from_attempt(&attempt)))
}

pub(in crate::api::attempts) async fn publish(
    Path(attempt_id): Path<String>,
    CurrentTeacher(user): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<PublishRequest>,
) -> Result<Json<TeacherAttemptResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (_deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    // Nothing to reveal before the attempt is scored
    if !attempt.status.is_terminal() {
        return Err(ApiError::Conflict("Attempt is still in progress".to_string()));
    }

    repositories::attempts::set_published(
        state.db(),
        &attempt.id,
        payload.is_published,
        helpers::now_primitive(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update publication"))?;

    tracing::info!(
        attempt_id = %attempt.id,
        is_published = payload.is_published,
        published_by = %user.id,
        "Attempt publication updated"
    );

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to refresh attempt"))?;

    Ok(Json(TeacherAttemptResponse::from_attempt(&attempt)))
}
