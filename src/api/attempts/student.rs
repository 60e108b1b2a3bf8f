use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::db::models::ExamAttempt;
use crate::db::types::{AttemptStatus, ExamStatus};
use crate::repositories;
use crate::schemas::attempt::{
    AnswerUpsertRequest, AnswerView, AttemptResponse, AttemptResultResponse,
    AttemptStateResponse, JoinRequest,
};
use crate::schemas::violation::{
    ViolationCreateRequest, ViolationReportResponse, ViolationResponse,
};
use crate::services::{attempt_timing, exam_tokens, proctoring, scoring};

pub(in crate::api::attempts) async fn join(
    CurrentStudent(user): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<JoinRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let token_hash = exam_tokens::hash_join_token(&payload.token);
    let exam = repositories::exams::find_by_token_hash(state.db(), &token_hash)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    if exam.status != ExamStatus::Published {
        return Err(ApiError::BadRequest("Exam is not available".to_string()));
    }

    let now = helpers::now_primitive();
    if now < exam.start_time {
        return Err(ApiError::BadRequest("Exam has not started yet".to_string()));
    }
    if now > exam.end_time {
        return Err(ApiError::BadRequest("Exam has ended".to_string()));
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::acquire_join_lock(&mut *tx, &exam.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire join lock"))?;

    let existing = repositories::attempts::find_by_exam_and_student(&mut *tx, &exam.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    if let Some(attempt) = existing {
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return resume(&state, attempt).await;
    }

    let questions = repositories::questions::list_by_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let max_score = scoring::max_score(&questions, exam.points_per_question);

    let attempt_id = Uuid::new_v4().to_string();
    let inserted = repositories::attempts::create(
        &mut *tx,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            exam_id: &exam.id,
            student_id: &user.id,
            status: AttemptStatus::InProgress,
            started_at: now,
            max_score,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

    if !inserted {
        let attempt =
            repositories::attempts::find_by_exam_and_student(&mut *tx, &exam.id, &user.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
                .ok_or_else(|| {
                    ApiError::Conflict("An attempt already exists for this exam".to_string())
                })?;
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
        return resume(&state, attempt).await;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        attempt_id = %attempt_id,
        exam_id = %exam.id,
        student_id = %user.id,
        "Attempt started"
    );

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;
    let deadline =
        attempt_timing::compute_deadline(attempt.started_at, exam.duration_minutes, exam.end_time);
    let view = helpers::attempt_view(state.db(), &attempt, &exam, deadline).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Re-join path: an in-progress attempt is returned as-is (after the
/// lazy deadline check); a terminal one is a conflict, never a restart.
async fn resume(
    state: &AppState,
    attempt: ExamAttempt,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    if attempt.status.is_terminal() {
        return Err(ApiError::Conflict("Attempt already completed".to_string()));
    }

    let view = helpers::attempt_view(state.db(), &attempt, &exam, deadline).await?;
    Ok((StatusCode::OK, Json(view)))
}

pub(in crate::api::attempts) async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentStudent(user): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;
    let view = helpers::attempt_view(state.db(), &attempt, &exam, deadline).await?;

    Ok(Json(view))
}

pub(in crate::api::attempts) async fn save_answer(
    Path(attempt_id): Path<String>,
    CurrentStudent(user): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<AnswerUpsertRequest>,
) -> Result<Json<AnswerView>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (_deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::Conflict("Attempt is closed".to_string()));
    }

    let belongs =
        repositories::questions::belongs_to_exam(state.db(), &payload.question_id, &exam.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check question"))?;
    if !belongs {
        return Err(ApiError::BadRequest("Question does not belong to this exam".to_string()));
    }

    // The write rechecks the status under the attempt row lock so it
    // serializes against the guarded terminal transition: a force-submit
    // that committed after the check above is seen here and the write is
    // rejected instead of landing on a terminal attempt.
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::storage(e, "Failed to start transaction"))?;

    let locked = repositories::attempts::lock_by_id(&mut *tx, &attempt.id)
        .await
        .map_err(|e| ApiError::storage(e, "Failed to lock attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if locked.status != AttemptStatus::InProgress {
        return Err(ApiError::Conflict("Attempt is closed".to_string()));
    }

    let answer = repositories::answers::upsert(
        &mut *tx,
        &Uuid::new_v4().to_string(),
        &locked.id,
        &payload.question_id,
        &payload.answer_text,
        helpers::now_primitive(),
    )
    .await
    .map_err(|e| ApiError::storage(e, "Failed to save answer"))?;

    tx.commit().await.map_err(|e| ApiError::storage(e, "Failed to commit transaction"))?;

    Ok(Json(AnswerView {
        question_id: answer.question_id,
        answer_text: answer.answer_text,
        updated_at: crate::core::time::format_primitive(answer.updated_at),
    }))
}

pub(in crate::api::attempts) async fn submit(
    Path(attempt_id): Path<String>,
    CurrentStudent(user): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (_deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    // A repeated submit (browser retry, or a race lost to the deadline
    // or the violation policy) is a no-op success, never an error.
    if attempt.status.is_terminal() {
        return Ok(Json(AttemptStateResponse::from_attempt(&attempt)));
    }

    let now = helpers::now_primitive();
    let won = repositories::attempts::submit_in_progress(
        state.db(),
        &attempt.id,
        now,
        helpers::STUDENT_SUBMIT_REASON,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to submit attempt"))?;

    if won {
        helpers::finalize_raw_score(state.db(), &attempt.id, &exam).await?;
        tracing::info!(
            attempt_id = %attempt.id,
            student_id = %user.id,
            "Attempt submitted"
        );
    }

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to refresh attempt"))?;

    Ok(Json(AttemptStateResponse::from_attempt(&attempt)))
}

pub(in crate::api::attempts) async fn report_violation(
    Path(attempt_id): Path<String>,
    CurrentStudent(user): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<ViolationCreateRequest>,
) -> Result<(StatusCode, Json<ViolationReportResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (_deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    let proctoring_settings = state.settings().proctoring();
    let now = helpers::now_primitive();

    // Terminal attempts still accept trailing reports for a short grace
    // window so the client can flush its queue; they are never re-opened.
    let accepted = match attempt.status {
        AttemptStatus::InProgress => true,
        _ => attempt.submitted_at.is_some_and(|submitted_at| {
            attempt_timing::within_violation_grace(
                now,
                submitted_at,
                proctoring_settings.violation_grace_seconds,
            )
        }),
    };
    if !accepted {
        return Err(ApiError::Conflict("Attempt is closed".to_string()));
    }

    let rate_key = format!("rl:violations:{}", attempt.id);
    let allowed = state
        .redis()
        .rate_limit(
            &rate_key,
            proctoring_settings.violation_rate_limit,
            proctoring_settings.violation_rate_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many violation reports, slow down"));
    }

    let evidence = proctoring::normalize_evidence(
        payload.kind,
        payload.duration_ms,
        payload.content,
        proctoring_settings.violation_content_max_chars,
    );

    let violation = repositories::violations::create(
        state.db(),
        repositories::violations::CreateViolation {
            id: &Uuid::new_v4().to_string(),
            attempt_id: &attempt.id,
            kind: payload.kind,
            occurred_at: now,
            duration_ms: evidence.duration_ms,
            content: evidence.content,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::storage(e, "Failed to record violation"))?;

    let policy = proctoring::ViolationPolicy::from_exam(&exam);
    if attempt.status == AttemptStatus::InProgress && policy.counts_toward_limit(payload.kind) {
        let count =
            repositories::attempts::increment_tab_switches(state.db(), &attempt.id, now)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to count tab switch"))?;

        if policy.exceeds_tab_switch_limit(count) {
            let won = repositories::attempts::submit_in_progress(
                state.db(),
                &attempt.id,
                now,
                proctoring::VIOLATION_LIMIT_REASON,
                now,
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to force-submit attempt"))?;

            if won {
                helpers::finalize_raw_score(state.db(), &attempt.id, &exam).await?;
                tracing::warn!(
                    attempt_id = %attempt.id,
                    student_id = %user.id,
                    tab_switches = count,
                    "Attempt force-submitted by violation policy"
                );
            }
        }
    }

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to refresh attempt"))?;

    let response = ViolationReportResponse {
        violation: ViolationResponse::from_violation(&violation),
        attempt: AttemptStateResponse::from_attempt(&attempt),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

pub(in crate::api::attempts) async fn get_result(
    Path(attempt_id): Path<String>,
    CurrentStudent(user): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;
    let (_deadline, attempt) = helpers::enforce_deadline(&attempt, &exam, state.db()).await?;

    if !attempt.is_published {
        return Ok(Json(AttemptResultResponse {
            attempt_id: attempt.id,
            status: attempt.status,
            published: false,
            score: None,
            final_score: None,
            max_score: None,
            essay_pending_count: None,
        }));
    }

    let questions = repositories::questions::list_by_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let essay_pending_count = questions
        .iter()
        .filter(|q| q.kind == crate::db::types::QuestionKind::Essay)
        .count() as i32;

    Ok(Json(AttemptResultResponse {
        attempt_id: attempt.id,
        status: attempt.status,
        published: true,
        score: attempt.score,
        final_score: attempt.final_score.or(attempt.score),
        max_score: Some(attempt.max_score),
        essay_pending_count: Some(essay_pending_count),
    }))
}
