use sqlx::PgPool;

use crate::db::models::ExamAttempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, status, started_at, submitted_at, submit_reason, \
    score, original_score, manual_adjustment, bonus_points, final_score, \
    max_score, adjustment_reason, adjusted_by, adjusted_at, tab_switch_count, \
    is_published, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: time::PrimitiveDateTime,
    pub(crate) max_score: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

/// Serializes concurrent joins for one (exam, student) pair within the
/// surrounding transaction. The unique constraint is the backstop.
pub(crate) async fn acquire_join_lock(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    student_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("attempt:{exam_id}:{student_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Row-locks the attempt for the surrounding transaction. Writes made
/// under this lock serialize against the guarded terminal transition in
/// `submit_in_progress`, which contends for the same row.
pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<ExamAttempt, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_exam_and_student(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    student_id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE exam_id = $1 AND student_id = $2"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO exam_attempts (
            id, exam_id, student_id, status, started_at, max_score, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.exam_id)
    .bind(attempt.student_id)
    .bind(attempt.status)
    .bind(attempt.started_at)
    .bind(attempt.max_score)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Guarded terminal transition. Zero rows affected means the attempt was
/// already terminal; submitted_at is written exactly once.
pub(crate) async fn submit_in_progress(
    pool: &PgPool,
    id: &str,
    submitted_at: time::PrimitiveDateTime,
    reason: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts
         SET status = $1, submitted_at = $2, submit_reason = $3, updated_at = $4
         WHERE id = $5 AND status = $6",
    )
    .bind(AttemptStatus::Submitted)
    .bind(submitted_at)
    .bind(reason)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// original_score is captured on the first computation and never
/// overwritten; score and max_score track the latest computation.
pub(crate) async fn record_raw_score(
    pool: &PgPool,
    id: &str,
    score: i32,
    max_score: i32,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_attempts
         SET score = $1, original_score = COALESCE(original_score, $1),
             max_score = $2, updated_at = $3
         WHERE id = $4",
    )
    .bind(score)
    .bind(max_score)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn increment_tab_switches(
    pool: &PgPool,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE exam_attempts
         SET tab_switch_count = tab_switch_count + 1, updated_at = $1
         WHERE id = $2
         RETURNING tab_switch_count",
    )
    .bind(now)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn apply_adjustment(
    pool: &PgPool,
    id: &str,
    manual_adjustment: i32,
    bonus_points: i32,
    final_score: i32,
    reason: &str,
    adjusted_by: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts
         SET manual_adjustment = $1, bonus_points = $2, final_score = $3,
             adjustment_reason = $4, adjusted_by = $5, adjusted_at = $6,
             status = $7, updated_at = $6
         WHERE id = $8 AND status IN ($9, $7)",
    )
    .bind(manual_adjustment)
    .bind(bonus_points)
    .bind(final_score)
    .bind(reason)
    .bind(adjusted_by)
    .bind(now)
    .bind(AttemptStatus::Completed)
    .bind(id)
    .bind(AttemptStatus::Submitted)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_published(
    pool: &PgPool,
    id: &str,
    is_published: bool,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exam_attempts SET is_published = $1, updated_at = $2 WHERE id = $3")
        .bind(is_published)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
