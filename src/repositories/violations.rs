use sqlx::PgPool;

use crate::db::models::Violation;
use crate::db::types::{ViolationKind, ViolationStatus};

const COLUMNS: &str = "\
    id, attempt_id, kind, occurred_at, duration_ms, content, status, \
    teacher_notes, created_at";

pub(crate) struct CreateViolation<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) kind: ViolationKind,
    pub(crate) occurred_at: time::PrimitiveDateTime,
    pub(crate) duration_ms: Option<i64>,
    pub(crate) content: Option<String>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    violation: CreateViolation<'_>,
) -> Result<Violation, sqlx::Error> {
    sqlx::query_as::<_, Violation>(&format!(
        "INSERT INTO violations (
            id, attempt_id, kind, occurred_at, duration_ms, content, status, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}"
    ))
    .bind(violation.id)
    .bind(violation.attempt_id)
    .bind(violation.kind)
    .bind(violation.occurred_at)
    .bind(violation.duration_ms)
    .bind(violation.content)
    .bind(ViolationStatus::Pending)
    .bind(violation.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_by_attempt(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<Violation>, sqlx::Error> {
    sqlx::query_as::<_, Violation>(&format!(
        "SELECT {COLUMNS} FROM violations WHERE attempt_id = $1 ORDER BY occurred_at, id"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn review(
    pool: &PgPool,
    id: &str,
    status: ViolationStatus,
    teacher_notes: Option<&str>,
) -> Result<Option<Violation>, sqlx::Error> {
    sqlx::query_as::<_, Violation>(&format!(
        "UPDATE violations SET status = $1, teacher_notes = $2 WHERE id = $3 RETURNING {COLUMNS}"
    ))
    .bind(status)
    .bind(teacher_notes)
    .bind(id)
    .fetch_optional(pool)
    .await
}
