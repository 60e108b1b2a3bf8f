use sqlx::PgPool;

use crate::db::models::Answer;

const COLUMNS: &str = "id, attempt_id, question_id, answer_text, created_at, updated_at";

/// Idempotent latest-wins write keyed on (attempt_id, question_id).
/// A retried save lands on the same row. Callers run this inside the
/// transaction that holds the attempt row lock.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    attempt_id: &str,
    question_id: &str,
    answer_text: &str,
    now: time::PrimitiveDateTime,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO answers (id, attempt_id, question_id, answer_text, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$5)
         ON CONFLICT (attempt_id, question_id)
         DO UPDATE SET answer_text = EXCLUDED.answer_text, updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(attempt_id)
    .bind(question_id)
    .bind(answer_text)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_attempt(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers WHERE attempt_id = $1 ORDER BY question_id"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}
