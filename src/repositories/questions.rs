use sqlx::PgPool;

use crate::db::models::{Question, QuestionOption};

const COLUMNS: &str = "id, exam_id, kind, prompt, order_index, created_at";

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY order_index, id"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_options_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(
        "SELECT o.id, o.question_id, o.label, o.is_correct, o.order_index \
         FROM question_options o \
         JOIN questions q ON q.id = o.question_id \
         WHERE q.exam_id = $1 ORDER BY o.question_id, o.order_index, o.id",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn belongs_to_exam(
    pool: &PgPool,
    question_id: &str,
    exam_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT id FROM questions WHERE id = $1 AND exam_id = $2")
            .bind(question_id)
            .bind(exam_id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}
