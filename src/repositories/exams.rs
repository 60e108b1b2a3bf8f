use sqlx::PgPool;

use crate::db::models::Exam;

const COLUMNS: &str = "\
    id, title, description, status, token_hash, duration_minutes, \
    start_time, end_time, points_per_question, max_tab_switches, \
    require_fullscreen, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_token_hash(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE token_hash = $1"))
        .bind(token_hash)
        .fetch_optional(pool)
        .await
}
