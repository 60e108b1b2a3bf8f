pub(crate) mod helpers;
mod student;
mod teacher;

use axum::{routing::get, routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        // Student endpoints
        .route("/join", post(student::join))
        .route("/:attempt_id", get(student::get_attempt))
        .route("/:attempt_id/answers", put(student::save_answer))
        .route("/:attempt_id/submit", post(student::submit))
        .route(
            "/:attempt_id/violations",
            post(student::report_violation).get(teacher::list_violations),
        )
        .route("/:attempt_id/result", get(student::get_result))
        // Teacher endpoints
        .route("/:attempt_id/review", get(teacher::review_attempt))
        .route("/:attempt_id/score", post(teacher::adjust_score))
        .route("/:attempt_id/publish", post(teacher::publish))
}

pub(crate) fn violations_router() -> Router<AppState> {
    Router::new().route("/:violation_id/review", post(teacher::review_violation))
}

#[cfg(test)]
mod tests;
