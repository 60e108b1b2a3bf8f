use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use crate::test_support;

mod student_flows;

/// Joins an exam by token and returns the attempt body.
async fn join_exam(
    app: Router,
    student_token: &str,
    join_token: &str,
    expected: StatusCode,
) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts/join",
            Some(student_token),
            Some(json!({ "token": join_token })),
        ))
        .await
        .expect("join exam");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, expected, "response: {body}");
    body
}

async fn save_answer(
    app: Router,
    student_token: &str,
    attempt_id: &str,
    question_id: &str,
    answer_text: &str,
    expected: StatusCode,
) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/attempts/{attempt_id}/answers"),
            Some(student_token),
            Some(json!({ "question_id": question_id, "answer_text": answer_text })),
        ))
        .await
        .expect("save answer");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, expected, "response: {body}");
    body
}

async fn submit_attempt(
    app: Router,
    student_token: &str,
    attempt_id: &str,
) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/submit"),
            Some(student_token),
            None,
        ))
        .await
        .expect("submit attempt");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    body
}

async fn report_violation(
    app: Router,
    student_token: &str,
    attempt_id: &str,
    payload: serde_json::Value,
    expected: StatusCode,
) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/violations"),
            Some(student_token),
            Some(payload),
        ))
        .await
        .expect("report violation");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, expected, "response: {body}");
    body
}
