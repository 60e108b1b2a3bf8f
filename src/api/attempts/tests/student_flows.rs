use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use super::{join_exam, report_violation, save_answer, submit_attempt};
use crate::core::time::primitive_now_utc;
use crate::db::types::{AttemptStatus, ExamStatus};
use crate::repositories;
use crate::test_support;

#[tokio::test]
async fn join_creates_then_resumes_attempt() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher001", "Teacher One", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student001", "Student One", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Algebra Midterm",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;
    test_support::insert_choice_question(ctx.state.db(), &exam.id, 1).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let created = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    assert_eq!(created["status"], "in_progress");
    assert_eq!(created["questions"].as_array().expect("questions").len(), 2);
    assert!(created["time_remaining_seconds"].as_i64().expect("remaining") > 0);
    // Answer keys never leak into the student view
    assert!(created["questions"][0]["options"][0].get("is_correct").is_none());

    let resumed = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::OK).await;
    assert_eq!(resumed["id"], created["id"]);
    assert_eq!(resumed["status"], "in_progress");

    // Token lookup is case-insensitive
    let lowercase = token.to_ascii_lowercase();
    let resumed = join_exam(ctx.app, &student_token, &lowercase, StatusCode::OK).await;
    assert_eq!(resumed["id"], created["id"]);
}

#[tokio::test]
async fn join_rejects_unknown_and_unavailable_exams() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher002", "Teacher Two", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student002", "Student Two", "student-pass")
            .await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    join_exam(ctx.app.clone(), &student_token, "NOSUCH", StatusCode::NOT_FOUND).await;

    let (_draft, draft_token) = test_support::insert_exam(
        ctx.state.db(),
        "Draft Exam",
        &teacher.id,
        test_support::ExamFixture { status: ExamStatus::Draft, ..Default::default() },
    )
    .await;
    join_exam(ctx.app.clone(), &student_token, &draft_token, StatusCode::BAD_REQUEST).await;

    let (_future, future_token) = test_support::insert_exam(
        ctx.state.db(),
        "Future Exam",
        &teacher.id,
        test_support::ExamFixture { window_start_offset_minutes: -30, ..Default::default() },
    )
    .await;
    join_exam(ctx.app.clone(), &student_token, &future_token, StatusCode::BAD_REQUEST).await;

    // Teachers cannot sit exams
    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts/join",
            Some(&teacher_token),
            Some(json!({ "token": "ABCDEF" })),
        ))
        .await
        .expect("teacher join");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn answer_upsert_is_latest_wins() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher003", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student003", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "History Quiz",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    let (question_id, correct_id, wrong_id) =
        test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id");

    save_answer(ctx.app.clone(), &student_token, attempt_id, &question_id, &wrong_id, StatusCode::OK)
        .await;
    save_answer(
        ctx.app.clone(),
        &student_token,
        attempt_id,
        &question_id,
        &correct_id,
        StatusCode::OK,
    )
    .await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("get attempt");
    assert_eq!(response.status(), StatusCode::OK);
    let view = test_support::read_json(response).await;

    let answers = view["answers"].as_array().expect("answers");
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0]["answer_text"], correct_id);

    // Questions from other exams are rejected
    let (other_exam, _other_token) = test_support::insert_exam(
        ctx.state.db(),
        "Other Exam",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    let (foreign_question, _, _) =
        test_support::insert_choice_question(ctx.state.db(), &other_exam.id, 0).await;
    save_answer(
        ctx.app,
        &student_token,
        attempt_id,
        &foreign_question,
        "whatever",
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn submit_is_idempotent_and_freezes_submission_time() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher004", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student004", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Physics Final",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    let (q1, correct1, _) = test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;
    let (_q2, _correct2, _) =
        test_support::insert_choice_question(ctx.state.db(), &exam.id, 1).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    save_answer(ctx.app.clone(), &student_token, &attempt_id, &q1, &correct1, StatusCode::OK).await;

    let first = submit_attempt(ctx.app.clone(), &student_token, &attempt_id).await;
    assert_eq!(first["status"], "submitted");
    let submitted_at = first["submitted_at"].as_str().expect("submitted_at").to_string();

    let second = submit_attempt(ctx.app.clone(), &student_token, &attempt_id).await;
    assert_eq!(second["status"], "submitted");
    assert_eq!(second["submitted_at"], submitted_at.as_str());

    save_answer(ctx.app, &student_token, &attempt_id, &q1, &correct1, StatusCode::CONFLICT).await;
}

#[tokio::test]
async fn answer_writes_serialize_against_a_racing_force_submit() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher012", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student012", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Contended Exam",
        &teacher.id,
        test_support::ExamFixture { points_per_question: 5, ..Default::default() },
    )
    .await;
    let (q1, correct1, _) = test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    // Take the attempt row lock the way a mid-flight answer write does
    let mut tx = ctx.state.db().begin().await.expect("tx");
    let locked = repositories::attempts::lock_by_id(&mut *tx, &attempt_id)
        .await
        .expect("lock attempt")
        .expect("attempt exists");
    assert_eq!(locked.status, AttemptStatus::InProgress);

    // A submit arriving now has to wait for that lock
    let racing_app = ctx.app.clone();
    let racing_token = student_token.clone();
    let racing_id = attempt_id.clone();
    let racing_submit = tokio::spawn(async move {
        racing_app
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/attempts/{racing_id}/submit"),
                Some(&racing_token),
                None,
            ))
            .await
            .expect("racing submit")
    });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!racing_submit.is_finished(), "submit must block behind the answer write");

    repositories::answers::upsert(
        &mut *tx,
        &Uuid::new_v4().to_string(),
        &attempt_id,
        &q1,
        &correct1,
        primitive_now_utc(),
    )
    .await
    .expect("upsert under lock");
    tx.commit().await.expect("commit");

    let response = racing_submit.await.expect("submit task");
    assert_eq!(response.status(), StatusCode::OK);
    let state = test_support::read_json(response).await;
    assert_eq!(state["status"], "submitted");

    // The write that won the lock is part of the recorded score...
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/attempts/{attempt_id}/publish"),
            Some(&teacher_token),
            Some(json!({ "is_published": true })),
        ))
        .await
        .expect("publish");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}/result"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("get result");
    let result = test_support::read_json(response).await;
    assert_eq!(result["score"], 5);

    // ...and once the transition has committed, a late write is rejected
    // even though its pre-flight check may have seen in_progress
    save_answer(ctx.app, &student_token, &attempt_id, &q1, &correct1, StatusCode::CONFLICT).await;
}

#[tokio::test]
async fn expired_attempt_transitions_lazily_at_the_deadline() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher005", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student005", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Timed Exam",
        &teacher.id,
        test_support::ExamFixture { duration_minutes: 60, ..Default::default() },
    )
    .await;
    test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    test_support::backdate_attempt_start(ctx.state.db(), &attempt_id, 90).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("get attempt");
    assert_eq!(response.status(), StatusCode::OK);
    let view = test_support::read_json(response).await;

    assert_eq!(view["status"], "submitted");
    assert_eq!(view["submit_reason"], "deadline-expired");
    assert_eq!(view["time_remaining_seconds"], 0);
    let submitted_at = view["submitted_at"].as_str().expect("submitted_at").to_string();

    // The later submit is a no-op; the recorded time stays the deadline.
    let state = submit_attempt(ctx.app.clone(), &student_token, &attempt_id).await;
    assert_eq!(state["submitted_at"], submitted_at.as_str());
    assert_eq!(state["submit_reason"], "deadline-expired");

    // And re-join reports the attempt as completed
    join_exam(ctx.app, &student_token, &token, StatusCode::CONFLICT).await;
}

#[tokio::test]
async fn tab_switch_limit_forces_submission_on_the_switch_after_the_limit() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher006", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student006", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Proctored Exam",
        &teacher.id,
        test_support::ExamFixture { max_tab_switches: 3, ..Default::default() },
    )
    .await;
    test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    for expected_count in 1..=3 {
        let body = report_violation(
            ctx.app.clone(),
            &student_token,
            &attempt_id,
            json!({ "kind": "tab_switch", "duration_ms": 1200 }),
            StatusCode::CREATED,
        )
        .await;
        assert_eq!(body["attempt"]["status"], "in_progress", "switch #{expected_count}");
        assert_eq!(body["attempt"]["tab_switch_count"], expected_count);
    }

    let body = report_violation(
        ctx.app.clone(),
        &student_token,
        &attempt_id,
        json!({ "kind": "tab_switch" }),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(body["attempt"]["status"], "submitted");
    assert_eq!(body["attempt"]["submit_reason"], "violation-limit-exceeded");
    assert_eq!(body["attempt"]["tab_switch_count"], 4);

    // Trailing reports inside the grace window are still recorded and
    // never re-open the attempt
    let body = report_violation(
        ctx.app,
        &student_token,
        &attempt_id,
        json!({ "kind": "tab_switch" }),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(body["attempt"]["status"], "submitted");
    assert_eq!(body["attempt"]["tab_switch_count"], 4);
}

#[tokio::test]
async fn non_forcing_violations_are_recorded_without_submission() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher007", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student007", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Lenient Exam",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    for kind in ["right_click", "copy_paste", "fullscreen_exit"] {
        for _ in 0..4 {
            let body = report_violation(
                ctx.app.clone(),
                &student_token,
                &attempt_id,
                json!({ "kind": kind, "content": "copied text" }),
                StatusCode::CREATED,
            )
            .await;
            assert_eq!(body["attempt"]["status"], "in_progress", "kind: {kind}");
        }
    }

    // None of those touched the tab-switch counter
    let body = report_violation(
        ctx.app,
        &student_token,
        &attempt_id,
        json!({ "kind": "tab_switch" }),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(body["attempt"]["tab_switch_count"], 1);
}

#[tokio::test]
async fn violations_rejected_after_the_grace_window() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher008", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student008", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Closed Exam",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    submit_attempt(ctx.app.clone(), &student_token, &attempt_id).await;

    // Inside the 300 s grace window the report is still accepted
    report_violation(
        ctx.app.clone(),
        &student_token,
        &attempt_id,
        json!({ "kind": "fullscreen_exit" }),
        StatusCode::CREATED,
    )
    .await;

    test_support::backdate_attempt_submission(ctx.state.db(), &attempt_id, 10).await;

    report_violation(
        ctx.app,
        &student_token,
        &attempt_id,
        json!({ "kind": "fullscreen_exit" }),
        StatusCode::CONFLICT,
    )
    .await;
}

#[tokio::test]
async fn result_is_hidden_until_published() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher009", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student009", "Student", "student-pass")
            .await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Graded Exam",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    let (q1, correct1, _) = test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    save_answer(ctx.app.clone(), &student_token, &attempt_id, &q1, &correct1, StatusCode::OK).await;
    submit_attempt(ctx.app.clone(), &student_token, &attempt_id).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}/result"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("get result");
    assert_eq!(response.status(), StatusCode::OK);
    let result = test_support::read_json(response).await;

    assert_eq!(result["published"], false);
    assert!(result["score"].is_null());
    assert!(result["final_score"].is_null());
}

#[tokio::test]
async fn attempts_are_private_to_their_student() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_teacher(ctx.state.db(), "teacher010", "Teacher", "teacher-pass")
            .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student010", "Student", "student-pass")
            .await;
    let other =
        test_support::insert_student(ctx.state.db(), "student011", "Other", "student-pass").await;
    let (exam, token) = test_support::insert_exam(
        ctx.state.db(),
        "Private Exam",
        &teacher.id,
        test_support::ExamFixture::default(),
    )
    .await;
    test_support::insert_choice_question(ctx.state.db(), &exam.id, 0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let other_token = test_support::bearer_token(&other.id, ctx.state.settings());
    let attempt = join_exam(ctx.app.clone(), &student_token, &token, StatusCode::CREATED).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id");

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts/{attempt_id}"),
            Some(&other_token),
            None,
        ))
        .await
        .expect("get attempt");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
