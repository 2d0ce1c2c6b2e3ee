use axum::http::{header, Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::services::gemini_ocr::OcrError;
use crate::test_support::{
    self, json_request, multipart_request, png_bytes, read_json, FakeReader,
};

fn key_payload() -> serde_json::Value {
    json!({
        "paper_name": "Physics Midterm",
        "answers": [
            { "question_number": 1, "correct_options": ["A"] },
            { "question_number": 2, "correct_options": ["b", "c"], "marks": 2 },
            { "question_number": 3, "correct_option": "D" }
        ]
    })
}

async fn create_paper(app: &axum::Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/papers", Some(key_payload())))
        .await
        .expect("create paper");
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = read_json(response).await;
    assert_eq!(json["max_marks"], 4.0);
    assert_eq!(json["answers"][1]["correct_options"], json!(["B", "C"]));
    json["id"].as_str().expect("paper id").to_string()
}

#[tokio::test]
#[ignore = "requires a local Postgres test database"]
async fn manual_submission_is_scored_and_reported() {
    let ctx = test_support::setup_test_context(FakeReader::default()).await;
    let app = ctx.app.clone();
    let paper_id = create_paper(&app).await;

    let submission = json!({
        "paper_id": paper_id,
        "roll_number": "cs-101",
        "student_name": "Asha",
        "answers": [
            { "question_number": 1, "selected_options": ["a"] },
            { "question_number": 2, "selected_options": ["B"] },
            { "question_number": 3, "selected_options": [] },
            { "question_number": 9, "selected_options": ["C"] }
        ]
    });
    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/submissions", Some(submission)))
        .await
        .expect("create submission");
    assert_eq!(response.status(), StatusCode::CREATED);
    let saved = read_json(response).await;
    assert_eq!(saved["roll_number"], "CS-101");
    assert_eq!(saved["total_marks"], 2.0);
    assert_eq!(saved["percentage"], 50.0);
    assert_eq!(saved["grade"], "C");
    assert_eq!(saved["statistics"], json!({
        "correct": 1, "partial": 1, "incorrect": 0, "not_answered": 1
    }));
    let submission_id = saved["submission_id"].as_str().expect("submission id").to_string();

    let detail = app
        .clone()
        .oneshot(json_request(Method::GET, &format!("/api/v1/results/{submission_id}"), None))
        .await
        .expect("detail");
    assert_eq!(detail.status(), StatusCode::OK);
    let detail = read_json(detail).await;
    assert_eq!(detail["questions"].as_array().map(Vec::len), Some(3));
    assert_eq!(detail["questions"][1]["status"], "partial");
    assert_eq!(detail["questions"][1]["marks"], 1.0);
    assert_eq!(detail["questions"][2]["status"], "not_answered");
    assert_eq!(detail["statistics"]["total_questions"], 3);

    let by_roll = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/results/by-roll/cs-101", None))
        .await
        .expect("by roll");
    assert_eq!(by_roll.status(), StatusCode::OK);
    assert_eq!(read_json(by_roll).await["results"].as_array().map(Vec::len), Some(1));

    let preview = app
        .clone()
        .oneshot(json_request(
            Method::GET,
            &format!("/api/v1/papers/{paper_id}/submissions-preview"),
            None,
        ))
        .await
        .expect("preview");
    let preview = read_json(preview).await;
    assert_eq!(preview["total_submissions"], 1);
    assert_eq!(preview["submissions"][0]["grade"], "C");

    let export = app
        .clone()
        .oneshot(json_request(Method::GET, &format!("/api/v1/papers/{paper_id}/export"), None))
        .await
        .expect("export");
    assert_eq!(export.status(), StatusCode::OK);
    let disposition = export
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Physics_Midterm_Results_"));

    let analytics = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/results/analytics", None))
        .await
        .expect("analytics");
    let analytics = read_json(analytics).await;
    assert_eq!(analytics["total_papers"], 1);
    assert_eq!(analytics["unique_students"], 1);
    assert_eq!(analytics["average_percentage"], 50.0);
    assert_eq!(analytics["top_performers"][0]["roll_number"], "CS-101");

    let deleted = app
        .clone()
        .oneshot(json_request(Method::DELETE, &format!("/api/v1/papers/{paper_id}"), None))
        .await
        .expect("delete");
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app
        .oneshot(json_request(Method::GET, &format!("/api/v1/results/{submission_id}"), None))
        .await
        .expect("gone");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a local Postgres test database"]
async fn resubmission_replaces_the_earlier_result() {
    let ctx = test_support::setup_test_context(FakeReader::default()).await;
    let app = ctx.app.clone();
    let paper_id = create_paper(&app).await;

    for selected in [["B"], ["A"]] {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(json!({
                    "paper_id": paper_id,
                    "roll_number": "R7",
                    "answers": [{ "question_number": 1, "selected_options": selected }]
                })),
            ))
            .await
            .expect("submission");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let count = crate::repositories::submissions::count_for_paper(ctx.state.db(), &paper_id)
        .await
        .expect("count");
    assert_eq!(count, 1);

    let list = app
        .oneshot(json_request(Method::GET, "/api/v1/submissions", None))
        .await
        .expect("list");
    let list = read_json(list).await;
    assert_eq!(list["total_count"], 1);
    assert_eq!(list["items"][0]["total_marks"], 1.0);
}

#[tokio::test]
#[ignore = "requires a local Postgres test database"]
async fn unknown_paper_is_not_found() {
    let ctx = test_support::setup_test_context(FakeReader::default()).await;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/submissions",
            Some(json!({
                "paper_id": "missing",
                "roll_number": "R1",
                "answers": [{ "question_number": 1, "selected_options": ["A"] }]
            })),
        ))
        .await
        .expect("submission");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let export = ctx
        .app
        .oneshot(json_request(Method::GET, "/api/v1/papers/missing/export", None))
        .await
        .expect("export");
    assert_eq!(export.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a local Postgres test database"]
async fn ocr_preview_then_confirm() {
    let reader = FakeReader::default()
        .with_sheet_json(
            r#"{"roll_number": "r2", "student_name": "Ben",
                "answers": [{"question_number": 1, "selected_options": ["A"]},
                            {"question_number": 2, "selected_options": ["B"]}]}"#,
        )
        .with_sheet_json(
            r#"{"roll_number": "R2",
                "answers": [{"question_number": 2, "selected_options": ["B", "C"]},
                            {"question_number": 3, "selected_option": "D"}]}"#,
        )
        .with_sheet_error(OcrError::Transport("connection reset".to_string()));
    let ctx = test_support::setup_test_context(reader).await;
    let app = ctx.app.clone();
    let paper_id = create_paper(&app).await;
    let page = png_bytes(32, 32);

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/v1/submissions/ocr",
            &[
                ("paper_id", None, paper_id.as_bytes()),
                ("images", Some("page1.png"), page.as_slice()),
                ("images", Some("page2.png"), page.as_slice()),
                ("images", Some("page3.png"), page.as_slice()),
            ],
        ))
        .await
        .expect("preview");
    assert_eq!(response.status(), StatusCode::OK);
    let preview = read_json(response).await;
    assert_eq!(preview["requires_confirmation"], true);
    assert_eq!(preview["images_processed"], 3);
    assert_eq!(preview["failed_images"][0]["filename"], "page3.png");
    let students = preview["students"].as_array().expect("students").clone();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["roll_number"], "R2");
    assert_eq!(students[0]["images_count"], 2);
    assert_eq!(students[0]["answers"][1]["selected_options"], json!(["B", "C"]));

    let mut drafts = students;
    drafts.push(json!({ "roll_number": null, "answers": [] }));
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/submissions/confirm",
            Some(json!({ "paper_id": paper_id, "students": drafts })),
        ))
        .await
        .expect("confirm");
    assert_eq!(response.status(), StatusCode::OK);
    let confirmed = read_json(response).await;
    assert_eq!(confirmed["saved"][0]["roll_number"], "R2");
    assert_eq!(confirmed["saved"][0]["total_marks"], 4.0);
    assert_eq!(confirmed["saved"][0]["grade"], "A+");
    assert_eq!(confirmed["skipped"][0]["reason"], "Missing roll number");
}

#[tokio::test]
#[ignore = "requires a local Postgres test database"]
async fn ocr_preview_with_exhausted_credentials_is_unavailable() {
    let reader = FakeReader::default().with_sheet_error(OcrError::CredentialsExhausted);
    let ctx = test_support::setup_test_context(reader).await;
    let paper_id = create_paper(&ctx.app).await;
    let page = png_bytes(32, 32);

    let response = ctx
        .app
        .clone()
        .oneshot(multipart_request(
            "/api/v1/submissions/ocr",
            &[
                ("paper_id", None, paper_id.as_bytes()),
                ("images", Some("page1.png"), page.as_slice()),
            ],
        ))
        .await
        .expect("preview");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
#[ignore = "requires a local Postgres test database"]
async fn confirm_reports_each_draft_when_some_cannot_be_stored() {
    let ctx = test_support::setup_test_context(FakeReader::default()).await;
    let app = ctx.app.clone();
    let paper_id = create_paper(&app).await;

    // A row-level constraint the drafts know nothing about.
    sqlx::query(
        "ALTER TABLE student_submissions \
         ADD CONSTRAINT no_withdrawn_rolls CHECK (roll_number <> 'R3')",
    )
    .execute(ctx.state.db())
    .await
    .expect("add constraint");

    let answers = json!([{ "question_number": 1, "selected_options": ["A"] }]);
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/submissions/confirm",
            Some(json!({
                "paper_id": paper_id,
                "students": [
                    { "roll_number": "R1", "answers": answers },
                    { "roll_number": "R2", "section": "S".repeat(60), "answers": answers },
                    { "roll_number": "R3", "answers": answers },
                    { "roll_number": "R4", "student_name": "Dee", "answers": answers }
                ]
            })),
        ))
        .await
        .expect("confirm");
    assert_eq!(response.status(), StatusCode::OK);
    let confirmed = read_json(response).await;

    let saved: Vec<&str> = confirmed["saved"]
        .as_array()
        .expect("saved")
        .iter()
        .filter_map(|entry| entry["roll_number"].as_str())
        .collect();
    assert_eq!(saved, vec!["R1", "R4"]);
    assert_eq!(confirmed["skipped"][0]["roll_number"], "R2");
    assert_eq!(confirmed["skipped"][0]["reason"], "section must be at most 50 characters");
    assert_eq!(confirmed["skipped"][1]["roll_number"], "R3");
    assert!(confirmed["skipped"][1]["reason"]
        .as_str()
        .is_some_and(|reason| reason.contains("no_withdrawn_rolls")));

    let list = app
        .oneshot(json_request(Method::GET, "/api/v1/submissions", None))
        .await
        .expect("list");
    assert_eq!(read_json(list).await["total_count"], 2);
}

#[tokio::test]
#[ignore = "requires a local Postgres test database"]
async fn overlong_manual_section_is_a_client_error() {
    let ctx = test_support::setup_test_context(FakeReader::default()).await;
    let paper_id = create_paper(&ctx.app).await;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/submissions",
            Some(json!({
                "paper_id": paper_id,
                "roll_number": "R1",
                "section": "S".repeat(60),
                "answers": [{ "question_number": 1, "selected_options": ["A"] }]
            })),
        ))
        .await
        .expect("submission");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let count = crate::repositories::submissions::count_for_paper(ctx.state.db(), &paper_id)
        .await
        .expect("count");
    assert_eq!(count, 0);
}
