//! End-to-end checks of the HTTP surface against a scratch SQLite database.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use liveqa_server::{
    config::Config,
    db::Database,
    directory::StaticCourseDirectory,
    routes::{
        self,
        auth::{generate_token, Role},
    },
    session::{FixedCodes, SessionRegistry},
    state::AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    token: String,
    _dir: TempDir,
}

async fn create_test_app(codes: &[&str]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("liveqa.db");
    let db = Database::new(path.to_str().unwrap()).await.unwrap();
    db.run_migrations().await.unwrap();

    let config = Config::default();
    let registry = SessionRegistry::new(
        db.clone(),
        Arc::new(StaticCourseDirectory::default()),
        &config.qna,
    )
    .with_code_source(Arc::new(FixedCodes::new(codes.iter().copied())));
    let token = generate_token("lecturer-1", Role::Presenter, &config.auth).unwrap();

    let state = AppState::with_registry(db, config, registry);
    TestApp {
        router: routes::create_router(state),
        token,
        _dir: dir,
    }
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
    as_presenter: bool,
) -> (StatusCode, Value) {
    let token = as_presenter.then_some(app.token.as_str());
    send_with_token(app, method, uri, body, token).await
}

async fn send_with_token(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn open_session(app: &TestApp, title: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/sessions",
        Some(json!({ "title": title, "course_ref": "WEB101" })),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["session_id"].as_str().unwrap().to_string(),
        body["code"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(&[]).await;
    let (status, body) = send(&app, "GET", "/health", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["api_version"], "v1");
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let app = create_test_app(&["AB12XZ"]).await;

    let (session_id, code) = open_session(&app, "Intro to Flexbox").await;
    assert_eq!(code, "AB12XZ");

    // Join is case-insensitive
    let (status, body) = send(&app, "POST", "/api/v1/join", Some(json!({ "code": "ab12xz" })), false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], session_id.as_str());

    let messages_uri = format!("/api/v1/sessions/{}/messages", session_id);
    let (status, message) = send(
        &app,
        "POST",
        &messages_uri,
        Some(json!({ "text": "Why does flex-grow ignore max-width?", "is_anonymous": true })),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["author"]["mode"], "anonymous");
    let message_id = message["id"].as_str().unwrap().to_string();

    let (status, list) = send(&app, "GET", &messages_uri, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["session"]["status"], "active");
    assert_eq!(list["messages"].as_array().unwrap().len(), 1);
    assert_eq!(list["messages"][0]["likes"], 0);

    let like_uri = format!("{}/{}/like", messages_uri, message_id);
    send(&app, "POST", &like_uri, None, false).await;
    let (status, body) = send(&app, "POST", &like_uri, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 2);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/{}/highlight", messages_uri, message_id),
        None,
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_highlighted"], true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/end", session_id),
        None,
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ended_at"].is_string());

    let (status, body) = send(
        &app,
        "POST",
        &messages_uri,
        Some(json!({ "text": "Too late?", "is_anonymous": true })),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state");

    let (status, list) = send(&app, "GET", &messages_uri, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["session"]["status"], "ended");
    let messages = list["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["likes"], 2);
    assert_eq!(messages[0]["is_highlighted"], true);
}

#[tokio::test]
async fn test_validate_code_reports_unknown_without_error() {
    let app = create_test_app(&["QNA001"]).await;
    open_session(&app, "Grid layout").await;

    let (status, body) = send(&app, "GET", "/api/v1/validate-code?code=qna001", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["session"]["title"], "Grid layout");

    let (status, body) = send(&app, "GET", "/api/v1/validate-code?code=NOPE00", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body.get("session").map_or(true, Value::is_null));

    let (status, body) = send(&app, "POST", "/api/v1/join", Some(json!({ "code": "NOPE00" })), false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_presenter_routes_require_token() {
    let app = create_test_app(&["QNA002"]).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/sessions",
        Some(json!({ "title": "No auth", "course_ref": "WEB101" })),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (session_id, _) = open_session(&app, "Selectors").await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/end", session_id),
        None,
        false,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_payloads_use_error_envelope() {
    let app = create_test_app(&["QNA003"]).await;
    let (session_id, _) = open_session(&app, "Specificity").await;
    let messages_uri = format!("/api/v1/sessions/{}/messages", session_id);

    // Legacy field names are not accepted
    let (status, body) = send(&app, "POST", &messages_uri, Some(json!({ "content": "hi" })), false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = send(
        &app,
        "POST",
        &messages_uri,
        Some(json!({ "text": "   ", "is_anonymous": true })),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = send(&app, "GET", "/api/v1/sessions/not-a-uuid/messages", None, false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_session_listing_and_course_summaries() {
    let app = create_test_app(&["QNA004", "QNA005"]).await;
    let (first, _) = open_session(&app, "Box model").await;
    open_session(&app, "Cascade").await;
    send(&app, "POST", &format!("/api/v1/sessions/{}/end", first), None, true).await;

    let (status, body) = send(&app, "GET", "/api/v1/sessions?status=active", None, true).await;
    assert_eq!(status, StatusCode::OK);
    let sessions = body.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["title"], "Cascade");

    // An empty filter is the same as no filter
    let (status, body) = send(&app, "GET", "/api/v1/sessions?status=&course_ref=", None, true).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/api/v1/courses", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["course_ref"], "WEB101");
    assert_eq!(body[0]["active_sessions"], 1);
    assert_eq!(body[0]["total_sessions"], 2);
}

#[tokio::test]
async fn test_moderation_requires_the_owning_presenter() {
    let app = create_test_app(&["QNA006"]).await;
    let (session_id, _) = open_session(&app, "Flex wrapping").await;
    let messages_uri = format!("/api/v1/sessions/{}/messages", session_id);

    let (_, message) = send(
        &app,
        "POST",
        &messages_uri,
        Some(json!({ "text": "Does wrap-reverse flip the cross axis?", "is_anonymous": true })),
        false,
    )
    .await;
    let message_id = message["id"].as_str().unwrap().to_string();

    let auth = Config::default().auth;
    let other_presenter = generate_token("lecturer-2", Role::Presenter, &auth).unwrap();
    let participant = generate_token("lecturer-1", Role::Participant, &auth).unwrap();

    for action in ["highlight", "unhighlight", "answer"] {
        let uri = format!("{}/{}/{}", messages_uri, message_id, action);

        let (status, body) = send_with_token(&app, "POST", &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{action} without token");
        assert_eq!(body["kind"], "unauthorized");

        let (status, body) =
            send_with_token(&app, "POST", &uri, None, Some(&other_presenter)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{action} by another presenter");
        assert_eq!(body["kind"], "unauthorized");

        let (status, body) = send_with_token(&app, "POST", &uri, None, Some(&participant)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{action} with a participant token");
        assert_eq!(body["kind"], "unauthorized");
    }

    let (_, list) = send(&app, "GET", &messages_uri, None, false).await;
    assert_eq!(list["messages"][0]["is_highlighted"], false);
    assert_eq!(list["messages"][0]["is_answered"], false);

    // The owner can still moderate every way
    for action in ["highlight", "unhighlight", "answer"] {
        let uri = format!("{}/{}/{}", messages_uri, message_id, action);
        let (status, _) = send(&app, "POST", &uri, None, true).await;
        assert_eq!(status, StatusCode::OK, "{action} by the owner");
    }
    let (_, list) = send(&app, "GET", &messages_uri, None, false).await;
    assert_eq!(list["messages"][0]["is_highlighted"], false);
    assert_eq!(list["messages"][0]["is_answered"], true);
}
