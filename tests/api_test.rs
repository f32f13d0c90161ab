use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde_json::{Value, json};
use tower::ServiceExt;
use tutoring::api::router;
use tutoring::clock::ManualClock;
use tutoring::config::AppConfig;
use tutoring::state::AppState;
use tutoring::store::MemoryStore;

fn app() -> Router {
    let now = NaiveDate::from_ymd_opt(2026, 10, 14)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        .and_utc();
    let config = AppConfig {
        admin_tutor_id: Some("Head Tutor".to_string()),
        roster: vec!["Head Tutor".to_string(), "Ada".to_string(), "Sam".to_string()],
        roster_passcode: Some("letmein".to_string()),
        school_time_zone: Tz::UTC,
        ..AppConfig::default()
    };
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(now)),
        config,
    );
    router(state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
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

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn sign_in(app: &Router, tutor_id: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "tutor_id": tutor_id, "password": "letmein" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn publish_monday(app: &Router, token: &str) {
    let (status, body) = send(
        app,
        "PUT",
        "/me",
        Some(token),
        Some(json!({
            "subjects": ["Algebra 1 EOC"],
            "availability": { "Monday-7:00-7:45 AM": true, "Tuesday-7:00-7:45 AM": false },
            "bio": "Loves proofs",
            "grade_level": "11th"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["slots"].as_array().unwrap().len(), 1);
}

fn booking(student: &str) -> Value {
    json!({
        "tutor_id": "Ada",
        "slot_id": "Monday-7:00-7:45 AM",
        "student_name": student,
        "subject": "Algebra 1 EOC"
    })
}

#[tokio::test]
async fn test_catalog_lists_subjects_and_week() {
    let app = app();
    let (status, body) = send(&app, "GET", "/catalog", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["subjects"].as_array().unwrap().contains(&json!("Algebra 1 EOC")));
    assert_eq!(body["week_schedule"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_search_and_book_flow() {
    let app = app();
    let token = sign_in(&app, "Ada").await;
    publish_monday(&app, &token).await;

    let (status, body) = send(&app, "GET", "/tutors/search?subject=Algebra%201%20EOC", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["tutor"]["id"], "Ada");
    assert_eq!(body[0]["slots"][0]["id"], "Monday-7:00-7:45 AM");

    let (status, body) = send(&app, "POST", "/bookings", None, Some(booking("Alice"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["student_name"], "Alice");
    assert_eq!(body["expiry_date"], "2026-10-19T07:00:00Z");

    let (status, body) = send(&app, "POST", "/bookings", None, Some(booking("Bob"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "409 Conflict");

    let (status, body) = send(&app, "GET", "/me/bookings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["student_name"], "Alice");
}

#[tokio::test]
async fn test_booking_errors_map_to_status_codes() {
    let app = app();
    let token = sign_in(&app, "Ada").await;
    publish_monday(&app, &token).await;

    let mut unknown_tutor = booking("Alice");
    unknown_tutor["tutor_id"] = json!("Nobody");
    let (status, _) = send(&app, "POST", "/bookings", None, Some(unknown_tutor)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut wrong_subject = booking("Alice");
    wrong_subject["subject"] = json!("APUSH");
    let (status, _) = send(&app, "POST", "/bookings", None, Some(wrong_subject)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/bookings", None, Some(booking("   "))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = app();
    let (status, _) = send(&app, "GET", "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "tutor_id": "Ada", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_regular_tutors() {
    let app = app();
    let tutor = sign_in(&app, "Sam").await;
    let admin = sign_in(&app, "Head Tutor").await;

    let (status, _) = send(&app, "GET", "/admin/bookings", Some(&tutor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/admin/bookings", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        "POST",
        "/admin/tutors",
        Some(&admin),
        Some(json!({ "name": "Grace", "password": "hopper" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "Grace");

    let (status, _) = send(
        &app,
        "POST",
        "/admin/tutors",
        Some(&admin),
        Some(json!({ "name": "Grace", "password": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "tutor_id": "Grace", "password": "hopper" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = app();
    let token = sign_in(&app, "Sam").await;

    let (status, body) = send(&app, "GET", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "Sam");

    let (status, _) = send(&app, "POST", "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_history_lists_bookings_for_admin() {
    let app = app();
    let token = sign_in(&app, "Ada").await;
    publish_monday(&app, &token).await;
    send(&app, "POST", "/bookings", None, Some(booking("Alice"))).await;

    let admin = sign_in(&app, "Head Tutor").await;
    let (status, body) = send(&app, "GET", "/admin/bookings/history?limit=5", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["tutor_id"], "Ada");
    assert_eq!(records[0]["time"], "7:00-7:45 AM");
}
