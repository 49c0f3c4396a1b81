use actix_web::http::StatusCode;
use serde_json::Value;
use vending_engine::{db_types::Cents, SessionStatus};

use super::helpers::{get_request, post_request, reconciler};

fn no_storage(_: &mut super::mocks::MockVendingBackend) {}

#[actix_web::test]
async fn health_check() {
    let (status, body) = get_request("/health", reconciler(no_storage)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn create_session() {
    let api = reconciler(no_storage);
    let (status, body) =
        post_request("/api/create-session", r#"{"amount": 1.5, "machineId": "vm-1"}"#, api.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");
    let session_id = json["sessionId"].as_str().unwrap();
    assert!(session_id.starts_with("session_"));
    let expires_in = json["expiresIn"].as_i64().unwrap();
    assert!((299..=300).contains(&expires_in));
    let session = api.session(session_id).unwrap();
    assert_eq!(session.amount, Cents::from(150));
    assert_eq!(session.machine_id, "vm-1");
    assert_eq!(session.status, SessionStatus::Pending);
}

#[actix_web::test]
async fn create_session_needs_a_positive_amount() {
    let (status, body) = post_request("/api/create-session", r#"{"amount": 0}"#, reconciler(no_storage)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Could not read request body: Invalid amount: 0.00"}"#);
}

#[actix_web::test]
async fn pay_then_query_a_session() {
    let api = reconciler(no_storage);
    let session = api.create_session(Cents::from(200), Some("vm-1")).unwrap();
    let body = format!(r#"{{"sessionId": "{}", "paymentMethod": "card"}}"#, session.session_id);
    let (status, body) = post_request("/api/process-payment", &body, api.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["paid"], 2.0);
    assert_eq!(json["sessionId"], session.session_id.as_str());

    let (status, body) = get_request(&format!("/api/session-status/{}", session.session_id), api.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["sessionStatus"], "paid");
    assert_eq!(json["saleId"], Value::Null);
    assert_eq!(api.session(&session.session_id).unwrap().payment_method.unwrap().to_string(), "card");
}

#[actix_web::test]
async fn a_session_is_paid_only_once() {
    let api = reconciler(no_storage);
    let session = api.create_session(Cents::from(200), None).unwrap();
    let body = format!(r#"{{"sessionId": "{}"}}"#, session.session_id);
    let (status, _) = post_request("/api/process-payment", &body, api.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post_request("/api/process-payment", &body, api.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Invalid transition"));
}

#[actix_web::test]
async fn unknown_payment_methods_are_rejected() {
    let api = reconciler(no_storage);
    let session = api.create_session(Cents::from(200), None).unwrap();
    let body = format!(r#"{{"sessionId": "{}", "paymentMethod": "barter"}}"#, session.session_id);
    let (status, _) = post_request("/api/process-payment", &body, api.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(api.session(&session.session_id).unwrap().status, SessionStatus::Pending);
}

#[actix_web::test]
async fn cancel_a_session() {
    let api = reconciler(no_storage);
    let session = api.create_session(Cents::from(200), None).unwrap();
    let body = format!(r#"{{"sessionId": "{}", "reason": "changed my mind"}}"#, session.session_id);
    let (status, body) = post_request("/api/cancel-session", &body, api.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":true"#));
    let cancelled = api.session(&session.session_id).unwrap();
    assert_eq!(cancelled.status, SessionStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed my mind"));
}

#[actix_web::test]
async fn unknown_sessions_are_not_found() {
    let api = reconciler(no_storage);
    let (status, body) = get_request("/api/session-status/session_nope", api.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Session session_nope not found"}"#);
    let (status, _) = post_request("/api/cancel-session", r#"{"sessionId": "session_nope"}"#, api).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
