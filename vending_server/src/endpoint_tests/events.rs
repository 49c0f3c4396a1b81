use actix_web::http::StatusCode;
use chrono::Utc;
use serde_json::Value;
use vending_engine::{
    db_types::{Cents, PaymentMethod, Product, Report, Sale},
    SessionStatus,
};

use super::{
    helpers::{cola, post_request, reconciler, report},
    mocks::MockVendingBackend,
};

fn vending_machine(backend: &mut MockVendingBackend) {
    backend.expect_fetch_product().returning(|id| Ok((id == 1).then(cola)));
    backend.expect_fetch_product_by_position().returning(|p| Ok((p == "A1").then(cola)));
    backend
        .expect_reserve_one()
        .returning(|_, sold_at| Ok(Some(Product { stock: 7, last_sold: Some(sold_at), ..cola() })));
    backend.expect_insert_sale().returning(|s| {
        let now = Utc::now();
        Ok(Sale {
            id: 42,
            product_id: s.product_id,
            amount: s.amount,
            payment_method: s.payment_method,
            machine_id: s.machine_id,
            status: s.status,
            change_given: s.change_given,
            created_at: now,
            updated_at: now,
        })
    });
    backend.expect_insert_report().returning(|r| {
        Ok(Report {
            product_id: r.product_id,
            machine_id: r.machine_id,
            reported_by: r.reported_by,
            ..report(9, r.report_type, &r.description)
        })
    });
}

#[actix_web::test]
async fn unknown_categories_are_accepted_and_dropped() {
    let (status, body) = post_request("/events/refunds", r#"{"amount": 1}"#, reconciler(vending_machine)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
}

#[actix_web::test]
async fn status_events_get_no_confirmation() {
    let (status, body) = post_request("/events/status", r#"{"online": true}"#, reconciler(vending_machine)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
}

#[actix_web::test]
async fn malformed_events_are_confirmed_with_an_error() {
    let (status, body) = post_request("/events/orders", "{productId: 1", reconciler(vending_machine)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"error","message":"processing error"}"#);
}

#[actix_web::test]
async fn orders_without_payment_are_refused() {
    let (status, body) =
        post_request("/events/orders", r#"{"position": "A1", "machineId": "vm-1"}"#, reconciler(vending_machine)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "No payment found for machine vm-1. Please pay first.");
    assert!(json.get("action").is_none());
}

#[actix_web::test]
async fn web_payment_then_selection_dispenses() {
    let api = reconciler(vending_machine);
    let session = api.create_session(Cents::from(200), Some("vm-1")).unwrap();
    api.pay_session(&session.session_id, Some(PaymentMethod::Web)).await.unwrap();

    let (status, body) =
        post_request("/events/orders", r#"{"productId": 1, "machineId": "vm-1"}"#, api.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["action"], "dispense_product");
    assert_eq!(json["saleId"], 42);
    assert_eq!(json["productName"], "Cola");
    assert_eq!(json["change"], 0.5);
    assert_eq!(json["remainingStock"], 7);
    assert_eq!(json["transactionId"], session.session_id.as_str());
    let settled = api.session(&session.session_id).unwrap();
    assert_eq!(settled.status, SessionStatus::Completed);
    assert_eq!(settled.sale_id, Some(42));
}

#[actix_web::test]
async fn device_reports_are_filed() {
    let body = r#"{"type": "machine_error", "description": "Coin jam", "machineId": "vm-1", "reportedBy": "tech-7"}"#;
    let (status, body) = post_request("/events/reports", body, reconciler(vending_machine)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["reportId"], 9);
    assert_eq!(json["type"], "machine_error");
}
