use actix_web::http::StatusCode;
use serde_json::Value;
use vending_engine::db_types::ReportType;

use super::{
    helpers::{cola, get_request, reconciler, report},
    mocks::MockVendingBackend,
};

fn catalogue(backend: &mut MockVendingBackend) {
    backend.expect_fetch_product().returning(|id| Ok((id == 1).then(cola)));
    backend.expect_fetch_product_by_position().returning(|p| Ok((p == "A1").then(cola)));
    backend.expect_fetch_products().returning(|| Ok(vec![cola()]));
}

#[actix_web::test]
async fn product_info_by_id_or_slot() {
    for query in ["1", "A1"] {
        let (status, body) = get_request(&format!("/api/product-info?product={query}"), reconciler(catalogue)).await;
        assert_eq!(status, StatusCode::OK, "{query}");
        assert_eq!(body, r#"{"id":1,"name":"Cola","price":1.5,"position":"A1","stock":8}"#);
    }
}

#[actix_web::test]
async fn product_info_for_unknown_product() {
    let (status, body) = get_request("/api/product-info?product=B7", reconciler(catalogue)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Product slot B7 not found"}"#);
    let (status, _) = get_request("/api/product-info", reconciler(catalogue)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn list_products() {
    let (status, body) = get_request("/products", reconciler(catalogue)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    let products = json.as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Cola");
    assert_eq!(products[0]["minimumStock"], 2);
}

#[actix_web::test]
async fn sales_use_the_default_limit() {
    fn journal(backend: &mut MockVendingBackend) {
        backend.expect_fetch_sales().withf(|limit| *limit == 100).returning(|_| Ok(vec![]));
    }
    let (status, body) = get_request("/sales", reconciler(journal)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn reports_honour_the_limit() {
    fn journal(backend: &mut MockVendingBackend) {
        backend
            .expect_fetch_reports()
            .withf(|limit| *limit == 5)
            .returning(|_| Ok(vec![report(3, ReportType::OutOfStock, "Fanta in slot A2 could not be sold")]));
    }
    let (status, body) = get_request("/reports?limit=5", reconciler(journal)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json[0]["id"], 3);
    assert_eq!(json[0]["type"], "out_of_stock");
    assert_eq!(json[0]["reportedBy"], "system");
}
