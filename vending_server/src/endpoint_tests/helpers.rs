use actix_web::{
    http::StatusCode,
    test,
    test::TestRequest,
    web::{self, ServiceConfig},
    App,
};
use chrono::{TimeZone, Utc};
use log::debug;
use vending_engine::{
    db_types::{Cents, Product, ProductStatus, Report, ReportStatus, ReportType},
    events::EventProducers,
    EventRouter,
    Reconciler,
    SessionConfig,
    SessionStore,
};

use super::mocks::{mock_backend, MockVendingBackend};
use crate::server::configure_routes;

pub type MockReconciler = Reconciler<MockVendingBackend>;

pub fn reconciler(configure: fn(&mut MockVendingBackend)) -> MockReconciler {
    Reconciler::new(mock_backend(configure), SessionStore::new(SessionConfig::default()))
}

/// Registers every route against the given reconciler, the way the server does.
pub fn app_config(reconciler: MockReconciler) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let router = EventRouter::new(reconciler.clone(), EventProducers::default());
        cfg.app_data(web::Data::new(reconciler)).app_data(web::Data::new(router));
        configure_routes::<MockVendingBackend>(cfg);
    }
}

pub async fn get_request(path: &str, reconciler: MockReconciler) -> (StatusCode, String) {
    send(TestRequest::get().uri(path), reconciler).await
}

pub async fn post_request(path: &str, body: &str, reconciler: MockReconciler) -> (StatusCode, String) {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    send(req, reconciler).await
}

async fn send(req: TestRequest, reconciler: MockReconciler) -> (StatusCode, String) {
    let _ = env_logger::try_init();
    let app = App::new().configure(app_config(reconciler));
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub fn cola() -> Product {
    let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    Product {
        id: 1,
        name: "Cola".into(),
        price: Cents::from(150),
        stock: 8,
        position: "A1".into(),
        minimum_stock: 2,
        status: ProductStatus::Active,
        last_sold: None,
        created_at: timestamp,
        updated_at: timestamp,
    }
}

pub fn report(id: i64, report_type: ReportType, description: &str) -> Report {
    Report {
        id,
        report_type,
        description: description.into(),
        product_id: None,
        machine_id: "vm-1".into(),
        status: ReportStatus::Pending,
        reported_by: "system".into(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
    }
}
