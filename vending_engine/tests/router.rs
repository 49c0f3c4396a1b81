use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use vending_engine::{
    db_types::{ProductStatus, ReportType},
    events::{
        ConfirmationEvent,
        ConfirmationStatus,
        EventCategory,
        EventHandlers,
        EventHooks,
        EventProducers,
        CONFIRMATION_TOPIC,
        DISPENSE_ACTION,
    },
    traits::SalesManagement,
    EventRouter,
    Reconciler,
    SqliteDatabase,
};

use crate::support::prepare_env::*;

mod support;

fn router(reconciler: &Reconciler<SqliteDatabase>) -> EventRouter<SqliteDatabase> {
    EventRouter::new(reconciler.clone(), EventProducers::default())
}

fn payload(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[tokio::test]
async fn unknown_categories_are_dropped() {
    let (reconciler, products) = setup(vec![product("Cola", 150, 5, "A1")]).await;
    let router = router(&reconciler);
    let outcome = router.route("vending/refunds", &payload(json!({"position": "A1"}))).await;
    assert!(outcome.category.is_none());
    assert!(outcome.confirmation.is_none());
    assert!(outcome.reports.is_empty());
    assert_eq!(stock_of(&reconciler, products[0].id).await, 5);
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn malformed_payloads_get_a_processing_error() {
    let (reconciler, _) = setup(vec![product("Cola", 150, 5, "A1")]).await;
    let router = router(&reconciler);
    for topic in ["orders", "vending/payments", "dispense", "inventory", "reports"] {
        let outcome = router.route(topic, b"{not json").await;
        let confirmation = outcome.confirmation.expect("a confirmation");
        assert_eq!(confirmation.status, ConfirmationStatus::Error, "{topic}");
        assert_eq!(confirmation.message, "processing error", "{topic}");
    }
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn status_messages_are_only_logged() {
    let (reconciler, _) = setup(vec![]).await;
    let router = router(&reconciler);
    let outcome = router.route("vending/status", &payload(json!({"online": true, "temperature": 4.5}))).await;
    assert_eq!(outcome.category, Some(EventCategory::Status));
    assert!(outcome.confirmation.is_none());
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn orders_are_settled_and_reports_filed() {
    let (reconciler, products) = setup(vec![product("Fanta", 150, 0, "A1"), product("Water", 100, 3, "A2")]).await;
    let router = router(&reconciler);
    paid_session(&reconciler, 150, MACHINE).await;
    let outcome = router.route("vending/orders", &payload(json!({"position": "A1", "machineId": MACHINE}))).await;
    let confirmation = outcome.confirmation.unwrap();
    assert_eq!(confirmation.status, ConfirmationStatus::Info);
    assert_eq!(confirmation.action.as_deref(), Some(DISPENSE_ACTION));
    assert_eq!(confirmation.product_id, Some(products[1].id));
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].report_type, ReportType::OutOfStock);
    let stored = router.report_sink().list(None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, outcome.reports[0].id);
    assert_eq!(stored[0].reported_by, "system");
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn payment_and_dispense_events_are_routed() {
    let (reconciler, products) = setup(vec![product("Cola", 150, 5, "A1")]).await;
    let router = router(&reconciler);
    let outcome = router
        .route("payments", &payload(json!({"amount": 2, "paymentMethod": "cash", "machineId": MACHINE, "position": "A1"})))
        .await;
    let confirmation = outcome.confirmation.unwrap();
    assert_eq!(confirmation.status, ConfirmationStatus::Success);
    let sale_id = confirmation.sale_id.unwrap();
    assert_eq!(reconciler.db().fetch_sale(sale_id).await.unwrap().unwrap().change_given.value(), 50);

    let outcome = router.route("dispense", &payload(json!({"saleId": sale_id, "success": false, "error": "stuck"}))).await;
    assert_eq!(outcome.confirmation.unwrap().status, ConfirmationStatus::Warning);
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].report_type, ReportType::MachineError);
    assert_eq!(stock_of(&reconciler, products[0].id).await, 5);
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn stock_updates_replace_the_stock_level() {
    let (reconciler, products) = setup(vec![product("Cola", 150, 5, "A1")]).await;
    let router = router(&reconciler);
    let id = products[0].id;
    let outcome = router.route("inventory", &payload(json!({"productId": id, "stock": 1}))).await;
    let confirmation = outcome.confirmation.unwrap();
    assert_eq!(confirmation.status, ConfirmationStatus::Success);
    assert_eq!(confirmation.current_stock, Some(1));
    let product = reconciler.ledger().find(id).await.unwrap().unwrap();
    assert_eq!(product.stock, 1);
    assert_eq!(product.status, ProductStatus::LowStock);

    let outcome = router.route("inventory", &payload(json!({"productId": id, "stock": -3}))).await;
    assert_eq!(outcome.confirmation.unwrap().status, ConfirmationStatus::Error);
    assert_eq!(stock_of(&reconciler, id).await, 1);
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn low_stock_alerts_flag_the_named_slots() {
    let (reconciler, products) = setup(vec![
        product("Cola", 150, 10, "A1"),
        product("Water", 100, 10, "A2"),
        product("Chips", 200, 10, "B1").inactive(),
    ])
    .await;
    let router = router(&reconciler);
    let outcome =
        router.route("inventory", &payload(json!({"lowStockAlert": true, "positions": ["A1", "B1", "Z9"]}))).await;
    let confirmation = outcome.confirmation.unwrap();
    assert_eq!(confirmation.status, ConfirmationStatus::Success);
    assert_eq!(confirmation.positions, Some(vec!["A1".to_string(), "B1".to_string(), "Z9".to_string()]));
    let ledger = reconciler.ledger();
    assert_eq!(ledger.find(products[0].id).await.unwrap().unwrap().status, ProductStatus::LowStock);
    assert_eq!(ledger.find(products[0].id).await.unwrap().unwrap().stock, 10);
    assert_eq!(ledger.find(products[1].id).await.unwrap().unwrap().status, ProductStatus::Active);
    assert_eq!(ledger.find(products[2].id).await.unwrap().unwrap().status, ProductStatus::Inactive);
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn no_sales_alerts_list_idle_products() {
    let (reconciler, products) = setup(vec![product("Cola", 150, 10, "A1"), product("Water", 100, 10, "A2")]).await;
    let router = router(&reconciler);
    paid_session(&reconciler, 150, MACHINE).await;
    router.route("orders", &payload(json!({"productId": products[0].id, "machineId": MACHINE}))).await;
    let ids = json!([products[0].id, products[1].id, 999]);
    let outcome = router.route("inventory", &payload(json!({"noSalesAlert": true, "productIds": ids}))).await;
    let idle = outcome.confirmation.unwrap().products.unwrap();
    assert_eq!(idle.len(), 2);
    assert_eq!(idle[0].id, products[0].id);
    assert_eq!(idle[0].days_since_last_sale, Some(0));
    assert_eq!(idle[1].days_since_last_sale, None);
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn unrecognised_inventory_messages_are_rejected() {
    let (reconciler, _) = setup(vec![]).await;
    let router = router(&reconciler);
    let outcome = router.route("inventory", &payload(json!({"lowStockAlert": true}))).await;
    let confirmation = outcome.confirmation.unwrap();
    assert_eq!(confirmation.status, ConfirmationStatus::Error);
    assert!(confirmation.message.starts_with("Invalid request"));
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn device_reports_are_filed() {
    let (reconciler, products) = setup(vec![product("Cola", 150, 10, "A1")]).await;
    let router = router(&reconciler);
    let report = json!({"type": "product_stuck", "description": "Cola stuck in coil", "position": "A1", "machineId": MACHINE, "reportedBy": "tech-7"});
    let outcome = router.route("vending/reports", &payload(report)).await;
    let confirmation = outcome.confirmation.unwrap();
    assert_eq!(confirmation.status, ConfirmationStatus::Success);
    assert_eq!(confirmation.report_type, Some(ReportType::ProductStuck));
    assert_eq!(confirmation.product_id, Some(products[0].id));
    assert_eq!(outcome.reports.len(), 1);
    let stored = &outcome.reports[0];
    assert_eq!(confirmation.report_id, Some(stored.id));
    assert_eq!(stored.reported_by, "tech-7");
    assert_eq!(stored.machine_id, MACHINE);

    // An unknown product does not stop the report from being filed.
    let outcome = router.route("reports", &payload(json!({"type": "other", "productId": 404}))).await;
    assert_eq!(outcome.confirmation.unwrap().status, ConfirmationStatus::Success);
    assert_eq!(outcome.reports[0].product_id, None);
    assert_eq!(outcome.reports[0].machine_id, "unknown");

    let outcome = router.route("reports", &payload(json!({"type": "vandalism"}))).await;
    assert_eq!(outcome.confirmation.unwrap().status, ConfirmationStatus::Error);
    assert!(outcome.reports.is_empty());
    assert_eq!(router.report_sink().list(None).await.unwrap().len(), 2);
    tear_down(reconciler.db().clone()).await;
}

#[tokio::test]
async fn confirmations_reach_subscribers() {
    let (reconciler, _) = setup(vec![product("Cola", 150, 10, "A1")]).await;
    let (tx, mut rx) = mpsc::unbounded_channel::<ConfirmationEvent>();
    let mut hooks = EventHooks::default();
    hooks.on_confirmation(move |ev| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ev);
        })
    });
    let handlers = EventHandlers::new(8, hooks);
    let router = EventRouter::new(reconciler.clone(), handlers.producers());
    handlers.start_handlers().await;

    paid_session(&reconciler, 150, MACHINE).await;
    let outcome = router.route("orders", &payload(json!({"position": "A1", "machineId": MACHINE}))).await;
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.expect("timed out").expect("channel closed");
    assert_eq!(event.topic, CONFIRMATION_TOPIC);
    assert_eq!(Some(event.confirmation), outcome.confirmation);

    router.route("vending/status", &payload(json!({"online": true}))).await;
    assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.is_err());
    tear_down(reconciler.db().clone()).await;
}
