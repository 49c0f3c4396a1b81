//! Routes inbound machine events to the component that handles them and publishes the answer.
//!
//! The router itself keeps no state. Machines deliver at least once, so handlers must cope with repeats; the
//! reconciler's idempotency rules take care of that for orders and payments.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde::de::DeserializeOwned;

use crate::{
    db_types::{NewReport, ProductRef, Report, ReportType, DEFAULT_MACHINE_ID},
    events::{Confirmation, ConfirmationEvent, EventCategory, EventProducers},
    traits::VendingDatabase,
    vm_api::{
        errors::ReconcileError,
        reconciler::Reconciler,
        reconciler_objects::{DeviceReport, DispenseResult, InventoryUpdate, OrderRequest, PaymentEvent},
        report_sink::ReportSink,
        settlement,
    },
};

/// The confirmation message sent back for payloads that cannot be parsed.
pub const PROCESSING_ERROR: &str = "processing error";

/// The target used to log confirmations when nobody has subscribed to them.
const CONFIRMATION_LOG_TARGET: &str = "vms::confirmations";

/// What the router did with one event.
#[derive(Debug, Clone, Default)]
pub struct RouterOutcome {
    pub category: Option<EventCategory>,
    /// The confirmation that was published. `None` for dropped events and status messages.
    pub confirmation: Option<Confirmation>,
    /// The reports that were filed while handling the event.
    pub reports: Vec<Report>,
}

impl RouterOutcome {
    fn dropped() -> Self {
        Self::default()
    }
}

pub struct EventRouter<B> {
    reconciler: Reconciler<B>,
    report_sink: ReportSink<B>,
    producers: EventProducers,
}

impl<B: Clone> Clone for EventRouter<B> {
    fn clone(&self) -> Self {
        Self {
            reconciler: self.reconciler.clone(),
            report_sink: self.report_sink.clone(),
            producers: self.producers.clone(),
        }
    }
}

impl<B> Debug for EventRouter<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventRouter")
    }
}

impl<B> EventRouter<B>
where B: VendingDatabase
{
    pub fn new(reconciler: Reconciler<B>, producers: EventProducers) -> Self {
        let report_sink = ReportSink::new(reconciler.db().clone());
        Self { reconciler, report_sink, producers }
    }

    pub fn reconciler(&self) -> &Reconciler<B> {
        &self.reconciler
    }

    pub fn report_sink(&self) -> &ReportSink<B> {
        &self.report_sink
    }

    /// Handles one raw event. `topic` is the category name, with or without the `vending/` prefix.
    pub async fn route(&self, topic: &str, payload: &[u8]) -> RouterOutcome {
        let category = match topic.parse::<EventCategory>() {
            Ok(c) => c,
            Err(e) => {
                warn!("📨️ {e}. Dropping the event.");
                return RouterOutcome::dropped();
            },
        };
        trace!("📨️ {category} event received: {}", String::from_utf8_lossy(payload));
        let (confirmation, reports) = match category {
            EventCategory::Orders => match parse::<OrderRequest>(category, payload) {
                Ok(order) => {
                    let outcome = self.reconciler.handle_order(order).await;
                    (Some(outcome.confirmation), outcome.reports)
                },
                Err(c) => (Some(c), Vec::new()),
            },
            EventCategory::Payments => match parse::<PaymentEvent>(category, payload) {
                Ok(payment) => {
                    let outcome = self.reconciler.handle_payment(payment).await;
                    (Some(outcome.confirmation), outcome.reports)
                },
                Err(c) => (Some(c), Vec::new()),
            },
            EventCategory::Dispense => match parse::<DispenseResult>(category, payload) {
                Ok(result) => {
                    let outcome = self.reconciler.handle_dispense_result(result).await;
                    (Some(outcome.confirmation), outcome.reports)
                },
                Err(c) => (Some(c), Vec::new()),
            },
            EventCategory::Inventory => match parse::<InventoryUpdate>(category, payload) {
                Ok(update) => (Some(self.handle_inventory(update).await), Vec::new()),
                Err(c) => (Some(c), Vec::new()),
            },
            EventCategory::Reports => match parse::<DeviceReport>(category, payload) {
                Ok(report) => {
                    let (confirmation, stored) = self.handle_device_report(report).await;
                    return self.finish(category, Some(confirmation), stored).await;
                },
                Err(c) => (Some(c), Vec::new()),
            },
            EventCategory::Status => {
                info!("📨️ Machine status: {}", String::from_utf8_lossy(payload));
                (None, Vec::new())
            },
        };
        let stored = self.report_sink.record_all(reports).await;
        self.finish(category, confirmation, stored).await
    }

    async fn finish(
        &self,
        category: EventCategory,
        confirmation: Option<Confirmation>,
        reports: Vec<Report>,
    ) -> RouterOutcome {
        if let Some(c) = &confirmation {
            self.publish(c.clone()).await;
        }
        RouterOutcome { category: Some(category), confirmation, reports }
    }

    /// Sends a confirmation to every subscriber. Without subscribers the confirmation is logged instead.
    pub async fn publish(&self, confirmation: Confirmation) {
        if !self.producers.has_confirmation_subscribers() {
            match serde_json::to_string(&confirmation) {
                Ok(json) => info!(target: CONFIRMATION_LOG_TARGET, "{json}"),
                Err(e) => error!(target: CONFIRMATION_LOG_TARGET, "Could not serialize confirmation. {e}"),
            }
            return;
        }
        for producer in &self.producers.confirmation_producer {
            producer.publish_event(ConfirmationEvent::new(confirmation.clone())).await;
        }
    }

    async fn handle_inventory(&self, update: InventoryUpdate) -> Confirmation {
        let ledger = self.reconciler.ledger();
        let has_stock_fields = update.stock.is_some() || update.low_stock.is_some();
        let result = match update {
            InventoryUpdate { product_id: Some(id), .. } if has_stock_fields => {
                ledger.apply_stock_report(id, update.stock, update.low_stock).await.map(|p| {
                    let mut c = Confirmation::success(format!("Stock of {} updated", p.name)).with_product(&p);
                    c.current_stock = Some(p.stock);
                    c
                })
            },
            InventoryUpdate { low_stock_alert: Some(true), positions: Some(positions), .. } => {
                ledger.flag_low_stock(&positions).await.map(|flagged| {
                    let mut c = Confirmation::success(format!("Low stock alert recorded for {} products", flagged.len()));
                    c.positions = Some(positions);
                    c
                })
            },
            InventoryUpdate { no_sales_alert: Some(true), product_ids: Some(ids), .. } => {
                ledger.idle_products(&ids, Utc::now()).await.map(|idle| {
                    let mut c = Confirmation::success(format!("No sales alert recorded for {} products", idle.len()));
                    c.products = Some(idle);
                    c
                })
            },
            _ => {
                warn!("📨️ Unrecognised inventory message");
                return Confirmation::error(ReconcileError::InvalidRequest("unrecognised inventory message".into()).to_string());
            },
        };
        match result {
            Ok(c) => c,
            Err(e) => {
                warn!("📨️ Inventory update failed. {e}");
                settlement::error_confirmation(&e.into())
            },
        }
    }

    /// Files a fault report raised by the machine. The product is resolved by id or slot when given. An unknown
    /// product is logged and the report is filed without it.
    async fn handle_device_report(&self, report: DeviceReport) -> (Confirmation, Vec<Report>) {
        let report_type = match report.report_type.parse::<ReportType>() {
            Ok(t) => t,
            Err(e) => {
                warn!("📨️ Rejecting device report. {e}");
                return (Confirmation::error(ReconcileError::InvalidRequest(e.to_string()).to_string()), Vec::new());
            },
        };
        let machine_id = report.machine_id.as_deref().unwrap_or(DEFAULT_MACHINE_ID);
        let mut new_report = NewReport::new(report_type, report.description.unwrap_or_default(), machine_id);
        if let Some(reporter) = report.reported_by {
            new_report = new_report.reported_by(reporter);
        }
        if let Some(product_ref) = ProductRef::from_parts(report.product_id, report.position) {
            match self.reconciler.ledger().find_by_id_or_position(&product_ref).await {
                Ok(p) => new_report = new_report.for_product(p.id),
                Err(e) => warn!("📨️ Device report names product {product_ref}, which could not be found. {e}"),
            }
        }
        match self.report_sink.record(new_report).await {
            Some(stored) => {
                let mut c = Confirmation::success("Fault report recorded");
                c.report_id = Some(stored.id);
                c.report_type = Some(stored.report_type);
                c.product_id = stored.product_id;
                (c, vec![stored])
            },
            None => (Confirmation::error("The fault report could not be stored"), Vec::new()),
        }
    }
}

fn parse<T: DeserializeOwned>(category: EventCategory, payload: &[u8]) -> Result<T, Confirmation> {
    serde_json::from_slice::<T>(payload).map_err(|e| {
        warn!("📨️ Malformed {category} payload. {e}");
        Confirmation::error(PROCESSING_ERROR)
    })
}
