use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, NewReport, PaymentMethod, ProductRef, Sale, DEFAULT_MACHINE_ID},
    events::Confirmation,
    sessions::{PaymentSession, SweepReport},
    vm_api::errors::ReconcileError,
};

/// The result of reconciling one event.
///
/// Nothing in here has been published or filed yet: the caller records the reports and sends the confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub confirmation: Confirmation,
    pub reports: Vec<NewReport>,
    /// The sale that this event settled, if any.
    pub sale: Option<Sale>,
}

impl ReconcileOutcome {
    pub fn new(confirmation: Confirmation) -> Self {
        Self { confirmation, reports: Vec::new(), sale: None }
    }

    pub fn with_reports(mut self, reports: Vec<NewReport>) -> Self {
        self.reports = reports;
        self
    }

    pub fn with_sale(mut self, sale: Sale) -> Self {
        self.sale = Some(sale);
        self
    }
}

/// The result of one expiry pass.
#[derive(Debug, Clone, Default)]
pub struct ExpiryOutcome {
    pub sweep: SweepReport,
    /// Stranded sessions that were cancelled on this pass.
    pub cancelled: Vec<PaymentSession>,
    /// One `payment_error` report per cancelled session.
    pub reports: Vec<NewReport>,
}

//--------------------------------------     OrderRequest      ---------------------------------------------------------
/// A product selection made on the machine's keypad.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub product_id: Option<i64>,
    pub position: Option<String>,
    pub machine_id: Option<String>,
    /// Set by machines that retry deliveries, so that a repeat can be recognised.
    pub request_id: Option<String>,
}

impl OrderRequest {
    pub fn for_product(product_id: i64) -> Self {
        Self { product_id: Some(product_id), ..Default::default() }
    }

    pub fn for_position<S: Into<String>>(position: S) -> Self {
        Self { position: Some(position.into()), ..Default::default() }
    }

    pub fn on_machine<S: Into<String>>(mut self, machine_id: S) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }

    pub fn with_request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn product_ref(&self) -> Option<ProductRef> {
        ProductRef::from_parts(self.product_id, self.position.clone())
    }

    pub fn machine_id(&self) -> &str {
        self.machine_id.as_deref().unwrap_or(DEFAULT_MACHINE_ID)
    }
}

//--------------------------------------     PaymentEvent      ---------------------------------------------------------
/// A payment notification as the machine sends it. Either a direct payment (`amount` given) or the machine side of
/// a web payment (`transactionId` given).
///
/// A direct payment may carry the machine's own `paymentId` (or `requestId`). Redeliveries with the same id are
/// recognised and never collect the money twice. A direct payment without an id cannot be told apart from a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub transaction_id: Option<String>,
    #[serde(alias = "requestId")]
    pub payment_id: Option<String>,
    pub amount: Option<Cents>,
    pub payment_method: Option<String>,
    pub machine_id: Option<String>,
    pub product_id: Option<i64>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequest {
    /// Cash or card collected at the machine.
    Direct {
        amount: Cents,
        method: PaymentMethod,
        machine_id: String,
        product: Option<ProductRef>,
        payment_id: Option<String>,
    },
    /// A session that was opened (and possibly paid) through the web flow.
    Web { session_id: String, product: Option<ProductRef> },
}

impl TryFrom<PaymentEvent> for PaymentRequest {
    type Error = ReconcileError;

    fn try_from(event: PaymentEvent) -> Result<Self, Self::Error> {
        let product = ProductRef::from_parts(event.product_id, event.position);
        if let Some(session_id) = event.transaction_id.filter(|t| !t.trim().is_empty()) {
            return Ok(Self::Web { session_id, product });
        }
        let amount = event
            .amount
            .ok_or_else(|| ReconcileError::InvalidRequest("a payment needs a transactionId or an amount".into()))?;
        let method = match event.payment_method {
            Some(m) => m.parse::<PaymentMethod>().map_err(|e| ReconcileError::InvalidRequest(e.to_string()))?,
            None => PaymentMethod::Cash,
        };
        let machine_id = event.machine_id.unwrap_or_else(|| DEFAULT_MACHINE_ID.to_string());
        let payment_id = event.payment_id.filter(|id| !id.trim().is_empty());
        Ok(Self::Direct { amount, method, machine_id, product, payment_id })
    }
}

//--------------------------------------    DispenseResult     ---------------------------------------------------------
/// The machine's report on whether a product actually came out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispenseResult {
    pub sale_id: Option<i64>,
    pub transaction_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub machine_id: Option<String>,
}

impl DispenseResult {
    pub fn failed_sale<S: Into<String>>(sale_id: i64, error: S) -> Self {
        Self { sale_id: Some(sale_id), success: false, error: Some(error.into()), ..Default::default() }
    }

    pub fn dispensed_sale(sale_id: i64) -> Self {
        Self { sale_id: Some(sale_id), success: true, ..Default::default() }
    }
}

//--------------------------------------    InventoryUpdate    ---------------------------------------------------------
/// Stock information from the machine's sensors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdate {
    pub product_id: Option<i64>,
    pub stock: Option<i64>,
    pub low_stock: Option<bool>,
    pub low_stock_alert: Option<bool>,
    pub positions: Option<Vec<String>>,
    pub no_sales_alert: Option<bool>,
    pub product_ids: Option<Vec<i64>>,
}

//--------------------------------------     DeviceReport      ---------------------------------------------------------
/// A fault report raised by the machine or a technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReport {
    #[serde(rename = "type")]
    pub report_type: String,
    pub description: Option<String>,
    pub product_id: Option<i64>,
    pub position: Option<String>,
    pub machine_id: Option<String>,
    pub reported_by: Option<String>,
}
