use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, Product, ReportType, Sale},
    vm_api::IdleProduct,
};

/// The topic that confirmations are published on.
pub const CONFIRMATION_TOPIC: &str = "vending/confirmation";

/// The `action` value that tells the machine to release the product.
pub const DISPENSE_ACTION: &str = "dispense_product";

const TOPIC_PREFIX: &str = "vending/";

//--------------------------------------     EventCategory     ---------------------------------------------------------
/// The kinds of inbound machine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Orders,
    Payments,
    Dispense,
    Inventory,
    Reports,
    Status,
}

impl FromStr for EventCategory {
    type Err = String;

    /// Accepts the bare category name or the full topic, e.g. `orders` or `vending/orders`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let name = s.strip_prefix(TOPIC_PREFIX).unwrap_or(s);
        match name {
            "orders" => Ok(Self::Orders),
            "payments" => Ok(Self::Payments),
            "dispense" => Ok(Self::Dispense),
            "inventory" => Ok(Self::Inventory),
            "reports" => Ok(Self::Reports),
            "status" => Ok(Self::Status),
            _ => Err(format!("Unknown event category: {s}")),
        }
    }
}

impl Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventCategory::Orders => "orders",
            EventCategory::Payments => "payments",
            EventCategory::Dispense => "dispense",
            EventCategory::Inventory => "inventory",
            EventCategory::Reports => "reports",
            EventCategory::Status => "status",
        };
        write!(f, "{name}")
    }
}

//--------------------------------------  ConfirmationStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Success,
    Error,
    Info,
    Warning,
}

impl Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationStatus::Success => write!(f, "success"),
            ConfirmationStatus::Error => write!(f, "error"),
            ConfirmationStatus::Info => write!(f, "info"),
            ConfirmationStatus::Warning => write!(f, "warning"),
        }
    }
}

//--------------------------------------      Confirmation     ---------------------------------------------------------
/// The message sent back to the machine after every event it sent us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub status: ConfirmationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// The id of the product that was asked for, when a substitute was dispensed instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substituted_for: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub report_type: Option<ReportType>,
    /// Set when the event was a repeat of one that had already been handled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<IdleProduct>>,
}

impl Confirmation {
    pub fn new<S: Into<String>>(status: ConfirmationStatus, message: S) -> Self {
        Self {
            status,
            message: message.into(),
            action: None,
            product_id: None,
            product_name: None,
            position: None,
            price: None,
            remaining_stock: None,
            sale_id: None,
            paid: None,
            change: None,
            transaction_id: None,
            substituted_for: None,
            report_id: None,
            report_type: None,
            duplicate: None,
            current_stock: None,
            positions: None,
            products: None,
        }
    }

    pub fn success<S: Into<String>>(message: S) -> Self {
        Self::new(ConfirmationStatus::Success, message)
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::new(ConfirmationStatus::Error, message)
    }

    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::new(ConfirmationStatus::Info, message)
    }

    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::new(ConfirmationStatus::Warning, message)
    }

    /// Fills in the product fields. `remainingStock` reflects the product's stock at the time of the call.
    pub fn with_product(mut self, product: &Product) -> Self {
        self.product_id = Some(product.id);
        self.product_name = Some(product.name.clone());
        self.position = Some(product.position.clone());
        self.price = Some(product.price);
        self.remaining_stock = Some(product.stock);
        self
    }

    pub fn with_sale(mut self, sale: &Sale) -> Self {
        self.sale_id = Some(sale.id);
        self.paid = Some(sale.amount);
        self.change = Some(sale.change_given);
        self
    }

    pub fn with_transaction_id<S: Into<String>>(mut self, id: S) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn with_paid(mut self, amount: Cents) -> Self {
        self.paid = Some(amount);
        self
    }

    pub fn dispense(mut self) -> Self {
        self.action = Some(DISPENSE_ACTION.to_string());
        self
    }

    pub fn substituted_for(mut self, product_id: i64) -> Self {
        self.substituted_for = Some(product_id);
        self
    }

    pub fn duplicate(mut self) -> Self {
        self.duplicate = Some(true);
        self
    }

    pub fn is_dispense(&self) -> bool {
        self.action.as_deref() == Some(DISPENSE_ACTION)
    }
}

//--------------------------------------   ConfirmationEvent   ---------------------------------------------------------
/// A confirmation on its way out to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEvent {
    pub topic: String,
    pub confirmation: Confirmation,
}

impl ConfirmationEvent {
    pub fn new(confirmation: Confirmation) -> Self {
        Self { topic: CONFIRMATION_TOPIC.to_string(), confirmation }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn categories_accept_topic_prefix() {
        assert_eq!("orders".parse::<EventCategory>().unwrap(), EventCategory::Orders);
        assert_eq!("vending/payments".parse::<EventCategory>().unwrap(), EventCategory::Payments);
        assert_eq!(" vending/status ".parse::<EventCategory>().unwrap(), EventCategory::Status);
        assert!("vending/refunds".parse::<EventCategory>().is_err());
        assert!("other/orders".parse::<EventCategory>().is_err());
    }

    #[test]
    fn confirmation_omits_empty_fields() {
        let c = Confirmation::error("processing error");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "message": "processing error"}));
        let c = Confirmation::success("ok").dispense().duplicate().with_transaction_id("session_1");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["action"], "dispense_product");
        assert_eq!(json["duplicate"], true);
        assert_eq!(json["transactionId"], "session_1");
        assert!(json.get("productId").is_none());
    }
}
