use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
pub use vm_common::Cents;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------    ProductStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// The product is available for sale and its stock is above the minimum threshold.
    Active,
    /// The product is available for sale, but stock is at or below the minimum threshold.
    LowStock,
    /// The product has been taken out of rotation by an operator. It is never sold or offered as a substitute.
    Inactive,
}

impl ProductStatus {
    /// Derives the status for the given stock level. Inactive products stay inactive regardless of stock.
    pub fn for_stock(current: ProductStatus, stock: i64, minimum_stock: i64) -> Self {
        match current {
            ProductStatus::Inactive => ProductStatus::Inactive,
            _ if stock <= minimum_stock => ProductStatus::LowStock,
            _ => ProductStatus::Active,
        }
    }
}

impl Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductStatus::Active => write!(f, "active"),
            ProductStatus::LowStock => write!(f, "low_stock"),
            ProductStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for ProductStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "low_stock" => Ok(Self::LowStock),
            "inactive" => Ok(Self::Inactive),
            s => Err(ConversionError(format!("Invalid product status: {s}"))),
        }
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Cents,
    pub stock: i64,
    /// The slot label on the machine, e.g. "A1"
    pub position: String,
    pub minimum_stock: i64,
    pub status: ProductStatus,
    pub last_sold: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// A product can be sold if it is in stock and has not been deactivated.
    pub fn is_sellable(&self) -> bool {
        self.in_stock() && self.status != ProductStatus::Inactive
    }
}

//--------------------------------------       NewProduct      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: Cents,
    pub stock: i64,
    pub position: String,
    pub minimum_stock: i64,
    pub active: bool,
}

pub const DEFAULT_MINIMUM_STOCK: i64 = 5;

impl NewProduct {
    pub fn new<S: Into<String>, P: Into<String>>(name: S, price: Cents, stock: i64, position: P) -> Self {
        Self {
            name: name.into(),
            price,
            stock,
            position: position.into(),
            minimum_stock: DEFAULT_MINIMUM_STOCK,
            active: true,
        }
    }

    pub fn with_minimum_stock(mut self, minimum_stock: i64) -> Self {
        self.minimum_stock = minimum_stock;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn initial_status(&self) -> ProductStatus {
        let current = if self.active { ProductStatus::Active } else { ProductStatus::Inactive };
        ProductStatus::for_stock(current, self.stock, self.minimum_stock)
    }
}

//--------------------------------------       ProductRef      ---------------------------------------------------------
/// The two ways a machine can identify a product: by its database id, or by the slot it sits in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    Id(i64),
    Position(String),
}

impl ProductRef {
    /// Builds a reference from the optional fields of an inbound payload. The id wins when both are present.
    pub fn from_parts(product_id: Option<i64>, position: Option<String>) -> Option<Self> {
        match (product_id, position) {
            (Some(id), _) => Some(Self::Id(id)),
            (None, Some(p)) if !p.trim().is_empty() => Some(Self::Position(p.trim().to_string())),
            _ => None,
        }
    }
}

impl Display for ProductRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductRef::Id(id) => write!(f, "#{id}"),
            ProductRef::Position(p) => write!(f, "slot {p}"),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Mobile,
    Web,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Mobile => write!(f, "mobile"),
            PaymentMethod::Web => write!(f, "web"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "mobile" => Ok(Self::Mobile),
            "web" => Ok(Self::Web),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------      SaleStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    /// Stock was reserved and the payment settled.
    Completed,
    /// The sale was rolled back before the product was dispensed.
    Cancelled,
    /// The machine reported that the product could not be dispensed. Stock has been restored.
    Error,
}

impl Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaleStatus::Pending => write!(f, "pending"),
            SaleStatus::Completed => write!(f, "completed"),
            SaleStatus::Cancelled => write!(f, "cancelled"),
            SaleStatus::Error => write!(f, "error"),
        }
    }
}

//--------------------------------------         Sale          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: i64,
    pub product_id: i64,
    /// The amount the customer paid
    pub amount: Cents,
    pub payment_method: PaymentMethod,
    pub machine_id: String,
    pub status: SaleStatus,
    pub change_given: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        NewSale        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub product_id: i64,
    pub amount: Cents,
    pub payment_method: PaymentMethod,
    pub machine_id: String,
    pub status: SaleStatus,
    pub change_given: Cents,
}

impl NewSale {
    /// A completed sale of `product` paid with `amount`. The change is the difference between the two.
    pub fn completed(product: &Product, amount: Cents, payment_method: PaymentMethod, machine_id: &str) -> Self {
        Self {
            product_id: product.id,
            amount,
            payment_method,
            machine_id: machine_id.to_string(),
            status: SaleStatus::Completed,
            change_given: amount - product.price,
        }
    }
}

//--------------------------------------      ReportType       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    OutOfStock,
    PaymentError,
    MachineError,
    ProductStuck,
    Other,
}

impl Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportType::OutOfStock => write!(f, "out_of_stock"),
            ReportType::PaymentError => write!(f, "payment_error"),
            ReportType::MachineError => write!(f, "machine_error"),
            ReportType::ProductStuck => write!(f, "product_stuck"),
            ReportType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for ReportType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "out_of_stock" => Ok(Self::OutOfStock),
            "payment_error" => Ok(Self::PaymentError),
            "machine_error" => Ok(Self::MachineError),
            "product_stuck" => Ok(Self::ProductStuck),
            "other" => Ok(Self::Other),
            s => Err(ConversionError(format!("Invalid report type: {s}"))),
        }
    }
}

//--------------------------------------     ReportStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
}

//--------------------------------------        Report         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub description: String,
    pub product_id: Option<i64>,
    pub machine_id: String,
    pub status: ReportStatus,
    pub reported_by: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       NewReport       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub report_type: ReportType,
    pub description: String,
    pub product_id: Option<i64>,
    pub machine_id: String,
    pub reported_by: String,
}

/// The `reported_by` value used for entries that the engine files on its own behalf.
pub const SYSTEM_REPORTER: &str = "system";

/// The machine id assumed when an inbound event does not name one.
pub const DEFAULT_MACHINE_ID: &str = "unknown";

impl NewReport {
    pub fn new<S: Into<String>>(report_type: ReportType, description: S, machine_id: &str) -> Self {
        Self {
            report_type,
            description: description.into(),
            product_id: None,
            machine_id: machine_id.to_string(),
            reported_by: SYSTEM_REPORTER.to_string(),
        }
    }

    pub fn for_product(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn reported_by<S: Into<String>>(mut self, reporter: S) -> Self {
        self.reported_by = reporter.into();
        self
    }
}
