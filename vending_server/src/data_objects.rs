use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vending_engine::{
    db_types::{Cents, Product},
    PaymentSession,
    SessionStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub amount: Cents,
    pub machine_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub status: String,
    pub session_id: String,
    /// Seconds until the session expires.
    pub expires_in: i64,
}

impl CreateSessionResponse {
    pub fn new(session: &PaymentSession, now: DateTime<Utc>) -> Self {
        Self { status: "success".into(), session_id: session.session_id.clone(), expires_in: session.expires_in(now) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    pub session_id: String,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentResponse {
    pub status: String,
    pub message: String,
    pub paid: Cents,
    pub session_id: String,
}

impl From<PaymentSession> for ProcessPaymentResponse {
    fn from(session: PaymentSession) -> Self {
        Self {
            status: "success".into(),
            message: "Payment received. You can now choose your product.".into(),
            paid: session.amount,
            session_id: session.session_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSessionRequest {
    pub session_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub status: String,
    pub session_status: SessionStatus,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub sale_id: Option<i64>,
    pub cancel_reason: Option<String>,
}

impl From<PaymentSession> for SessionStatusResponse {
    fn from(session: PaymentSession) -> Self {
        Self {
            status: "success".into(),
            session_status: session.status,
            amount: session.amount,
            created_at: session.created_at,
            expires_at: session.expires_at,
            sale_id: session.sale_id,
            cancel_reason: session.cancel_reason,
        }
    }
}

/// `?product=` takes a product id or a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfoQuery {
    pub product: String,
}

/// The subset of a product shown on the payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub id: i64,
    pub name: String,
    pub price: Cents,
    pub position: String,
    pub stock: i64,
}

impl From<Product> for ProductInfo {
    fn from(p: Product) -> Self {
        Self { id: p.id, name: p.name, price: p.price, position: p.position, stock: p.stock }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}
