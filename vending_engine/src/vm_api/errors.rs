use thiserror::Error;

use crate::{
    db_types::Cents,
    sessions::SessionError,
    traits::{InventoryApiError, ReportApiError, SalesApiError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Product {0} not found")]
    ProductNotFound(String),
    #[error("Product #{0} is out of stock")]
    OutOfStock(i64),
    #[error("Invalid stock level {0}")]
    InvalidStock(i64),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<InventoryApiError> for LedgerError {
    fn from(e: InventoryApiError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Everything that can go wrong while reconciling an event. None of these are fatal: every variant is turned into
/// an error confirmation at the event boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Product {0} not found")]
    ProductNotFound(String),
    #[error("Session {0} not found")]
    SessionNotFound(String),
    #[error("Sale #{0} not found")]
    SaleNotFound(i64),
    #[error("{0} is out of stock")]
    OutOfStock(String),
    #[error("Insufficient funds. Paid {paid}, but {product} costs {price}")]
    InsufficientFunds { product: String, paid: Cents, price: Cents },
    #[error("No payment found for machine {0}. Please pay first.")]
    NoPaymentFound(String),
    #[error("{0} is not available and there is no alternative product within your budget")]
    NoAlternativeAvailable(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Dispense failure: {0}")]
    DispenseFailure(String),
    #[error("Session {0} has expired")]
    SessionExpired(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(Cents),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SessionError> for ReconcileError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::InvalidAmount(a) => Self::InvalidAmount(a),
            SessionError::SessionNotFound(id) => Self::SessionNotFound(id),
            SessionError::SessionExpired(id) => Self::SessionExpired(id),
            e @ SessionError::InvalidTransition { .. } => Self::InvalidTransition(e.to_string()),
        }
    }
}

impl From<LedgerError> for ReconcileError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ProductNotFound(p) => Self::ProductNotFound(p),
            LedgerError::OutOfStock(id) => Self::OutOfStock(format!("Product #{id}")),
            LedgerError::InvalidStock(s) => Self::InvalidRequest(format!("Invalid stock level {s}")),
            LedgerError::Storage(s) => Self::Storage(s),
        }
    }
}

impl From<InventoryApiError> for ReconcileError {
    fn from(e: InventoryApiError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<SalesApiError> for ReconcileError {
    fn from(e: SalesApiError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<ReportApiError> for ReconcileError {
    fn from(e: ReportApiError) -> Self {
        Self::Storage(e.to_string())
    }
}
