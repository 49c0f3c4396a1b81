use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use vending_engine::{
    traits::{InventoryApiError, ReportApiError, SalesApiError},
    LedgerError,
    ReconcileError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("{0}")]
    Expired(String),
    #[error("The request could not be fulfilled. {0}")]
    Unprocessable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Expired(_) => StatusCode::GONE,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::InvalidRequest(_) | ReconcileError::InvalidAmount(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            ReconcileError::ProductNotFound(_) | ReconcileError::SessionNotFound(_) | ReconcileError::SaleNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            ReconcileError::InvalidTransition(_) => Self::Conflict(e.to_string()),
            ReconcileError::SessionExpired(_) => Self::Expired(e.to_string()),
            ReconcileError::Storage(_) => Self::BackendError(e.to_string()),
            ReconcileError::OutOfStock(_)
            | ReconcileError::InsufficientFunds { .. }
            | ReconcileError::NoPaymentFound(_)
            | ReconcileError::NoAlternativeAvailable(_)
            | ReconcileError::DispenseFailure(_) => Self::Unprocessable(e.to_string()),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        ReconcileError::from(e).into()
    }
}

impl From<InventoryApiError> for ServerError {
    fn from(e: InventoryApiError) -> Self {
        Self::BackendError(format!("Database error: {e}"))
    }
}

impl From<SalesApiError> for ServerError {
    fn from(e: SalesApiError) -> Self {
        Self::BackendError(format!("Database error: {e}"))
    }
}

impl From<ReportApiError> for ServerError {
    fn from(e: ReportApiError) -> Self {
        Self::BackendError(format!("Database error: {e}"))
    }
}
