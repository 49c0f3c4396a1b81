use thiserror::Error;

use crate::{db_types::Cents, sessions::SessionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid amount: {0}. Amounts must be greater than zero.")]
    InvalidAmount(Cents),
    #[error("Session {0} not found")]
    SessionNotFound(String),
    #[error("Session {0} has expired")]
    SessionExpired(String),
    #[error("Session {session_id} cannot move from {from} to {to}")]
    InvalidTransition { session_id: String, from: SessionStatus, to: SessionStatus },
}
