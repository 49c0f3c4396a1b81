//! Ephemeral payment sessions.
//!
//! A session records money that has been collected (or is about to be collected) before the customer picks a
//! product. Sessions live in memory only and are lost on restart. The [`SessionStore`] owns them, enforces the
//! session state machine and provides the per-session critical section that the reconciler and the expiry sweep use
//! to stay out of each other's way.
mod errors;
mod session_objects;
mod session_store;

pub use errors::SessionError;
pub use session_objects::{PaymentSession, SessionConfig, SessionStatus, SweepReport};
pub use session_store::{SessionGuard, SessionStore};
