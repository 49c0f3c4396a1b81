//! Vending Engine
//!
//! The vending engine reconciles the two event streams a vending machine produces: payments (collected at the
//! machine or through the web flow) and product selections made on the keypad. Each matched pair becomes exactly
//! one sale, even when events arrive late, out of order or more than once.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@traits`] and the `db` backends). The traits define what the engine needs from a database.
//!    SQLite is the backend shipped with the crate. The data types stored in the database live in [`db_types`].
//! 2. Payment sessions ([`mod@sessions`]). Short-lived, in-memory records of money collected before a product is
//!    chosen.
//! 3. The engine API ([`mod@vm_api`]): the inventory ledger, the reconciler that settles sales, and the report
//!    sink.
//! 4. Events ([`mod@events`]). The router that dispatches inbound machine events, and a small pub-sub layer through
//!    which confirmations are sent back to the machine.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod sessions;
pub mod traits;
pub mod vm_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use events::{EventRouter, RouterOutcome};
pub use sessions::{PaymentSession, SessionConfig, SessionError, SessionStatus, SessionStore};
pub use vm_api::{
    errors::{LedgerError, ReconcileError},
    inventory_ledger::InventoryLedger,
    reconciler::Reconciler,
    reconciler_objects,
    report_sink::ReportSink,
};
