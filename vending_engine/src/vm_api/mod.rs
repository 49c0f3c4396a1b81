//! # Vending engine public API
//!
//! * [`inventory_ledger`] owns product stock. It is the only code that changes stock levels, product status or the
//!   last-sold time.
//! * [`reconciler`] matches payments to product selections and settles each match into a sale. It drives the
//!   session store and the ledger.
//! * [`report_sink`] files fault and audit reports.
//! * [`settlement`] holds the pure decision functions the reconciler is built on.
//!
//! Every API is created by handing it a database backend that implements the storage traits it needs:
//!
//! ```rust,ignore
//! use vending_engine::{Reconciler, SessionStore, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/vending.db", 25).await?;
//! let reconciler = Reconciler::new(db, SessionStore::default());
//! let outcome = reconciler.handle_order(OrderRequest::for_position("A1").on_machine("vm-1")).await;
//! ```
pub mod errors;
pub mod inventory_ledger;
pub mod reconciler;
pub mod reconciler_objects;
pub mod report_sink;
pub mod settlement;

pub use inventory_ledger::IdleProduct;
