//! #  Database management and control.
//!
//! This module provides the interfaces that define the contracts of the vending engine database *backends*. The
//! engine is agnostic about the storage technology; [`SqliteDatabase`](crate::SqliteDatabase) is the one backend
//! shipped in this crate.
//!
//! ## Traits
//!
//! * [`VendingDatabase`] is the union of the storage capabilities the reconciliation flow needs.
//! * [`InventoryManagement`] stores products and performs the conditional stock writes.
//! * [`SalesManagement`] stores the sales journal.
//! * [`ReportManagement`] stores the fault and audit trail.
mod inventory_management;
mod report_management;
mod sales_management;
mod vending_database;

pub use inventory_management::{InventoryApiError, InventoryManagement};
pub use report_management::{ReportApiError, ReportManagement};
pub use sales_management::{SalesApiError, SalesManagement};
pub use vending_database::VendingDatabase;
