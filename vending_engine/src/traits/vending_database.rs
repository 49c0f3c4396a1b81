use crate::traits::{InventoryManagement, ReportManagement, SalesManagement};

/// This trait defines the highest level of behaviour for backends supporting the vending engine.
///
/// A backend that can store products, sales and reports can back a [`Reconciler`](crate::Reconciler).
pub trait VendingDatabase: Clone + InventoryManagement + SalesManagement + ReportManagement {
    /// The URL of the database
    fn url(&self) -> &str;
}
