//! Settlement decisions.
//!
//! These functions decide what should happen to an order without touching storage. The [`Reconciler`] carries out
//! the decisions.
//!
//! [`Reconciler`]: crate::vm_api::reconciler::Reconciler
use crate::{
    db_types::{Cents, NewReport, Product, ReportType, Sale},
    events::Confirmation,
    sessions::PaymentSession,
    vm_api::errors::ReconcileError,
};

/// What to do with the product that was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductDecision {
    /// The product can be sold as requested.
    Sell,
    /// The product cannot be sold right now. Look for a substitute within the payment amount.
    FindSubstitute,
}

/// Checks the payment against the requested product.
///
/// Funds are checked against the requested price first. A customer who cannot afford the product they asked for is
/// told so, even if it also happens to be out of stock.
pub fn decide(payment: Cents, requested: &Product) -> Result<ProductDecision, ReconcileError> {
    if payment < requested.price {
        return Err(ReconcileError::InsufficientFunds {
            product: requested.name.clone(),
            paid: payment,
            price: requested.price,
        });
    }
    if requested.is_sellable() {
        Ok(ProductDecision::Sell)
    } else {
        Ok(ProductDecision::FindSubstitute)
    }
}

/// Accepts the substitute the ledger offered, or reports that there is none.
pub fn choose_substitute(requested: &Product, alternative: Option<Product>) -> Result<Product, ReconcileError> {
    alternative
        .filter(|alt| alt.id != requested.id)
        .ok_or_else(|| ReconcileError::NoAlternativeAvailable(requested.name.clone()))
}

/// The report filed each time an order hits an unavailable product.
pub fn out_of_stock_report(product: &Product, machine_id: &str) -> NewReport {
    let description = format!("{} in slot {} could not be sold: out of stock or inactive", product.name, product.position);
    NewReport::new(ReportType::OutOfStock, description, machine_id).for_product(product.id)
}

/// The report filed when money was taken but can no longer be matched to a product.
pub fn stranded_payment_report(session: &PaymentSession, reason: &str) -> NewReport {
    let description = format!("Session {} holding {} needs a refund: {reason}", session.session_id, session.amount);
    NewReport::new(ReportType::PaymentError, description, &session.machine_id)
}

/// The confirmation that tells the machine to dispense.
///
/// `product` is the product that was actually sold, `requested` the one that was asked for if a substitute was
/// dispensed instead.
pub fn dispense_confirmation(
    product: &Product,
    sale: &Sale,
    session_id: &str,
    requested: Option<&Product>,
) -> Confirmation {
    let base = match requested {
        Some(r) => Confirmation::info(format!(
            "{} is not available. Dispensing {} instead. Change: {}",
            r.name, product.name, sale.change_given
        ))
        .substituted_for(r.id),
        None => Confirmation::success(format!("Payment complete. Dispensing {}. Change: {}", product.name, sale.change_given)),
    };
    base.with_product(product).with_sale(sale).with_transaction_id(session_id).dispense()
}

/// Rebuilds the confirmation for a sale that was already settled, for repeat deliveries of the same event.
pub fn replay_confirmation(product: &Product, sale: &Sale, session: &PaymentSession) -> Confirmation {
    Confirmation::success(format!("Already processed. Sale #{} of {}", sale.id, product.name))
        .with_product(product)
        .with_sale(sale)
        .with_transaction_id(session.session_id.clone())
        .dispense()
        .duplicate()
}

/// Turns a failure into the error confirmation the machine sees.
pub fn error_confirmation(err: &ReconcileError) -> Confirmation {
    let c = Confirmation::error(err.to_string());
    match err {
        ReconcileError::InsufficientFunds { paid, price, .. } => {
            let mut c = c.with_paid(*paid);
            c.price = Some(*price);
            c
        },
        _ => c,
    }
}
