use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        Cents,
        NewReport,
        NewSale,
        PaymentMethod,
        Product,
        ProductRef,
        ReportType,
        Sale,
        SaleStatus,
        DEFAULT_MACHINE_ID,
    },
    events::Confirmation,
    helpers::KeyedLock,
    sessions::{PaymentSession, SessionError, SessionStatus, SessionStore},
    traits::VendingDatabase,
    vm_api::{
        errors::{LedgerError, ReconcileError},
        inventory_ledger::InventoryLedger,
        reconciler_objects::{
            DispenseResult,
            ExpiryOutcome,
            OrderRequest,
            PaymentEvent,
            PaymentRequest,
            ReconcileOutcome,
        },
        settlement::{self, ProductDecision},
    },
};

/// The reason recorded on paid sessions that timed out before a product was chosen.
pub const STRANDED_REASON: &str = "session expired after payment, before a product was selected";

const DEFAULT_SALES_LIMIT: i64 = 100;

type Settled = (Confirmation, Option<Sale>);

/// `Reconciler` matches payments to product selections and turns each match into exactly one sale.
///
/// Every public handler returns a [`ReconcileOutcome`] rather than an error. The outcome carries the confirmation
/// for the machine and any reports that should be filed; the caller decides how to deliver them.
pub struct Reconciler<B> {
    db: B,
    ledger: InventoryLedger<B>,
    sessions: SessionStore,
    requests: KeyedLock<String>,
}

impl<B: Clone> Clone for Reconciler<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            ledger: self.ledger.clone(),
            sessions: self.sessions.clone(),
            requests: self.requests.clone(),
        }
    }
}

impl<B> Debug for Reconciler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reconciler ({:?})", self.sessions)
    }
}

impl<B: Clone> Reconciler<B> {
    pub fn new(db: B, sessions: SessionStore) -> Self {
        let ledger = InventoryLedger::new(db.clone());
        Self { db, ledger, sessions, requests: KeyedLock::new() }
    }
}

impl<B> Reconciler<B> {
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn ledger(&self) -> &InventoryLedger<B> {
        &self.ledger
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> Reconciler<B>
where B: VendingDatabase
{
    //------------------------------------------   Session operations   -------------------------------------------------

    /// Opens a web payment session.
    pub fn create_session(&self, amount: Cents, machine_id: Option<&str>) -> Result<PaymentSession, ReconcileError> {
        let session = self.sessions.create(amount, machine_id.unwrap_or(DEFAULT_MACHINE_ID))?;
        Ok(session)
    }

    pub fn session(&self, session_id: &str) -> Result<PaymentSession, ReconcileError> {
        Ok(self.sessions.get(session_id)?)
    }

    /// Records the payment for a pending session.
    pub async fn pay_session(
        &self,
        session_id: &str,
        method: Option<PaymentMethod>,
    ) -> Result<PaymentSession, ReconcileError> {
        let _guard = self.sessions.lock(session_id).await;
        let session = self.sessions.mark_paid_with(session_id, method.unwrap_or(PaymentMethod::Web))?;
        info!("🔄️💳️ Session {session_id} paid: {} via {}", session.amount, method.unwrap_or(PaymentMethod::Web));
        Ok(session)
    }

    /// Cancels a session that has not been settled yet.
    pub async fn cancel_session(&self, session_id: &str, reason: &str) -> Result<PaymentSession, ReconcileError> {
        let _guard = self.sessions.lock(session_id).await;
        let session = self.sessions.cancel(session_id, reason)?;
        info!("🔄️💳️ Session {session_id} cancelled: {reason}");
        Ok(session)
    }

    /// The most recent sales, newest first.
    pub async fn sales(&self, limit: Option<i64>) -> Result<Vec<Sale>, ReconcileError> {
        Ok(self.db.fetch_sales(limit.unwrap_or(DEFAULT_SALES_LIMIT)).await?)
    }

    //------------------------------------------        Orders          -------------------------------------------------

    /// Settles a product selection against the most recent usable payment for the machine.
    pub async fn handle_order(&self, order: OrderRequest) -> ReconcileOutcome {
        trace!("🔄️📦️ Handling order {order:?}");
        let mut reports = Vec::new();
        let result = self.try_order(&order, &mut reports).await;
        conclude("order", result, reports)
    }

    async fn try_order(&self, order: &OrderRequest, reports: &mut Vec<NewReport>) -> Result<Settled, ReconcileError> {
        // Repeats of the same request are serialised, so the second one always sees the first one's settlement.
        let _request_guard = match &order.request_id {
            Some(id) => Some(self.requests.lock(id).await),
            None => None,
        };
        if let Some(request_id) = order.request_id.as_deref() {
            if let Some(replayed) = self.replay_request(request_id).await? {
                return Ok(replayed);
            }
        }
        let product_ref = order
            .product_ref()
            .ok_or_else(|| ReconcileError::InvalidRequest("an order must name a productId or a position".into()))?;
        let requested = self.ledger.find_by_id_or_position(&product_ref).await?;
        let machine_id = order.machine_id();
        let candidates = self.sessions.usable_for_machine(machine_id, Utc::now());
        trace!("🔄️📦️ {} usable payments for machine {machine_id}", candidates.len());
        for candidate in candidates {
            let _guard = self.sessions.lock(&candidate.session_id).await;
            // Someone may have used or cancelled the session while we waited for it.
            let session = match self.sessions.get(&candidate.session_id) {
                Ok(s) if s.is_usable_at(Utc::now()) => s,
                _ => {
                    debug!("🔄️📦️ Session {} is no longer usable. Trying the next one.", candidate.session_id);
                    continue;
                },
            };
            let (confirmation, sale) = self.settle(&session, requested, order.request_id.as_deref(), reports).await?;
            return Ok((confirmation, Some(sale)));
        }
        Err(ReconcileError::NoPaymentFound(machine_id.to_string()))
    }

    async fn replay_request(&self, request_id: &str) -> Result<Option<Settled>, ReconcileError> {
        match self.sessions.find_settled_by(request_id) {
            Some(session) => {
                info!("🔄️📦️ Request {request_id} was already settled by session {}", session.session_id);
                self.replay(&session).await.map(Some)
            },
            None => Ok(None),
        }
    }

    /// Rebuilds the answer for a session that has already been settled. Nothing is mutated.
    async fn replay(&self, session: &PaymentSession) -> Result<Settled, ReconcileError> {
        let sale_id = session.sale_id.ok_or_else(|| {
            ReconcileError::InvalidTransition(format!("session {} has no sale to replay", session.session_id))
        })?;
        let sale = self.db.fetch_sale(sale_id).await?.ok_or(ReconcileError::SaleNotFound(sale_id))?;
        let product = self
            .ledger
            .find(sale.product_id)
            .await?
            .ok_or_else(|| ReconcileError::ProductNotFound(format!("#{}", sale.product_id)))?;
        let confirmation = if sale.status == SaleStatus::Completed && session.status == SessionStatus::Completed {
            settlement::replay_confirmation(&product, &sale, session)
        } else {
            Confirmation::warning(format!("Sale #{} was already processed and is now {}", sale.id, sale.status))
                .with_sale(&sale)
                .with_transaction_id(session.session_id.clone())
                .duplicate()
        };
        Ok((confirmation, None))
    }

    /// Settles one usable session against the requested product. The caller must hold the session's critical
    /// section.
    ///
    /// If the requested product cannot be sold, an `out_of_stock` report is added to `reports` and the cheapest
    /// affordable alternative is sold instead. On any failure the session stays paid and usable.
    async fn settle(
        &self,
        session: &PaymentSession,
        requested: Product,
        request_id: Option<&str>,
        reports: &mut Vec<NewReport>,
    ) -> Result<(Confirmation, Sale), ReconcileError> {
        let reserved = match settlement::decide(session.amount, &requested)? {
            ProductDecision::Sell => match self.ledger.reserve_one(requested.id).await {
                Ok(p) => Some(p),
                // The last unit went to a concurrent order after we read the product.
                Err(LedgerError::OutOfStock(_)) => None,
                Err(e) => return Err(e.into()),
            },
            ProductDecision::FindSubstitute => None,
        };
        let (sold, substituted) = match reserved {
            Some(p) => (p, None),
            None => {
                info!("🔄️📦️ {} (#{}) is unavailable. Looking for an alternative.", requested.name, requested.id);
                reports.push(settlement::out_of_stock_report(&requested, &session.machine_id));
                let alternative = self.ledger.find_cheapest_alternative(session.amount, &[requested.id]).await?;
                let alternative = settlement::choose_substitute(&requested, alternative)?;
                let sold = self.ledger.reserve_one(alternative.id).await.map_err(|e| match e {
                    LedgerError::OutOfStock(_) => ReconcileError::NoAlternativeAvailable(requested.name.clone()),
                    e => e.into(),
                })?;
                info!("🔄️📦️ Substituting {} (#{}) for {}", sold.name, sold.id, requested.name);
                (sold, Some(requested))
            },
        };
        let sale = self.record_sale(&sold, session).await?;
        if let Err(e) = self.sessions.settle(&session.session_id, sale.id, request_id) {
            error!("🔄️📦️ Session {} could not be settled after sale #{} was written. {e}", session.session_id, sale.id);
            self.rollback_sale(&sale).await;
            return Err(e.into());
        }
        info!(
            "🔄️📦️ Sale #{} complete: {} for {} on machine {}. Change {}",
            sale.id, sold.name, sale.amount, sale.machine_id, sale.change_given
        );
        let confirmation = settlement::dispense_confirmation(&sold, &sale, &session.session_id, substituted.as_ref());
        Ok((confirmation, sale))
    }

    async fn record_sale(&self, product: &Product, session: &PaymentSession) -> Result<Sale, ReconcileError> {
        let method = session.payment_method.unwrap_or_default();
        let new_sale = NewSale::completed(product, session.amount, method, &session.machine_id);
        match self.db.insert_sale(new_sale).await {
            Ok(sale) => Ok(sale),
            Err(e) => {
                error!("🔄️📦️ Could not record the sale of {} (#{}). Restoring stock. {e}", product.name, product.id);
                self.restore_quietly(product.id).await;
                Err(e.into())
            },
        }
    }

    async fn rollback_sale(&self, sale: &Sale) {
        match self.db.update_sale_status(sale.id, SaleStatus::Completed, SaleStatus::Cancelled).await {
            Ok(Some(_)) => debug!("🔄️📦️ Sale #{} rolled back", sale.id),
            Ok(None) => warn!("🔄️📦️ Sale #{} was no longer completed when rolling it back", sale.id),
            Err(e) => error!("🔄️📦️ Could not roll back sale #{}. {e}", sale.id),
        }
        self.restore_quietly(sale.product_id).await;
    }

    async fn restore_quietly(&self, product_id: i64) {
        if let Err(e) = self.ledger.restore_one(product_id).await {
            error!("🔄️📦️ Could not restore stock for product #{product_id}. Stock needs a manual correction. {e}");
        }
    }

    //------------------------------------------        Payments        -------------------------------------------------

    /// Handles a payment reported by the machine: either money collected at the machine, or the machine's side of a
    /// web payment.
    pub async fn handle_payment(&self, event: PaymentEvent) -> ReconcileOutcome {
        trace!("🔄️💰️ Handling payment {event:?}");
        let transaction_id = event.transaction_id.clone();
        let mut reports = Vec::new();
        let result = match PaymentRequest::try_from(event) {
            Ok(PaymentRequest::Direct { amount, method, machine_id, product, payment_id }) => {
                let direct = DirectPayment { amount, method, machine_id, product };
                match payment_id {
                    Some(id) => self.identified_direct_payment(&id, direct, &mut reports).await,
                    None => self.direct_payment(direct, None, &mut reports).await,
                }
            },
            Ok(PaymentRequest::Web { session_id, product }) => self.web_payment(&session_id, product, &mut reports).await,
            Err(e) => Err(e),
        };
        let mut outcome = conclude("payment", result, reports);
        if let Some(id) = transaction_id {
            if outcome.confirmation.transaction_id.is_none() {
                outcome.confirmation.transaction_id = Some(id);
            }
        }
        outcome
    }

    /// A direct payment the machine tagged with its own id. Deliveries of the same id are serialised. A repeat is
    /// answered from the session the first delivery opened, and the money is never collected twice. If that session
    /// is still waiting for a selection and the repeat names a product, the selection is settled as usual.
    async fn identified_direct_payment(
        &self,
        payment_id: &str,
        direct: DirectPayment,
        reports: &mut Vec<NewReport>,
    ) -> Result<Settled, ReconcileError> {
        let _request_guard = self.requests.lock(&format!("payment/{payment_id}")).await;
        let Some(existing) = self.sessions.find_by_payment(payment_id) else {
            return self.direct_payment(direct, Some(payment_id), reports).await;
        };
        info!("🔄️💰️ Payment {payment_id} was already received in session {}", existing.session_id);
        let _guard = self.sessions.lock(&existing.session_id).await;
        let session = self.sessions.get(&existing.session_id)?;
        match (session.status, direct.product) {
            (SessionStatus::Completed, _) => self.replay(&session).await,
            (SessionStatus::Paid, Some(product_ref)) if session.is_usable_at(Utc::now()) => {
                let requested = self.ledger.find_by_id_or_position(&product_ref).await?;
                let (confirmation, sale) = self.settle(&session, requested, None, reports).await?;
                Ok((confirmation, Some(sale)))
            },
            (SessionStatus::Paid, None) => Ok((awaiting_selection(&session).duplicate(), None)),
            (status, _) => {
                let message = format!("Payment {payment_id} was already processed and is now {status}");
                let confirmation = Confirmation::warning(message)
                    .with_paid(session.amount)
                    .with_transaction_id(session.session_id.clone())
                    .duplicate();
                Ok((confirmation, None))
            },
        }
    }

    async fn direct_payment(
        &self,
        direct: DirectPayment,
        payment_id: Option<&str>,
        reports: &mut Vec<NewReport>,
    ) -> Result<Settled, ReconcileError> {
        let DirectPayment { amount, method, machine_id, product } = direct;
        let session = match payment_id {
            Some(id) => self.sessions.create_for_payment(amount, &machine_id, id)?,
            None => self.sessions.create(amount, &machine_id)?,
        };
        let _guard = self.sessions.lock(&session.session_id).await;
        let session = self.sessions.mark_paid_with(&session.session_id, method)?;
        info!("🔄️💰️ {amount} received in {method} on machine {machine_id}. Session {}", session.session_id);
        let Some(product_ref) = product else {
            return Ok((awaiting_selection(&session), None));
        };
        let result = match self.ledger.find_by_id_or_position(&product_ref).await {
            Ok(requested) => self.settle(&session, requested, None, reports).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok((confirmation, sale)) => Ok((confirmation, Some(sale))),
            // The money is in the machine. Keep the session usable and tell the machine which session holds it.
            Err(e) => {
                warn!("🔄️💰️ Direct payment {} kept for a later selection. {e}", session.session_id);
                let confirmation = settlement::error_confirmation(&e).with_transaction_id(session.session_id.clone());
                Ok((confirmation, None))
            },
        }
    }

    async fn web_payment(
        &self,
        session_id: &str,
        product: Option<ProductRef>,
        reports: &mut Vec<NewReport>,
    ) -> Result<Settled, ReconcileError> {
        let _guard = self.sessions.lock(session_id).await;
        let session = match self.sessions.get(session_id) {
            Ok(s) => s,
            Err(e) => {
                let description = format!("Payment received for unknown or expired transaction {session_id}");
                reports.push(NewReport::new(ReportType::PaymentError, description, DEFAULT_MACHINE_ID));
                return Err(e.into());
            },
        };
        if session.status == SessionStatus::Completed {
            return self.replay(&session).await;
        }
        let machine_id = session.machine_id.clone();
        let session = match session.status {
            SessionStatus::Pending => self.sessions.mark_paid(session_id),
            SessionStatus::Paid if session.is_expired_at(Utc::now()) => {
                Err(SessionError::SessionExpired(session_id.to_string()))
            },
            SessionStatus::Paid => Ok(session.clone()),
            SessionStatus::Expired => Err(SessionError::SessionExpired(session_id.to_string())),
            _ => Err(SessionError::InvalidTransition {
                session_id: session_id.to_string(),
                from: session.status,
                to: SessionStatus::Paid,
            }),
        };
        let session = match session {
            Ok(s) => s,
            Err(e @ SessionError::SessionExpired(_)) => {
                let description = format!("Payment received for expired transaction {session_id}");
                reports.push(NewReport::new(ReportType::PaymentError, description, &machine_id));
                return Err(e.into());
            },
            Err(e) => return Err(e.into()),
        };
        let Some(product_ref) = product else {
            return Ok((awaiting_selection(&session), None));
        };
        let requested = self.ledger.find_by_id_or_position(&product_ref).await?;
        let (confirmation, sale) = self.settle(&session, requested, None, reports).await?;
        Ok((confirmation, Some(sale)))
    }

    //------------------------------------------    Dispense results    -------------------------------------------------

    /// Handles the machine's report on whether the product came out. A failed dispense reverses the sale: the sale
    /// is marked as an error, the unit goes back into stock, the session is cancelled and a `machine_error` report is
    /// filed. A sale is never reversed twice.
    pub async fn handle_dispense_result(&self, result: DispenseResult) -> ReconcileOutcome {
        trace!("🔄️🎰️ Handling dispense result {result:?}");
        let mut reports = Vec::new();
        let outcome = self.try_dispense_result(result, &mut reports).await;
        conclude("dispense result", outcome, reports)
    }

    async fn try_dispense_result(
        &self,
        result: DispenseResult,
        reports: &mut Vec<NewReport>,
    ) -> Result<Settled, ReconcileError> {
        let session = match (result.transaction_id.as_deref(), result.sale_id) {
            (Some(id), None) => Some(self.sessions.get(id)?),
            (Some(id), Some(_)) => self.sessions.get(id).ok(),
            (None, _) => None,
        };
        let sale_id = result
            .sale_id
            .or_else(|| session.as_ref().and_then(|s| s.sale_id))
            .ok_or_else(|| ReconcileError::InvalidRequest("a dispense result needs a saleId or a settled transactionId".into()))?;
        let sale = self.db.fetch_sale(sale_id).await?.ok_or(ReconcileError::SaleNotFound(sale_id))?;
        if result.success {
            info!("🔄️🎰️ Sale #{sale_id} dispensed on machine {}", sale.machine_id);
            let confirmation = Confirmation::success(format!("Dispense of sale #{sale_id} confirmed")).with_sale(&sale);
            return Ok((confirmation, None));
        }
        let reason = result.error.unwrap_or_else(|| "the machine did not dispense the product".to_string());
        let session = session.or_else(|| self.sessions.find_by_sale(sale_id));
        let _guard = match &session {
            Some(s) => Some(self.sessions.lock(&s.session_id).await),
            None => None,
        };
        let Some(errored) = self.db.update_sale_status(sale_id, SaleStatus::Completed, SaleStatus::Error).await? else {
            let current = self.db.fetch_sale(sale_id).await?.unwrap_or(sale);
            info!("🔄️🎰️ Sale #{sale_id} is {} already. Not compensating again.", current.status);
            let confirmation = Confirmation::warning(format!("Sale #{sale_id} is already {}", current.status))
                .with_sale(&current)
                .duplicate();
            return Ok((confirmation, None));
        };
        let product = self.ledger.restore_one(errored.product_id).await?;
        match &session {
            Some(s) => {
                if let Err(e) = self.sessions.void_settlement(&s.session_id, &reason) {
                    warn!("🔄️🎰️ Could not cancel session {} after failed dispense. {e}", s.session_id);
                }
            },
            None => warn!("🔄️🎰️ No session is linked to sale #{sale_id} any more. Only the sale and stock were reverted."),
        }
        let failure = ReconcileError::DispenseFailure(reason);
        warn!("🔄️🎰️ Sale #{sale_id} reversed. {failure}");
        let description = format!("Sale #{sale_id} of {} in slot {}: {failure}", product.name, product.position);
        reports.push(NewReport::new(ReportType::MachineError, description, &errored.machine_id).for_product(product.id));
        let mut confirmation = Confirmation::warning(format!("{failure}. Sale #{sale_id} reversed and stock restored"))
            .with_product(&product)
            .with_sale(&errored);
        if let Some(s) = &session {
            confirmation = confirmation.with_transaction_id(s.session_id.clone());
        }
        Ok((confirmation, None))
    }

    //------------------------------------------        Expiry          -------------------------------------------------

    /// Runs the session sweep and cancels paid sessions that timed out before settling. Each of those gets a
    /// `payment_error` report so that the customer can be refunded.
    pub async fn expire_sessions(&self) -> ExpiryOutcome {
        let sweep = self.sessions.sweep();
        let mut outcome = ExpiryOutcome::default();
        for stranded in &sweep.stranded {
            let Some(_guard) = self.sessions.try_lock(&stranded.session_id) else {
                continue;
            };
            match self.sessions.get(&stranded.session_id) {
                Ok(s) if s.status == SessionStatus::Paid => match self.sessions.cancel(&s.session_id, STRANDED_REASON) {
                    Ok(cancelled) => {
                        warn!("🕰️ Session {} expired holding {}. Flagged for refund.", s.session_id, s.amount);
                        outcome.reports.push(settlement::stranded_payment_report(&cancelled, STRANDED_REASON));
                        outcome.cancelled.push(cancelled);
                    },
                    Err(e) => warn!("🕰️ Could not cancel stranded session {}. {e}", s.session_id),
                },
                _ => {},
            }
        }
        outcome.sweep = sweep;
        outcome
    }
}

struct DirectPayment {
    amount: Cents,
    method: PaymentMethod,
    machine_id: String,
    product: Option<ProductRef>,
}

fn awaiting_selection(session: &PaymentSession) -> Confirmation {
    Confirmation::info(format!("Payment of {} received. Please select a product.", session.amount))
        .with_paid(session.amount)
        .with_transaction_id(session.session_id.clone())
}

fn conclude(kind: &str, result: Result<Settled, ReconcileError>, reports: Vec<NewReport>) -> ReconcileOutcome {
    match result {
        Ok((confirmation, sale)) => {
            let outcome = ReconcileOutcome::new(confirmation).with_reports(reports);
            match sale {
                Some(s) => outcome.with_sale(s),
                None => outcome,
            }
        },
        Err(e) => {
            warn!("🔄️ Could not process {kind}. {e}");
            ReconcileOutcome::new(settlement::error_confirmation(&e)).with_reports(reports)
        },
    }
}
