use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Cents, PaymentMethod},
    helpers::{new_session_id, KeyGuard, KeyedLock},
    sessions::{PaymentSession, SessionConfig, SessionError, SessionStatus, SweepReport},
};

pub type SessionGuard = KeyGuard<String>;

/// The in-memory home of all payment sessions.
///
/// Every state change happens under the map lock, so each individual operation is atomic. Longer sequences that
/// must not interleave with other work on the same session (settlement, the expiry sweep) are wrapped in the
/// per-session critical section from [`SessionStore::lock`]. The store never takes that lock itself.
///
/// The store is a cheap handle: clones share the same sessions.
#[derive(Clone)]
pub struct SessionStore {
    config: SessionConfig,
    sessions: Arc<Mutex<HashMap<String, PaymentSession>>>,
    locks: KeyedLock<String>,
}

impl Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionStore ({} sessions, ttl {}s)", self.len(), self.config.ttl.num_seconds())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, sessions: Arc::new(Mutex::new(HashMap::new())), locks: KeyedLock::new() }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, PaymentSession>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a new pending session for `amount` on the given machine.
    pub fn create(&self, amount: Cents, machine_id: &str) -> Result<PaymentSession, SessionError> {
        self.open(amount, machine_id, None)
    }

    /// Opens a pending session for a direct payment the machine identified with `payment_id`. Redeliveries of the
    /// same payment find this session again through [`SessionStore::find_by_payment`].
    pub fn create_for_payment(
        &self,
        amount: Cents,
        machine_id: &str,
        payment_id: &str,
    ) -> Result<PaymentSession, SessionError> {
        self.open(amount, machine_id, Some(payment_id.to_string()))
    }

    fn open(&self, amount: Cents, machine_id: &str, payment_id: Option<String>) -> Result<PaymentSession, SessionError> {
        if !amount.is_positive() {
            return Err(SessionError::InvalidAmount(amount));
        }
        let now = Utc::now();
        let session = PaymentSession {
            session_id: new_session_id(),
            amount,
            machine_id: machine_id.to_string(),
            status: SessionStatus::Pending,
            payment_method: None,
            created_at: now,
            expires_at: now + self.config.ttl,
            paid_at: None,
            closed_at: None,
            sale_id: None,
            cancel_reason: None,
            settled_by: None,
            payment_id,
        };
        self.sessions().insert(session.session_id.clone(), session.clone());
        debug!("💳️ Session {} opened for {} on machine {machine_id}", session.session_id, amount);
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Result<PaymentSession, SessionError> {
        self.sessions().get(session_id).cloned().ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    /// Marks a pending session as paid through the web flow.
    pub fn mark_paid(&self, session_id: &str) -> Result<PaymentSession, SessionError> {
        self.mark_paid_with(session_id, PaymentMethod::Web)
    }

    /// Marks a pending session as paid with the given method.
    ///
    /// A session found past its expiry time is expired on the spot and `SessionExpired` is returned.
    pub fn mark_paid_with(&self, session_id: &str, method: PaymentMethod) -> Result<PaymentSession, SessionError> {
        let now = Utc::now();
        let mut sessions = self.sessions();
        let session = sessions.get_mut(session_id).ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if session.status == SessionStatus::Pending && session.is_expired_at(now) {
            session.status = SessionStatus::Expired;
            session.closed_at = Some(now);
            info!("💳️ Session {session_id} expired before payment arrived");
            return Err(SessionError::SessionExpired(session_id.to_string()));
        }
        if session.status == SessionStatus::Expired {
            return Err(SessionError::SessionExpired(session_id.to_string()));
        }
        if session.status != SessionStatus::Pending {
            return Err(invalid(session, SessionStatus::Paid));
        }
        session.status = SessionStatus::Paid;
        session.payment_method = Some(method);
        session.paid_at = Some(now);
        debug!("💳️ Session {session_id} paid ({method})");
        Ok(session.clone())
    }

    /// Links a paid session to its sale and completes it. `request_id` is the id of the order request doing the
    /// settling, if it had one.
    pub fn settle(
        &self,
        session_id: &str,
        sale_id: i64,
        request_id: Option<&str>,
    ) -> Result<PaymentSession, SessionError> {
        let now = Utc::now();
        let mut sessions = self.sessions();
        let session = sessions.get_mut(session_id).ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if session.status != SessionStatus::Paid {
            return Err(invalid(session, SessionStatus::Completed));
        }
        if session.is_expired_at(now) {
            return Err(SessionError::SessionExpired(session_id.to_string()));
        }
        session.status = SessionStatus::Completed;
        session.sale_id = Some(sale_id);
        session.settled_by = request_id.map(String::from);
        session.closed_at = Some(now);
        debug!("💳️ Session {session_id} settled by sale #{sale_id}");
        Ok(session.clone())
    }

    /// Cancels a pending or paid session. Cancelling a session that is already cancelled is a no-op.
    pub fn cancel(&self, session_id: &str, reason: &str) -> Result<PaymentSession, SessionError> {
        let mut sessions = self.sessions();
        let session = sessions.get_mut(session_id).ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        match session.status {
            SessionStatus::Cancelled => Ok(session.clone()),
            SessionStatus::Pending | SessionStatus::Paid => {
                session.status = SessionStatus::Cancelled;
                session.cancel_reason = Some(reason.to_string());
                session.closed_at = Some(Utc::now());
                debug!("💳️ Session {session_id} cancelled: {reason}");
                Ok(session.clone())
            },
            _ => Err(invalid(session, SessionStatus::Cancelled)),
        }
    }

    /// Reverses a settlement after the machine failed to dispense. Only completed sessions can be voided.
    pub fn void_settlement(&self, session_id: &str, reason: &str) -> Result<PaymentSession, SessionError> {
        let mut sessions = self.sessions();
        let session = sessions.get_mut(session_id).ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if session.status != SessionStatus::Completed {
            return Err(invalid(session, SessionStatus::Cancelled));
        }
        session.status = SessionStatus::Cancelled;
        session.cancel_reason = Some(reason.to_string());
        session.closed_at = Some(Utc::now());
        info!("💳️ Settlement of session {session_id} voided: {reason}");
        Ok(session.clone())
    }

    /// All usable sessions for the machine, most recent payment first.
    pub fn usable_for_machine(&self, machine_id: &str, now: DateTime<Utc>) -> Vec<PaymentSession> {
        let mut usable = self
            .sessions()
            .values()
            .filter(|s| s.machine_id == machine_id && s.is_usable_at(now))
            .cloned()
            .collect::<Vec<_>>();
        usable.sort_by(|a, b| b.recency().cmp(&a.recency()));
        usable
    }

    pub fn latest_usable_for_machine(&self, machine_id: &str, now: DateTime<Utc>) -> Option<PaymentSession> {
        self.usable_for_machine(machine_id, now).into_iter().next()
    }

    pub fn find_by_sale(&self, sale_id: i64) -> Option<PaymentSession> {
        self.sessions().values().find(|s| s.sale_id == Some(sale_id)).cloned()
    }

    pub fn find_settled_by(&self, request_id: &str) -> Option<PaymentSession> {
        self.sessions().values().find(|s| s.settled_by.as_deref() == Some(request_id)).cloned()
    }

    pub fn find_by_payment(&self, payment_id: &str) -> Option<PaymentSession> {
        self.sessions().values().find(|s| s.payment_id.as_deref() == Some(payment_id)).cloned()
    }

    /// Enters the critical section for a session, waiting if another task is inside it.
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        self.locks.lock(&session_id.to_string()).await
    }

    /// Enters the critical section for a session only if it is free right now.
    pub fn try_lock(&self, session_id: &str) -> Option<SessionGuard> {
        self.locks.try_lock(&session_id.to_string())
    }

    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    /// Expires timed-out pending sessions, collects stranded paid sessions and purges terminal sessions past the
    /// retention period.
    ///
    /// Candidates are collected first and the map lock released. Each candidate is then re-checked inside its own
    /// critical section, which is taken with `try_lock` so that a session in the middle of settlement is skipped
    /// rather than waited on.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let retention_cutoff = now - self.config.retention;
        let candidates = self
            .sessions()
            .values()
            .filter(|s| is_sweepable(s, now, retention_cutoff))
            .map(|s| s.session_id.clone())
            .collect::<Vec<_>>();
        trace!("🕰️ {} sweep candidates", candidates.len());
        let mut report = SweepReport::default();
        for id in candidates {
            let Some(_guard) = self.try_lock(&id) else {
                trace!("🕰️ Session {id} is busy. Skipping it this round");
                report.skipped += 1;
                continue;
            };
            let mut sessions = self.sessions();
            let Some(session) = sessions.get_mut(&id) else {
                continue;
            };
            match session.status {
                SessionStatus::Pending if session.is_expired_at(now) => {
                    session.status = SessionStatus::Expired;
                    session.closed_at = Some(now);
                    report.expired.push(id);
                },
                SessionStatus::Paid if session.is_expired_at(now) => {
                    report.stranded.push(session.clone());
                },
                s if s.is_terminal() && session.closed_at.map(|t| t < retention_cutoff).unwrap_or(false) => {
                    sessions.remove(&id);
                    report.purged += 1;
                },
                _ => {},
            }
        }
        if !report.is_empty() {
            debug!(
                "🕰️ Sweep: {} expired, {} stranded, {} purged, {} skipped",
                report.expired.len(),
                report.stranded.len(),
                report.purged,
                report.skipped
            );
        }
        report
    }
}

fn is_sweepable(session: &PaymentSession, now: DateTime<Utc>, retention_cutoff: DateTime<Utc>) -> bool {
    match session.status {
        SessionStatus::Pending | SessionStatus::Paid => session.is_expired_at(now),
        _ => session.closed_at.map(|t| t < retention_cutoff).unwrap_or(false),
    }
}

fn invalid(session: &PaymentSession, to: SessionStatus) -> SessionError {
    SessionError::InvalidTransition { session_id: session.session_id.clone(), from: session.status, to }
}
