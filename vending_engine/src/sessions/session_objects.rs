use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Cents, PaymentMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, but the money has not been collected yet.
    Pending,
    /// Money collected. The session can be settled against an order.
    Paid,
    /// Settled. A sale is linked to the session.
    Completed,
    Cancelled,
    /// The session timed out before payment.
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Expired)
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Paid => write!(f, "paid"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub session_id: String,
    pub amount: Cents,
    pub machine_id: String,
    pub status: SessionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    /// When the session reached a terminal state. Drives the post-completion retention period.
    pub closed_at: Option<DateTime<Utc>>,
    pub sale_id: Option<i64>,
    pub cancel_reason: Option<String>,
    /// The id of the order request that settled this session, if the request carried one.
    pub settled_by: Option<String>,
    /// The machine's id for the direct payment that opened this session.
    pub payment_id: Option<String>,
}

impl PaymentSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Paid, not yet linked to a sale, and still inside its time window.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Paid && self.sale_id.is_none() && !self.is_expired_at(now)
    }

    /// Whole seconds left before the session expires. Never negative.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// The timestamp used to pick the most recent payment for a machine.
    pub(crate) fn recency(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.paid_at.unwrap_or(self.created_at), self.created_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a session stays open after creation. The window is absolute and never extended.
    pub ttl: Duration,
    /// How long terminal sessions are kept around before being purged.
    pub retention: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl: Duration::minutes(5), retention: Duration::minutes(10) }
    }
}

impl SessionConfig {
    pub fn new(ttl: Duration, retention: Duration) -> Self {
        Self { ttl, retention }
    }
}

/// What one pass of [`SessionStore::sweep`](crate::sessions::SessionStore::sweep) did.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Pending sessions that timed out and were moved to `expired`.
    pub expired: Vec<String>,
    /// Paid sessions that timed out before settling. These hold customer money and need a refund.
    pub stranded: Vec<PaymentSession>,
    /// Terminal sessions dropped after the retention period.
    pub purged: usize,
    /// Candidates left alone because their critical section was busy.
    pub skipped: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.stranded.is_empty() && self.purged == 0 && self.skipped == 0
    }
}
