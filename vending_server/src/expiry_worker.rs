use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;
use vending_engine::{Reconciler, ReportSink, SqliteDatabase};

/// Starts the session expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, pending sessions past their expiry are expired, stranded payments are cancelled and reported,
/// and old finished sessions are dropped.
pub fn start_expiry_worker(reconciler: Reconciler<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    let period = interval.to_std().unwrap_or(std::time::Duration::from_secs(60));
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        let sink = ReportSink::new(reconciler.db().clone());
        info!("🕰️ Session expiry worker started. Running every {}s", period.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running session expiry job");
            let outcome = reconciler.expire_sessions().await;
            let filed = sink.record_all(outcome.reports).await;
            let sweep = &outcome.sweep;
            if !sweep.is_empty() || !outcome.cancelled.is_empty() {
                info!(
                    "🕰️ {} sessions expired, {} stranded payments cancelled, {} refund reports filed, {} sessions purged",
                    sweep.expired.len(),
                    outcome.cancelled.len(),
                    filed.len(),
                    sweep.purged
                );
            }
            if sweep.skipped > 0 {
                debug!("🕰️ {} sessions were busy and will be checked on the next pass", sweep.skipped);
            }
            for session in &outcome.cancelled {
                debug!(
                    "🕰️ Cancelled stranded session {} holding {} on {}",
                    session.session_id, session.amount, session.machine_id
                );
            }
        }
    })
}
