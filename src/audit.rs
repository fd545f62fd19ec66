//! Best-effort audit sink and retention.
//!
//! A failed audit write never fails the request that triggered it; the
//! failure is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::core_state::{CoreError, CoreState};
use crate::db;
use crate::models::AuditRecord;

/// How often expired audit records are pruned.
pub const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Append `record`, logging instead of propagating any failure.
pub fn record(core: &CoreState, record: AuditRecord) {
    let result = core
        .db()
        .and_then(|conn| db::insert_audit_record(&conn, &record).map_err(CoreError::from));
    if let Err(e) = result {
        tracing::warn!(
            action = %record.event.action(),
            tenant = %record.actor.tenant_key,
            error = %e,
            "Audit write failed"
        );
    }
}

/// Delete records older than the configured retention.
pub fn prune_expired(core: &CoreState) -> Result<usize, CoreError> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(core.config().audit_retention_days));
    let conn = core.db()?;
    let deleted = db::prune_audit_log(&conn, cutoff)?;
    Ok(deleted)
}

/// Background sweep. Runs once immediately, then every `RETENTION_SWEEP_INTERVAL`.
pub fn spawn_retention_task(core: Arc<CoreState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match prune_expired(&core) {
                Ok(0) => {}
                Ok(n) => tracing::info!(deleted = n, "Pruned expired audit records"),
                Err(e) => tracing::warn!(error = %e, "Audit retention sweep failed"),
            }
        }
    })
}
