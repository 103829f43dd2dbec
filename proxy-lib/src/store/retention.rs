//! Retention cleanup (spec section 4.5): deletes Minute Rows and Hour
//! Rows past their configured retention window. Cumulative counters on
//! User/Domain/Country rows are never pruned. Best-effort: failures are
//! logged and skipped, never propagated (spec section 7).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::{ProxyError, Result};

pub async fn delete_expired_minute_rows(pool: &SqlitePool, now: DateTime<Utc>, retention_days: i64) -> Result<u64> {
    let cutoff = (now - chrono::Duration::days(retention_days))
        .format("%Y-%m-%dT%H:%M:00")
        .to_string();
    let result = sqlx::query("DELETE FROM minute_stats WHERE minute < ?1")
        .bind(&cutoff)
        .execute(pool)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to delete expired minute rows: {e}")))?;
    Ok(result.rows_affected())
}

pub async fn delete_expired_hour_rows(pool: &SqlitePool, now: DateTime<Utc>, retention_days: i64) -> Result<u64> {
    let cutoff = (now - chrono::Duration::days(retention_days))
        .format("%Y-%m-%dT%H:00:00")
        .to_string();
    let result = sqlx::query("DELETE FROM hourly_stats WHERE hour < ?1")
        .bind(&cutoff)
        .execute(pool)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to delete expired hour rows: {e}")))?;
    Ok(result.rows_affected())
}

/// Runs one retention sweep. Never returns an error to the caller -- a
/// failed delete is logged and the cycle simply does less work, per the
/// "best-effort" cleanup contract.
pub async fn run_once(pool: &SqlitePool, minute_retention_days: i64, hour_retention_days: i64) {
    let now = Utc::now();
    match delete_expired_minute_rows(pool, now, minute_retention_days).await {
        Ok(n) if n > 0 => tracing::info!(rows_deleted = n, "retention cleanup pruned minute rows"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "retention cleanup of minute rows failed, skipping"),
    }
    match delete_expired_hour_rows(pool, now, hour_retention_days).await {
        Ok(n) if n > 0 => tracing::info!(rows_deleted = n, "retention cleanup pruned hour rows"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "retention cleanup of hour rows failed, skipping"),
    }
}
