//! One-shot import of the legacy single-file JSON statistics blob (spec
//! section 6 / 9). The legacy format counted only a single byte total per
//! user, not directional bytes, so every imported byte lands in
//! `download_bytes` -- a documented best-effort policy, not a measurement.
//!
//! Runs at most once per source path: `legacy_import_log` records the
//! path so a restart with the legacy file still present does not
//! re-double-count it.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{ProxyError, Result};

#[derive(Debug, Deserialize)]
struct LegacyUserStats {
    #[serde(default)]
    total_bytes: u64,
    #[serde(default)]
    requests: u64,
}

type LegacyFile = HashMap<String, LegacyUserStats>;

/// Imports `path` into the store if it exists and has not already been
/// imported. Any parse or IO failure is logged and treated as "nothing to
/// import" -- never fatal (spec section 7: startup must not fail on a
/// malformed legacy file).
pub async fn import_if_present(pool: &SqlitePool, path: &str) -> Result<()> {
    if !Path::new(path).exists() {
        return Ok(());
    }

    if already_imported(pool, path).await? {
        info!(%path, "legacy stats file already imported, skipping");
        return Ok(());
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(%path, error = %e, "failed to read legacy stats file, skipping import");
            return Ok(());
        }
    };

    let parsed: LegacyFile = match serde_json::from_str(&contents) {
        Ok(v) => v,
        Err(e) => {
            warn!(%path, error = %e, "failed to parse legacy stats file, skipping import");
            return Ok(());
        }
    };

    let now = Utc::now().to_rfc3339();
    let mut migrated = 0i64;
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| ProxyError::Store(format!("failed to start legacy import transaction: {e}")))?;

    for (user, stats) in &parsed {
        sqlx::query(
            r#"INSERT INTO users (user, upload_bytes, download_bytes, connection_count, request_count, first_seen, last_access, disabled)
               VALUES (?1, 0, ?2, 0, ?3, ?4, ?4, 0)
               ON CONFLICT(user) DO UPDATE SET
                   download_bytes = download_bytes + excluded.download_bytes,
                   request_count = request_count + excluded.request_count"#,
        )
        .bind(user)
        .bind(stats.total_bytes as i64)
        .bind(stats.requests as i64)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to migrate legacy user {user}: {e}")))?;
        migrated += 1;
    }

    sqlx::query("INSERT INTO legacy_import_log (imported_at, source_path, records_migrated) VALUES (?1, ?2, ?3)")
        .bind(&now)
        .bind(path)
        .bind(migrated)
        .execute(&mut *tx)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to record legacy import: {e}")))?;

    tx.commit()
        .await
        .map_err(|e| ProxyError::Store(format!("failed to commit legacy import: {e}")))?;

    info!(%path, records_migrated = migrated, "imported legacy stats file");
    Ok(())
}

async fn already_imported(pool: &SqlitePool, path: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM legacy_import_log WHERE source_path = ?1 LIMIT 1")
        .bind(path)
        .fetch_optional(pool)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to check legacy import log: {e}")))?;
    Ok(row.is_some())
}
