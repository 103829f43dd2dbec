//! Write side: transactional upsert-accumulate of aggregated stats
//! batches, plus the user enable/disable toggle and the standalone
//! request counter.
//!
//! Per spec section 4.5: every record always upserts the User Row; the
//! Domain/Minute/Hour/Country rows are upserted only when their key
//! component is non-empty, so a record missing e.g. a country leaves the
//! country table untouched for that record.

use sqlx::SqlitePool;

use crate::error::{ProxyError, Result};
use crate::stats::event::{AggregateBucket, AggregateKey};

/// Applies one flushed batch atomically: every bucket's totals are added
/// to the existing row (or a fresh zeroed row), never overwritten. A
/// failure partway through rolls the whole batch back so the caller can
/// safely re-merge it into the live buffer and retry later.
pub async fn write_aggregates(pool: &SqlitePool, entries: &[(AggregateKey, AggregateBucket)]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| ProxyError::Store(format!("failed to start transaction: {e}")))?;

    for (key, bucket) in entries {
        let last_seen = bucket
            .last_seen
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| key.minute.clone());
        let hour = minute_to_hour(&key.minute);

        sqlx::query(
            r#"INSERT INTO users (user, upload_bytes, download_bytes, connection_count, request_count, first_seen, last_access, disabled)
               VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5, 0)
               ON CONFLICT(user) DO UPDATE SET
                   upload_bytes = upload_bytes + excluded.upload_bytes,
                   download_bytes = download_bytes + excluded.download_bytes,
                   connection_count = connection_count + excluded.connection_count,
                   last_access = MAX(last_access, excluded.last_access)"#,
        )
        .bind(&key.user)
        .bind(bucket.upload_bytes as i64)
        .bind(bucket.download_bytes as i64)
        .bind(bucket.connection_count as i64)
        .bind(&last_seen)
        .execute(&mut *tx)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to upsert user: {e}")))?;

        if !key.domain.is_empty() {
            sqlx::query(
                r#"INSERT INTO domain_stats (user, domain, upload_bytes, download_bytes, connection_count, last_seen)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                   ON CONFLICT(user, domain) DO UPDATE SET
                       upload_bytes = upload_bytes + excluded.upload_bytes,
                       download_bytes = download_bytes + excluded.download_bytes,
                       connection_count = connection_count + excluded.connection_count,
                       last_seen = MAX(last_seen, excluded.last_seen)"#,
            )
            .bind(&key.user)
            .bind(&key.domain)
            .bind(bucket.upload_bytes as i64)
            .bind(bucket.download_bytes as i64)
            .bind(bucket.connection_count as i64)
            .bind(&last_seen)
            .execute(&mut *tx)
            .await
            .map_err(|e| ProxyError::Store(format!("failed to upsert domain stats: {e}")))?;
        }

        if !key.minute.is_empty() {
            sqlx::query(
                r#"INSERT INTO minute_stats (user, minute, upload_bytes, download_bytes, connection_count)
                   VALUES (?1, ?2, ?3, ?4, ?5)
                   ON CONFLICT(user, minute) DO UPDATE SET
                       upload_bytes = upload_bytes + excluded.upload_bytes,
                       download_bytes = download_bytes + excluded.download_bytes,
                       connection_count = connection_count + excluded.connection_count"#,
            )
            .bind(&key.user)
            .bind(&key.minute)
            .bind(bucket.upload_bytes as i64)
            .bind(bucket.download_bytes as i64)
            .bind(bucket.connection_count as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| ProxyError::Store(format!("failed to upsert minute stats: {e}")))?;
        }

        if !hour.is_empty() {
            sqlx::query(
                r#"INSERT INTO hourly_stats (user, hour, upload_bytes, download_bytes, connection_count)
                   VALUES (?1, ?2, ?3, ?4, ?5)
                   ON CONFLICT(user, hour) DO UPDATE SET
                       upload_bytes = upload_bytes + excluded.upload_bytes,
                       download_bytes = download_bytes + excluded.download_bytes,
                       connection_count = connection_count + excluded.connection_count"#,
            )
            .bind(&key.user)
            .bind(&hour)
            .bind(bucket.upload_bytes as i64)
            .bind(bucket.download_bytes as i64)
            .bind(bucket.connection_count as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| ProxyError::Store(format!("failed to upsert hourly stats: {e}")))?;
        }

        if let Some(country) = &bucket.country {
            sqlx::query(
                r#"INSERT INTO country_stats (user, country_code, country_name, continent, upload_bytes, download_bytes, connection_count, last_seen)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                   ON CONFLICT(user, country_code) DO UPDATE SET
                       upload_bytes = upload_bytes + excluded.upload_bytes,
                       download_bytes = download_bytes + excluded.download_bytes,
                       connection_count = connection_count + excluded.connection_count,
                       last_seen = MAX(last_seen, excluded.last_seen),
                       country_name = COALESCE(country_stats.country_name, excluded.country_name),
                       continent = COALESCE(country_stats.continent, excluded.continent)"#,
            )
            .bind(&key.user)
            .bind(&country.code)
            .bind(&country.name)
            .bind(&country.continent)
            .bind(bucket.upload_bytes as i64)
            .bind(bucket.download_bytes as i64)
            .bind(bucket.connection_count as i64)
            .bind(&last_seen)
            .execute(&mut *tx)
            .await
            .map_err(|e| ProxyError::Store(format!("failed to upsert country stats: {e}")))?;
        }
    }

    tx.commit()
        .await
        .map_err(|e| ProxyError::Store(format!("failed to commit stats batch: {e}")))
}

/// Creates the User Row if missing (`first_seen = last_access = now`) and
/// sets the disabled flag. Idempotent at the SQL level: a second disable
/// is a no-op write, not an error.
pub async fn set_user_disabled(pool: &SqlitePool, user: &str, disabled: bool, now: &str) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO users (user, upload_bytes, download_bytes, connection_count, request_count, first_seen, last_access, disabled)
           VALUES (?1, 0, 0, 0, 0, ?2, ?2, ?3)
           ON CONFLICT(user) DO UPDATE SET disabled = excluded.disabled"#,
    )
    .bind(user)
    .bind(now)
    .bind(disabled)
    .execute(pool)
    .await
    .map_err(|e| ProxyError::Store(format!("failed to set user disabled flag: {e}")))?;
    Ok(())
}

/// Cheap indexed lookup used on every authenticated request (spec section
/// 9: "the check runs on every authenticated request -- expect it to be
/// cheap"). A user with no row at all has never been disabled.
pub async fn is_user_disabled(pool: &SqlitePool, user: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT disabled FROM users WHERE user = ?1")
        .bind(user)
        .fetch_optional(pool)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to read user disabled flag: {e}")))?;
    Ok(row.map(|(disabled,)| disabled != 0).unwrap_or(false))
}

/// Increments the separate HTTP request counter (spec section 4.5: "A
/// separate counter incremented whenever a valid-certificate non-CONNECT
/// request is observed"). Creates the user row if it does not yet exist.
pub async fn increment_request_count(pool: &SqlitePool, user: &str, now: &str) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO users (user, upload_bytes, download_bytes, connection_count, request_count, first_seen, last_access, disabled)
           VALUES (?1, 0, 0, 0, 1, ?2, ?2, 0)
           ON CONFLICT(user) DO UPDATE SET
               request_count = request_count + 1,
               last_access = MAX(last_access, excluded.last_access)"#,
    )
    .bind(user)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| ProxyError::Store(format!("failed to increment request count: {e}")))?;
    Ok(())
}

fn minute_to_hour(minute: &str) -> String {
    if minute.len() >= 13 {
        format!("{}:00:00", &minute[..13])
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_to_hour_truncates() {
        assert_eq!(minute_to_hour("2026-07-28T10:15:00"), "2026-07-28T10:00:00");
    }

    #[test]
    fn minute_to_hour_empty_on_malformed_input() {
        assert_eq!(minute_to_hour(""), "");
    }
}
