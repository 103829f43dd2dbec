//! Idempotent schema creation. Runs on every `Store::open` -- safe to
//! call against an existing database since every statement is
//! `CREATE TABLE IF NOT EXISTS`. Six tables total, matching spec section
//! 4.5: `users`, `domain_stats`, `minute_stats`, `hourly_stats`,
//! `country_stats`, plus the one-shot `legacy_import_log`.

use sqlx::SqlitePool;

use crate::error::{ProxyError, Result};

const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        user TEXT PRIMARY KEY,
        upload_bytes INTEGER NOT NULL DEFAULT 0,
        download_bytes INTEGER NOT NULL DEFAULT 0,
        connection_count INTEGER NOT NULL DEFAULT 0,
        request_count INTEGER NOT NULL DEFAULT 0,
        first_seen TEXT NOT NULL,
        last_access TEXT NOT NULL,
        disabled INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS domain_stats (
        user TEXT NOT NULL,
        domain TEXT NOT NULL,
        upload_bytes INTEGER NOT NULL DEFAULT 0,
        download_bytes INTEGER NOT NULL DEFAULT 0,
        connection_count INTEGER NOT NULL DEFAULT 0,
        last_seen TEXT NOT NULL,
        PRIMARY KEY (user, domain)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS minute_stats (
        user TEXT NOT NULL,
        minute TEXT NOT NULL,
        upload_bytes INTEGER NOT NULL DEFAULT 0,
        download_bytes INTEGER NOT NULL DEFAULT 0,
        connection_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user, minute)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS hourly_stats (
        user TEXT NOT NULL,
        hour TEXT NOT NULL,
        upload_bytes INTEGER NOT NULL DEFAULT 0,
        download_bytes INTEGER NOT NULL DEFAULT 0,
        connection_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user, hour)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS country_stats (
        user TEXT NOT NULL,
        country_code TEXT NOT NULL,
        country_name TEXT,
        continent TEXT,
        upload_bytes INTEGER NOT NULL DEFAULT 0,
        download_bytes INTEGER NOT NULL DEFAULT 0,
        connection_count INTEGER NOT NULL DEFAULT 0,
        last_seen TEXT NOT NULL,
        PRIMARY KEY (user, country_code)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS legacy_import_log (
        imported_at TEXT NOT NULL,
        source_path TEXT NOT NULL,
        records_migrated INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_domain_stats_user ON domain_stats(user)",
    "CREATE INDEX IF NOT EXISTS idx_minute_stats_minute ON minute_stats(minute)",
    "CREATE INDEX IF NOT EXISTS idx_hourly_stats_hour ON hourly_stats(hour)",
    "CREATE INDEX IF NOT EXISTS idx_country_stats_code ON country_stats(country_code)",
];

pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| ProxyError::Store(format!("failed to apply schema: {e}")))?;
    }
    Ok(())
}
