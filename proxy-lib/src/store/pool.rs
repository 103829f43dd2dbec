//! SQLite connection pool setup. Pragmas mirror the WAL/synchronous/cache
//! tuning used for embedded SQLite stores elsewhere in the ecosystem:
//! `journal_mode=WAL` lets readers (admin queries) proceed while the
//! collector writes, `synchronous=NORMAL` trades durability-on-crash for
//! throughput (acceptable -- the aggregation buffer already re-merges a
//! batch on write failure), and `temp_store=MEMORY` keeps the sort/temp
//! b-trees used by the trend queries off disk.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::{ProxyError, Result};

pub async fn open(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ProxyError::Store(format!("failed to create stats directory: {e}")))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
        .map_err(|e| ProxyError::Store(format!("invalid stats database path: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .pragma("cache_size", "-16000")
        .pragma("temp_store", "MEMORY");

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to open stats database: {e}")))
}
