//! Stats Store (C5): the persistent relational store behind the
//! statistics pipeline and the admin control plane (spec section 4.5).

mod legacy_import;
pub mod model;
mod pool;
mod queries;
pub mod retention;
mod schema;
mod writes;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::info;

pub use model::{CountryRow, DomainRow, Overview, TrendGranularity, TrendPoint, TrendRange, UserRow};

use crate::config::StatsConfig;
use crate::error::Result;
use crate::stats::event::{AggregateBucket, AggregateKey};

/// Owns the SQLite connection pool and every read/write operation the
/// rest of the crate performs against it. Shared behind an `Arc` -- sqlx's
/// pool does its own internal locking, so no additional synchronization
/// is needed here (spec section 5: "the store handle is shared and relies
/// on internal locking").
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the SQLite database at `db_path`,
    /// applies the schema, and imports the legacy JSON file if configured
    /// and present. Fatal on open/schema failure per spec section 7;
    /// legacy import failures are swallowed internally.
    pub async fn open(stats: &StatsConfig) -> Result<Self> {
        let pool = pool::open(&stats.db_path).await?;
        schema::ensure_schema(&pool).await?;

        if let Some(legacy_path) = &stats.file_path {
            legacy_import::import_if_present(&pool, legacy_path).await?;
        }

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| crate::error::ProxyError::Store(format!("failed to open in-memory store: {e}")))?;
        schema::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn write_aggregates(&self, entries: &[(AggregateKey, AggregateBucket)]) -> Result<()> {
        writes::write_aggregates(&self.pool, entries).await
    }

    pub async fn set_user_disabled(&self, user: &str, disabled: bool) -> Result<()> {
        writes::set_user_disabled(&self.pool, user, disabled, &Utc::now().to_rfc3339()).await
    }

    pub async fn is_user_disabled(&self, user: &str) -> Result<bool> {
        writes::is_user_disabled(&self.pool, user).await
    }

    pub async fn increment_request_count(&self, user: &str) -> Result<()> {
        writes::increment_request_count(&self.pool, user, &Utc::now().to_rfc3339()).await
    }

    pub async fn overview(&self) -> Result<Overview> {
        queries::overview(&self.pool).await
    }

    pub async fn all_users(&self) -> Result<Vec<UserRow>> {
        queries::all_users(&self.pool).await
    }

    pub async fn user(&self, name: &str) -> Result<Option<UserRow>> {
        queries::user(&self.pool, name).await
    }

    pub async fn top_domains(&self, user_filter: Option<&str>, limit: i64) -> Result<Vec<DomainRow>> {
        queries::top_domains(&self.pool, user_filter, limit).await
    }

    pub async fn countries(&self) -> Result<Vec<CountryRow>> {
        queries::countries(&self.pool).await
    }

    pub async fn trends(&self, range: TrendRange) -> Result<Vec<TrendPoint>> {
        queries::trends(&self.pool, range, Utc::now()).await
    }

    pub async fn retention_sweep(&self, minute_retention_days: i64, hour_retention_days: i64) {
        retention::run_once(&self.pool, minute_retention_days, hour_retention_days).await
    }
}

/// Spawns the background retention-cleanup task (spec section 4.5: "every
/// 6h is acceptable"). Returns a handle the caller can abort on shutdown.
pub fn spawn_retention_task(store: Arc<Store>, minute_retention_days: i64, hour_retention_days: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(6 * 60 * 60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            info!("running retention cleanup sweep");
            store.retention_sweep(minute_retention_days, hour_retention_days).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::event::CountryInfo;

    fn bucket(upload: u64, download: u64, country: Option<CountryInfo>) -> AggregateBucket {
        AggregateBucket {
            upload_bytes: upload,
            download_bytes: download,
            connection_count: 1,
            last_seen: Some(Utc::now()),
            country,
        }
    }

    fn key(user: &str, domain: &str, country_code: Option<&str>, minute: &str) -> AggregateKey {
        AggregateKey {
            user: user.to_string(),
            domain: domain.to_string(),
            country_code: country_code.map(str::to_string),
            minute: minute.to_string(),
        }
    }

    #[tokio::test]
    async fn scenario_two_users_accumulation() {
        let store = Store::open_in_memory().await.unwrap();
        let minute = "2026-07-28T10:00:00";
        let us = CountryInfo { code: "US".to_string(), name: "United States".to_string(), continent: "NA".to_string() };
        let jp = CountryInfo { code: "JP".to_string(), name: "Japan".to_string(), continent: "AS".to_string() };

        let entries = vec![
            (key("alice", "google.com", Some("US"), minute), bucket(1000, 5000, Some(us.clone()))),
            (key("alice", "github.com", Some("US"), minute), bucket(2000, 8000, Some(us))),
            (key("bob", "example.jp", Some("JP"), minute), bucket(500, 1500, Some(jp))),
        ];
        store.write_aggregates(&entries).await.unwrap();

        let overview = store.overview().await.unwrap();
        assert_eq!(overview.total_upload_bytes, 3500);
        assert_eq!(overview.total_download_bytes, 14500);
        assert_eq!(overview.user_count, 2);
        assert_eq!(overview.domain_count, 3);
        assert_eq!(overview.country_count, 2);

        let users = store.all_users().await.unwrap();
        assert_eq!(users[0].user, "alice");
        assert_eq!(users[0].upload_bytes, 3000);
    }

    #[tokio::test]
    async fn scenario_same_key_twice_accumulates() {
        let store = Store::open_in_memory().await.unwrap();
        let minute = "2026-07-28T10:00:00";
        let k = key("alice", "google.com", None, minute);

        store.write_aggregates(&[(k.clone(), bucket(100, 200, None))]).await.unwrap();
        store.write_aggregates(&[(k, bucket(300, 400, None))]).await.unwrap();

        let alice = store.user("alice").await.unwrap().unwrap();
        assert_eq!(alice.upload_bytes, 400);
        assert_eq!(alice.download_bytes, 600);
        assert_eq!(alice.connection_count, 2);
    }

    #[tokio::test]
    async fn top_domains_with_user_filter_returns_only_that_users_rows() {
        let store = Store::open_in_memory().await.unwrap();
        let minute = "2026-07-28T10:00:00";
        store
            .write_aggregates(&[
                (key("alice", "google.com", None, minute), bucket(1, 1, None)),
                (key("alice", "github.com", None, minute), bucket(1, 1, None)),
                (key("bob", "example.jp", None, minute), bucket(1, 1, None)),
            ])
            .await
            .unwrap();

        let domains = store.top_domains(Some("alice"), 10).await.unwrap();
        assert_eq!(domains.len(), 2);
        assert!(domains.iter().all(|d| d.user == "alice"));
    }

    #[tokio::test]
    async fn countries_sorted_by_total_bytes_descending() {
        let store = Store::open_in_memory().await.unwrap();
        let minute = "2026-07-28T10:00:00";
        let us = CountryInfo { code: "US".to_string(), name: "United States".to_string(), continent: "NA".to_string() };
        let jp = CountryInfo { code: "JP".to_string(), name: "Japan".to_string(), continent: "AS".to_string() };
        store
            .write_aggregates(&[
                (key("alice", "google.com", Some("US"), minute), bucket(1000, 5000, Some(us))),
                (key("bob", "example.jp", Some("JP"), minute), bucket(500, 1500, Some(jp))),
            ])
            .await
            .unwrap();

        let countries = store.countries().await.unwrap();
        assert_eq!(countries[0].country_code, "US");
        assert_eq!(countries[1].country_code, "JP");
    }

    #[tokio::test]
    async fn partially_empty_records_leave_empty_tables_untouched() {
        let store = Store::open_in_memory().await.unwrap();
        let k = AggregateKey {
            user: "alice".to_string(),
            domain: String::new(),
            country_code: None,
            minute: "2026-07-28T10:00:00".to_string(),
        };
        store.write_aggregates(&[(k, bucket(10, 20, None))]).await.unwrap();

        let domains = store.top_domains(None, 10).await.unwrap();
        assert!(domains.is_empty());
        let countries = store.countries().await.unwrap();
        assert!(countries.is_empty());
    }

    #[tokio::test]
    async fn disable_then_enable_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(!store.is_user_disabled("alice").await.unwrap());

        store.set_user_disabled("alice", true).await.unwrap();
        assert!(store.is_user_disabled("alice").await.unwrap());

        store.set_user_disabled("alice", false).await.unwrap();
        assert!(!store.is_user_disabled("alice").await.unwrap());
    }

    #[tokio::test]
    async fn increment_request_count_creates_and_accumulates() {
        let store = Store::open_in_memory().await.unwrap();
        store.increment_request_count("alice").await.unwrap();
        store.increment_request_count("alice").await.unwrap();
        let alice = store.user("alice").await.unwrap().unwrap();
        assert_eq!(alice.request_count, 2);
    }

    #[tokio::test]
    async fn retention_sweep_deletes_rows_older_than_cutoff() {
        let store = Store::open_in_memory().await.unwrap();
        let old_minute = (Utc::now() - chrono::Duration::days(10)).format("%Y-%m-%dT%H:%M:00").to_string();
        let recent_minute = Utc::now().format("%Y-%m-%dT%H:%M:00").to_string();

        store
            .write_aggregates(&[
                (key("alice", "", None, &old_minute), bucket(1, 1, None)),
                (key("alice", "", None, &recent_minute), bucket(1, 1, None)),
            ])
            .await
            .unwrap();

        store.retention_sweep(2, 90).await;

        let remaining: Vec<(String,)> = sqlx::query_as("SELECT minute FROM minute_stats")
            .fetch_all(store.pool())
            .await
            .unwrap();
        assert!(!remaining.iter().any(|(m,)| m == &old_minute));
        assert!(remaining.iter().any(|(m,)| m == &recent_minute));
    }
}
