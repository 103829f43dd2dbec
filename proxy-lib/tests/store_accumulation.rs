//! Exercises the Stats Store through its public API against a real
//! file-backed SQLite database, the way the admin control plane and the
//! collector's flush path do in production.

use chrono::Utc;
use proxy_lib::config::StatsConfig;
use proxy_lib::stats::{AggregateBucket, AggregateKey, CountryInfo};
use proxy_lib::Store;

fn db_path(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("proxy-lib-test-{name}-{nanos}.db")).to_str().unwrap().to_string()
}

async fn open_store(name: &str) -> Store {
    let cfg = StatsConfig { db_path: db_path(name), ..StatsConfig::default() };
    Store::open(&cfg).await.expect("store opens against a fresh file")
}

fn key(user: &str, domain: &str, country_code: Option<&str>, minute: &str) -> AggregateKey {
    AggregateKey {
        user: user.to_string(),
        domain: domain.to_string(),
        country_code: country_code.map(str::to_string),
        minute: minute.to_string(),
    }
}

fn bucket(upload: u64, download: u64, country: Option<CountryInfo>) -> AggregateBucket {
    AggregateBucket { upload_bytes: upload, download_bytes: download, connection_count: 1, last_seen: Some(Utc::now()), country }
}

#[tokio::test]
async fn two_users_accumulate_into_overview_and_user_rows() {
    let store = open_store("two_users").await;
    let minute = "2026-07-28T10:00:00";
    let us = CountryInfo { code: "US".to_string(), name: "United States".to_string(), continent: "NA".to_string() };
    let jp = CountryInfo { code: "JP".to_string(), name: "Japan".to_string(), continent: "AS".to_string() };

    store
        .write_aggregates(&[
            (key("alice", "google.com", Some("US"), minute), bucket(1000, 5000, Some(us.clone()))),
            (key("alice", "github.com", Some("US"), minute), bucket(2000, 8000, Some(us))),
            (key("bob", "example.jp", Some("JP"), minute), bucket(500, 1500, Some(jp))),
        ])
        .await
        .expect("batch upsert succeeds");

    let overview = store.overview().await.unwrap();
    assert_eq!(overview.total_upload_bytes, 3500);
    assert_eq!(overview.total_download_bytes, 14500);
    assert_eq!(overview.user_count, 2);
    assert_eq!(overview.domain_count, 3);
    assert_eq!(overview.country_count, 2);
    assert!(overview.avg_bytes_per_connection() > 0.0);

    let users = store.all_users().await.unwrap();
    assert_eq!(users[0].user, "alice");
    assert_eq!(users[0].upload_bytes, 3000);
}

#[tokio::test]
async fn upsert_is_idempotent_under_repeated_identical_events() {
    let store = open_store("idempotent").await;
    let minute = "2026-07-28T10:00:00";
    let k = key("alice", "google.com", None, minute);
    let single = bucket(100, 200, None);

    for _ in 0..3 {
        store.write_aggregates(&[(k.clone(), single.clone())]).await.unwrap();
    }

    let alice = store.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.upload_bytes, 300);
    assert_eq!(alice.download_bytes, 600);
    assert_eq!(alice.connection_count, 3);
}

#[tokio::test]
async fn domain_totals_never_exceed_user_totals() {
    let store = open_store("domain_bound").await;
    let minute = "2026-07-28T10:00:00";
    store
        .write_aggregates(&[
            (key("alice", "google.com", None, minute), bucket(1000, 2000, None)),
            (key("alice", "github.com", None, minute), bucket(500, 700, None)),
        ])
        .await
        .unwrap();

    let alice = store.user("alice").await.unwrap().unwrap();
    let domains = store.top_domains(Some("alice"), 10).await.unwrap();
    let domain_total: i64 = domains.iter().map(|d| d.upload_bytes + d.download_bytes).sum();
    assert!(domain_total <= alice.upload_bytes + alice.download_bytes);
}

#[tokio::test]
async fn disable_then_enable_round_trips_through_the_store() {
    let store = open_store("disable_enable").await;
    assert!(!store.is_user_disabled("alice").await.unwrap());

    store.set_user_disabled("alice", true).await.unwrap();
    assert!(store.is_user_disabled("alice").await.unwrap());

    // A second disable is idempotent at the semantic level.
    store.set_user_disabled("alice", true).await.unwrap();
    assert!(store.is_user_disabled("alice").await.unwrap());

    store.set_user_disabled("alice", false).await.unwrap();
    assert!(!store.is_user_disabled("alice").await.unwrap());
}

#[tokio::test]
async fn retention_sweep_prunes_only_expired_minute_rows() {
    let store = open_store("retention").await;
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

    // Cumulative user totals survive retention regardless of minute-row pruning.
    let alice = store.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.connection_count, 2);
}

#[tokio::test]
async fn partially_empty_records_leave_empty_dimension_tables_untouched() {
    let store = open_store("partial").await;
    let k = key("alice", "", None, "2026-07-28T10:00:00");
    store.write_aggregates(&[(k, bucket(10, 20, None))]).await.unwrap();

    assert!(store.top_domains(None, 10).await.unwrap().is_empty());
    assert!(store.countries().await.unwrap().is_empty());

    let alice = store.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.upload_bytes, 10);
}

#[tokio::test]
async fn empty_common_name_user_is_a_valid_key_not_an_error() {
    // Spec section 4.1: "Common Name empty -> still treated as a user ''
    // and must be accepted by downstream components".
    let store = open_store("empty_cn").await;
    let minute = "2026-07-28T10:00:00";
    store
        .write_aggregates(&[(key("", "example.com", None, minute), bucket(10, 20, None))])
        .await
        .expect("batch upsert accepts an empty user key");

    let anonymous = store.user("").await.unwrap().expect("empty-string user row exists");
    assert_eq!(anonymous.upload_bytes, 10);
    assert_eq!(anonymous.download_bytes, 20);
    assert!(!anonymous.disabled);

    let all = store.all_users().await.unwrap();
    assert!(all.iter().any(|u| u.user.is_empty()));
}

#[tokio::test]
async fn request_counter_is_independent_of_connection_count() {
    let store = open_store("request_counter").await;
    store.increment_request_count("alice").await.unwrap();
    store.increment_request_count("alice").await.unwrap();
    store.increment_request_count("alice").await.unwrap();

    let alice = store.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.request_count, 3);
    assert_eq!(alice.connection_count, 0);
}
