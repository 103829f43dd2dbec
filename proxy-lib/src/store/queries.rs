//! Read side: the queries that power the admin control plane (spec
//! section 4.5 "Read queries").

use sqlx::SqlitePool;

use crate::error::{ProxyError, Result};
use crate::store::model::{CountryRow, DomainRow, Overview, TrendGranularity, TrendPoint, TrendRange, UserRow};

/// Single scan over `users` for totals, plus distinct counts from the
/// domain and country tables.
pub async fn overview(pool: &SqlitePool) -> Result<Overview> {
    let totals: (i64, i64, i64, i64) = sqlx::query_as(
        r#"SELECT
               COALESCE(SUM(upload_bytes), 0),
               COALESCE(SUM(download_bytes), 0),
               COALESCE(SUM(connection_count), 0),
               COUNT(*)
           FROM users"#,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| ProxyError::Store(format!("failed to compute overview: {e}")))?;

    let domain_count: (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT domain) FROM domain_stats")
        .fetch_one(pool)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to count domains: {e}")))?;

    let country_count: (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT country_code) FROM country_stats")
        .fetch_one(pool)
        .await
        .map_err(|e| ProxyError::Store(format!("failed to count countries: {e}")))?;

    Ok(Overview {
        total_upload_bytes: totals.0,
        total_download_bytes: totals.1,
        total_connection_count: totals.2,
        user_count: totals.3,
        domain_count: domain_count.0,
        country_count: country_count.0,
    })
}

/// All `User Row`s, sorted descending by `upload + download`.
pub async fn all_users(pool: &SqlitePool) -> Result<Vec<UserRow>> {
    let rows: Vec<(String, i64, i64, i64, i64, String, String, i64)> = sqlx::query_as(
        r#"SELECT user, upload_bytes, download_bytes, connection_count, request_count, first_seen, last_access, disabled
           FROM users
           ORDER BY (upload_bytes + download_bytes) DESC"#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| ProxyError::Store(format!("failed to list users: {e}")))?;

    Ok(rows.into_iter().map(row_to_user).collect())
}

/// A single `User Row` by key, or `None` if the user has never been seen.
pub async fn user(pool: &SqlitePool, name: &str) -> Result<Option<UserRow>> {
    let row: Option<(String, i64, i64, i64, i64, String, String, i64)> = sqlx::query_as(
        r#"SELECT user, upload_bytes, download_bytes, connection_count, request_count, first_seen, last_access, disabled
           FROM users WHERE user = ?1"#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(|e| ProxyError::Store(format!("failed to fetch user: {e}")))?;

    Ok(row.map(row_to_user))
}

fn row_to_user(row: (String, i64, i64, i64, i64, String, String, i64)) -> UserRow {
    UserRow {
        user: row.0,
        upload_bytes: row.1,
        download_bytes: row.2,
        connection_count: row.3,
        request_count: row.4,
        first_seen: row.5,
        last_access: row.6,
        disabled: row.7 != 0,
    }
}

/// `Domain Row`s sorted descending by `upload + download`, with an
/// optional user filter and a numeric limit (default 50).
pub async fn top_domains(pool: &SqlitePool, user_filter: Option<&str>, limit: i64) -> Result<Vec<DomainRow>> {
    let rows: Vec<(String, String, i64, i64, i64, String)> = if let Some(u) = user_filter {
        sqlx::query_as(
            r#"SELECT user, domain, upload_bytes, download_bytes, connection_count, last_seen
               FROM domain_stats
               WHERE user = ?1
               ORDER BY (upload_bytes + download_bytes) DESC
               LIMIT ?2"#,
        )
        .bind(u)
        .bind(limit)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as(
            r#"SELECT user, domain, upload_bytes, download_bytes, connection_count, last_seen
               FROM domain_stats
               ORDER BY (upload_bytes + download_bytes) DESC
               LIMIT ?1"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
    .map_err(|e| ProxyError::Store(format!("failed to list top domains: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(user, domain, upload_bytes, download_bytes, connection_count, last_seen)| DomainRow {
            user,
            domain,
            upload_bytes,
            download_bytes,
            connection_count,
            last_seen,
        })
        .collect())
}

/// `Country Row`s grouped by country code and aggregated across users,
/// sorted descending by total bytes (spec section 4.5).
pub async fn countries(pool: &SqlitePool) -> Result<Vec<CountryRow>> {
    let rows: Vec<(String, String, String, i64, i64, i64)> = sqlx::query_as(
        r#"SELECT
               country_code,
               COALESCE(MAX(country_name), ''),
               COALESCE(MAX(continent), ''),
               SUM(upload_bytes),
               SUM(download_bytes),
               SUM(connection_count)
           FROM country_stats
           GROUP BY country_code
           ORDER BY (SUM(upload_bytes) + SUM(download_bytes)) DESC"#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| ProxyError::Store(format!("failed to aggregate countries: {e}")))?;

    Ok(rows
        .into_iter()
        .map(
            |(country_code, country_name, continent, upload_bytes, download_bytes, connection_count)| CountryRow {
                country_code,
                country_name,
                continent,
                upload_bytes,
                download_bytes,
                connection_count,
            },
        )
        .collect())
}

/// Time-series trend on the Minute Row table (ranges <= 1h) or the Hour
/// Row table (ranges >= 24h), ordered chronologically. Points are summed
/// across all users for the same bucket string.
pub async fn trends(pool: &SqlitePool, range: TrendRange, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<TrendPoint>> {
    let cutoff = now - range.duration();

    let rows: Vec<(String, i64, i64, i64)> = match range.granularity() {
        TrendGranularity::Minute => {
            let since = cutoff.format("%Y-%m-%dT%H:%M:00").to_string();
            sqlx::query_as(
                r#"SELECT minute, SUM(upload_bytes), SUM(download_bytes), SUM(connection_count)
                   FROM minute_stats
                   WHERE minute >= ?1
                   GROUP BY minute
                   ORDER BY minute ASC"#,
            )
            .bind(&since)
            .fetch_all(pool)
            .await
        }
        TrendGranularity::Hour => {
            // Stored hour keys truncate to %H:00:00; a minute-precision cutoff
            // would lexically compare below the boundary hour's key and drop it.
            let since = cutoff.format("%Y-%m-%dT%H:00:00").to_string();
            sqlx::query_as(
                r#"SELECT hour, SUM(upload_bytes), SUM(download_bytes), SUM(connection_count)
                   FROM hourly_stats
                   WHERE hour >= ?1
                   GROUP BY hour
                   ORDER BY hour ASC"#,
            )
            .bind(&since)
            .fetch_all(pool)
            .await
        }
    }
    .map_err(|e| ProxyError::Store(format!("failed to compute trends: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(bucket, upload_bytes, download_bytes, connection_count)| TrendPoint {
            bucket,
            upload_bytes,
            download_bytes,
            connection_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_range_parses_known_names() {
        assert_eq!(TrendRange::parse("30m"), Some(TrendRange::Minutes30));
        assert_eq!(TrendRange::parse("1h"), Some(TrendRange::Hour1));
        assert_eq!(TrendRange::parse("24h"), Some(TrendRange::Hours24));
        assert_eq!(TrendRange::parse("7d"), Some(TrendRange::Days7));
        assert_eq!(TrendRange::parse("bogus"), None);
    }

    #[test]
    fn trend_range_granularity_matches_spec_boundary() {
        assert_eq!(TrendRange::Minutes30.granularity(), TrendGranularity::Minute);
        assert_eq!(TrendRange::Hour1.granularity(), TrendGranularity::Minute);
        assert_eq!(TrendRange::Hours24.granularity(), TrendGranularity::Hour);
        assert_eq!(TrendRange::Days7.granularity(), TrendGranularity::Hour);
    }
}
