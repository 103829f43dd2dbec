//! Row types returned by the read-side queries (spec section 3 / 4.6).

use serde::Serialize;

/// A single `User Row`: cumulative totals plus lifecycle timestamps and the
/// disabled flag enforced by the proxy front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    pub user: String,
    pub upload_bytes: i64,
    pub download_bytes: i64,
    pub connection_count: i64,
    pub request_count: i64,
    pub first_seen: String,
    pub last_access: String,
    pub disabled: bool,
}

/// One `Domain Row`: a (user, domain) pair's cumulative traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainRow {
    pub user: String,
    pub domain: String,
    pub upload_bytes: i64,
    pub download_bytes: i64,
    pub connection_count: i64,
    pub last_seen: String,
}

/// One `Country Row`, already aggregated across users by the read query
/// (spec section 4.5: "Country Rows grouped by country, aggregated across
/// users").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRow {
    pub country_code: String,
    pub country_name: String,
    pub continent: String,
    pub upload_bytes: i64,
    pub download_bytes: i64,
    pub connection_count: i64,
}

/// One point on a trend time series, drawn from either the Minute Row or
/// Hour Row table depending on the requested range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub bucket: String,
    pub upload_bytes: i64,
    pub download_bytes: i64,
    pub connection_count: i64,
}

/// Which table a trend range reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendGranularity {
    Minute,
    Hour,
}

/// A named trend range as exposed on the admin API (`30m`, `1h`, `24h`, `7d`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendRange {
    Minutes30,
    Hour1,
    Hours24,
    Days7,
}

impl TrendRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "30m" => Some(Self::Minutes30),
            "1h" => Some(Self::Hour1),
            "24h" => Some(Self::Hours24),
            "7d" => Some(Self::Days7),
            _ => None,
        }
    }

    /// Ranges <= 1 hour read the Minute Row table; ranges >= 24h read the
    /// Hour Row table (spec section 4.5).
    pub fn granularity(self) -> TrendGranularity {
        match self {
            Self::Minutes30 | Self::Hour1 => TrendGranularity::Minute,
            Self::Hours24 | Self::Days7 => TrendGranularity::Hour,
        }
    }

    pub fn duration(self) -> chrono::Duration {
        match self {
            Self::Minutes30 => chrono::Duration::minutes(30),
            Self::Hour1 => chrono::Duration::hours(1),
            Self::Hours24 => chrono::Duration::hours(24),
            Self::Days7 => chrono::Duration::days(7),
        }
    }
}

impl Default for TrendRange {
    fn default() -> Self {
        Self::Hour1
    }
}

/// The `/overview` snapshot: store-wide totals plus distinct-domain and
/// distinct-country counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub total_upload_bytes: i64,
    pub total_download_bytes: i64,
    pub total_connection_count: i64,
    pub user_count: i64,
    pub domain_count: i64,
    pub country_count: i64,
}

impl Overview {
    /// Average bytes (both directions) per connection, `0.0` when there
    /// are no connections yet instead of dividing by zero (spec section
    /// 9 open question: the source's template helper can divide by zero
    /// on a user with no connections).
    pub fn avg_bytes_per_connection(&self) -> f64 {
        if self.total_connection_count == 0 {
            return 0.0;
        }
        (self.total_upload_bytes + self.total_download_bytes) as f64 / self.total_connection_count as f64
    }
}
