//! The event shape emitted once per finished tunnel (spec section 3).

use std::net::IpAddr;

use chrono::{DateTime, Utc};

/// Country metadata resolved from the destination IP, when GeoIP is
/// enabled. `None` means either GeoIP is disabled or the lookup missed --
/// downstream tables all treat an empty country as a valid key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryInfo {
    pub code: String,
    pub name: String,
    pub continent: String,
}

/// One completed (or abandoned) tunnel's accounting, handed to the
/// collector off the hot path. Emitted exactly once per tunnel, regardless
/// of whether the tunnel ever moved a byte.
#[derive(Debug, Clone)]
pub struct TrafficEvent {
    pub user: String,
    pub domain: String,
    pub destination_ip: Option<IpAddr>,
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub timestamp: DateTime<Utc>,
    pub country: Option<CountryInfo>,
}

/// The key an aggregate bucket accumulates under: user, domain, country,
/// and minute-truncated timestamp (spec section 4.4). The hour-truncated
/// key is derived from `minute` at write time rather than tracked as a
/// second live dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub user: String,
    pub domain: String,
    pub country_code: Option<String>,
    pub minute: String,
}

/// Accumulated totals for one `AggregateKey` since the last flush cycle.
#[derive(Debug, Clone, Default)]
pub struct AggregateBucket {
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub connection_count: u64,
    pub last_seen: Option<DateTime<Utc>>,
    pub country: Option<CountryInfo>,
}

impl AggregateBucket {
    pub fn accumulate(&mut self, event: &TrafficEvent) {
        self.upload_bytes += event.upload_bytes;
        self.download_bytes += event.download_bytes;
        self.connection_count += 1;
        self.last_seen = Some(match self.last_seen {
            Some(prev) if prev >= event.timestamp => prev,
            _ => event.timestamp,
        });
        if self.country.is_none() {
            self.country = event.country.clone();
        }
    }
}
