//! GeoIP Resolver: an opaque lookup from destination IP to country,
//! backed by a MaxMind GeoLite2-Country database. Disabled (and silently
//! absent) whenever no database path is configured or the database fails
//! to load -- GeoIP is an enrichment, never a hard dependency of the data
//! plane.

use std::net::IpAddr;
use std::path::Path;

use maxminddb::geoip2;
use tracing::warn;

use crate::stats::event::CountryInfo;

pub struct Resolver {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl Resolver {
    /// Opens the database at `path`. Returns `None` (not an error) on any
    /// failure to open or parse it -- the caller runs without GeoIP rather
    /// than failing startup.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        match maxminddb::Reader::open_readfile(path.as_ref()) {
            Ok(reader) => Some(Self { reader }),
            Err(e) => {
                warn!(error = %e, path = %path.as_ref().display(), "failed to open geoip database, disabling geoip");
                None
            }
        }
    }

    pub fn lookup(&self, ip: IpAddr) -> Option<CountryInfo> {
        let record: geoip2::Country = self.reader.lookup(ip).ok().flatten()?;
        let country = record.country?;
        let code = country.iso_code?.to_string();
        let name = country
            .names
            .as_ref()
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string())
            .unwrap_or_else(|| code.clone());
        let continent = record
            .continent
            .as_ref()
            .and_then(|c| c.code)
            .map(|s| s.to_string())
            .unwrap_or_default();
        Some(CountryInfo { code, name, continent })
    }
}
