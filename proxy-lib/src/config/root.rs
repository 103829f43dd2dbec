use serde::Deserialize;

use super::admin::AdminConfig;
use super::geoip::GeoIpConfig;
use super::logging::LoggingConfig;
use super::proxy::ProxyFrontConfig;
use super::server::ServerConfig;
use super::stats::StatsConfig;

/// Root configuration tree, parsed from the TOML file named by `--config`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The primary mTLS listener and tunnel tuning knobs.
    pub server: ServerConfig,
    /// The decoy default site and whether proxying is enabled at all.
    pub proxy: ProxyFrontConfig,
    /// Statistics pipeline (collector + relational store).
    #[serde(default)]
    pub stats: StatsConfig,
    /// GeoIP country enrichment.
    #[serde(default)]
    pub geoip: GeoIpConfig,
    /// Admin control-plane listener.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Structured logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}
