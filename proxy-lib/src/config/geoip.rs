use serde::Deserialize;

/// GeoIP (MaxMind GeoLite2-Country) enrichment configuration. Treated as an
/// opaque IP -> country resolver; absence of the database disables
/// enrichment silently rather than failing startup.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeoIpConfig {
    /// Whether GeoIP enrichment is attempted at all. Default: false.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the `GeoLite2-Country.mmdb` file.
    #[serde(default)]
    pub db_path: Option<String>,
}
