use serde::Deserialize;

/// The decoy/default site that unauthenticated or non-CONNECT requests are
/// forwarded to.
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyFrontConfig {
    /// Whether the forward-proxy front end is enabled at all.
    /// Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the default site. The incoming request URI is appended
    /// verbatim to this URL and all headers are copied through.
    pub default_site: String,
}

fn default_true() -> bool {
    true
}
