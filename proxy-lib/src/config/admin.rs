use serde::Deserialize;

/// UI/API surface toggles for the admin endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminInterfaces {
    /// Serve the (externally supplied) static dashboard. This crate does not
    /// ship the dashboard templates; when true and no assets are present the
    /// admin listener simply has nothing to serve at `/`.
    #[serde(default = "default_true")]
    pub web: bool,
    /// Serve the JSON read/write API described in spec section 4.6.
    #[serde(default = "default_true")]
    pub api: bool,
}

impl Default for AdminInterfaces {
    fn default() -> Self {
        Self { web: default_true(), api: default_true() }
    }
}

/// Admin/control-plane language preference. Narrow, read-only-after-startup
/// exception: tests may ignore it since it affects only UI copy, never
/// query semantics.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

/// The admin control-plane listener: a second mTLS endpoint that requires
/// and verifies a client certificate on every call.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    /// Whether the admin listener is started at all. Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Port to listen on. Default: 9444.
    #[serde(default = "default_port")]
    pub port: u16,
    /// UI language preference.
    #[serde(default)]
    pub language: Language,
    /// Which surfaces to serve.
    #[serde(default)]
    pub interfaces: AdminInterfaces,
    /// Certificate for the admin listener. Falls back to the proxy
    /// listener's certificate when omitted.
    #[serde(default)]
    pub cert_path: Option<String>,
    /// Private key for the admin listener. Falls back to the proxy
    /// listener's key when omitted.
    #[serde(default)]
    pub key_path: Option<String>,
    /// Trust root for verifying admin client certificates. Falls back to
    /// the proxy listener's trust root when omitted.
    #[serde(default)]
    pub ca_path: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_port(),
            language: Language::default(),
            interfaces: AdminInterfaces::default(),
            cert_path: None,
            key_path: None,
            ca_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    9444
}
