mod admin;
mod geoip;
mod logging;
mod loader;
mod overrides;
mod proxy;
mod root;
mod server;
mod stats;
mod validator;

pub use admin::{AdminConfig, AdminInterfaces, Language};
pub use geoip::GeoIpConfig;
pub use logging::LoggingConfig;
pub use loader::load_from_path;
pub use overrides::ConfigOverrides;
pub use proxy::ProxyFrontConfig;
pub use root::Config;
pub use server::ServerConfig;
pub use stats::{RetentionConfig, StatsConfig};
pub use validator::validate_config;
