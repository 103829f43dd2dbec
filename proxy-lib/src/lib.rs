#![forbid(unsafe_code)]

pub mod admin;
pub mod config;
pub mod error;
pub mod geoip;
pub mod identity;
pub mod proxy;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod tls;
pub mod tunnel;

pub use config::{load_from_path, Config, ConfigOverrides};
pub use error::{ProxyError, Result};
pub use identity::{verify_peer, PeerIdentity};
pub use stats::{Collector, StatsHandle};
pub use store::Store;
pub use tls::{build_admin_acceptor, build_proxy_acceptor};
