//! Structured logging setup (ambient, C9). A thin wrapper so the binary
//! crate does not need to know `tracing_subscriber`'s builder API -- it
//! only names the configured level string.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `RUST_LOG` always wins over
/// the configured level when set, matching the teacher's `main.rs`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
