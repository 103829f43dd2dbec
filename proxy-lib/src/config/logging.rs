use serde::Deserialize;

/// Application-level structured logging configuration (stdout/stderr via
/// `tracing`). Mirrors the teacher's `config::telemetry::LoggingConfig`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// Default: "info". Can be overridden at runtime via `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
