use serde::Deserialize;

/// Retention windows for the time-bucketed tables.
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Days to keep Minute Row entries before retention cleanup deletes them.
    /// Default: 2.
    #[serde(default = "default_minute_retention_days")]
    pub minute_stats_days: i64,
    /// Days to keep Hour Row entries before retention cleanup deletes them.
    /// Default: 90.
    #[serde(default = "default_hourly_retention_days")]
    pub hourly_stats_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            minute_stats_days: default_minute_retention_days(),
            hourly_stats_days: default_hourly_retention_days(),
        }
    }
}

fn default_minute_retention_days() -> i64 {
    2
}

fn default_hourly_retention_days() -> i64 {
    90
}

/// Statistics pipeline configuration: the collector, the relational store,
/// and the one-shot legacy-JSON import.
#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// Whether the statistics pipeline (collector + store) is enabled.
    /// Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path to the legacy single-file JSON statistics blob (best-effort,
    /// imported once on first startup if present). Optional.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Path to the SQLite database file. Created on first run.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// How often the background save/checkpoint tick runs, in seconds.
    /// Distinct from `flush_interval_seconds`: this is the interval the
    /// teacher's equivalent single-file JSON manager used to persist to
    /// disk; kept here purely as a config-compatible knob for deployments
    /// migrating from that legacy format. Default: 60.
    #[serde(default = "default_save_period")]
    pub save_period_seconds: u64,
    /// Collector flush interval in seconds (see `stats::collector`).
    /// Default: 30.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_seconds: u64,
    /// Collector in-memory buffer size that triggers an early flush.
    /// Default: 5000.
    #[serde(default = "default_max_buffer")]
    pub max_buffer: usize,
    /// Retention windows.
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            file_path: None,
            db_path: default_db_path(),
            save_period_seconds: default_save_period(),
            flush_interval_seconds: default_flush_interval(),
            max_buffer: default_max_buffer(),
            retention: RetentionConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> String {
    "stats/proxy_stats.db".to_string()
}

fn default_save_period() -> u64 {
    60
}

fn default_flush_interval() -> u64 {
    30
}

fn default_max_buffer() -> usize {
    5_000
}
