use std::{env, str::FromStr, time::Duration};

use chrono::NaiveDate;
use tutorsync_core::calendar::ExpansionLimits;
use tutorsync_core::storage::{TimeWindow, MAX_BATCH_SIZE};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Seconds between materialization passes (default: 60)
    pub materialize_interval_seconds: u64,
    /// Documents per materialization batch, capped by the store limit (default: 500)
    pub materialize_batch_size: usize,
    /// Occurrences generated per weekly series (default: 52)
    pub weekly_max_occurrences: u32,
    /// Occurrences generated per fortnightly series (default: 26)
    pub fortnightly_max_occurrences: u32,
    /// Days covered by the expanded calendar (default: 365)
    pub expansion_window_days: u32,
    pub log_format: LogFormat,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MATERIALIZE_INTERVAL_SECONDS` (default: 60)
    /// - `MATERIALIZE_BATCH_SIZE` (default: 500)
    /// - `WEEKLY_MAX_OCCURRENCES` (default: 52)
    /// - `FORTNIGHTLY_MAX_OCCURRENCES` (default: 26)
    /// - `EXPANSION_WINDOW_DAYS` (default: 365)
    /// - `LOG_FORMAT` - `pretty` or `json` (default: pretty)
    pub fn from_env() -> Self {
        Self {
            materialize_interval_seconds: env_or("MATERIALIZE_INTERVAL_SECONDS", 60),
            materialize_batch_size: env_or("MATERIALIZE_BATCH_SIZE", MAX_BATCH_SIZE)
                .clamp(1, MAX_BATCH_SIZE),
            weekly_max_occurrences: env_or("WEEKLY_MAX_OCCURRENCES", 52),
            fortnightly_max_occurrences: env_or("FORTNIGHTLY_MAX_OCCURRENCES", 26),
            expansion_window_days: env_or("EXPANSION_WINDOW_DAYS", 365),
            log_format: env_or("LOG_FORMAT", LogFormat::Pretty),
        }
    }

    pub fn materialize_interval(&self) -> Duration {
        Duration::from_secs(self.materialize_interval_seconds.max(1))
    }

    pub fn expansion_limits(&self) -> ExpansionLimits {
        ExpansionLimits {
            weekly: self.weekly_max_occurrences,
            fortnightly: self.fortnightly_max_occurrences,
        }
    }

    /// Window of the expanded calendar starting at midnight UTC of `from`.
    pub fn window_from(&self, from: NaiveDate) -> TimeWindow {
        TimeWindow::days_from(from, self.expansion_window_days)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            materialize_interval_seconds: 60,
            materialize_batch_size: MAX_BATCH_SIZE,
            weekly_max_occurrences: 52,
            fortnightly_max_occurrences: 26,
            expansion_window_days: 365,
            log_format: LogFormat::Pretty,
        }
    }
}
