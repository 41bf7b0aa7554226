use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the draw-ledger back office.
///
/// Ticket-group caps, draw windows and rate tables are operator data and live
/// in storage; this only carries process-level settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path (default: `.draw-ledger/` in current directory)
    pub data_dir: PathBuf,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Log level: "info", "debug", "warn", "error" (default: "info")
    pub log_level: String,

    /// Operator wall-clock offset from UTC in minutes (default: 330, IST)
    pub utc_offset_minutes: i32,

    /// Lifetime of a cached report (default: 300 seconds)
    pub report_cache_ttl_secs: u64,

    /// Maximum number of cached reports (default: 256)
    pub report_cache_capacity: usize,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let data_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".draw-ledger");

        Config {
            data_dir,
            output_format: "human".to_string(),
            log_level: "info".to_string(),
            utc_offset_minutes: 330,
            report_cache_ttl_secs: 300,
            report_cache_capacity: 256,
        }
    }

    /// Create config with custom data directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            ..Config::new()
        }
    }

    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    /// Set output format ("human" or "json")
    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    pub fn get_log_level(&self) -> &str {
        &self.log_level
    }

    pub fn set_log_level(&mut self, level: String) {
        self.log_level = level;
    }

    /// Get state snapshot path
    pub fn get_state_path(&self) -> PathBuf {
        self.data_dir.join("state.bin")
    }

    pub fn report_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.report_cache_ttl_secs)
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `DRAW_LEDGER_DATA_DIR`: override data directory
    /// - `DRAW_LEDGER_OUTPUT_FORMAT`: "human" or "json"
    /// - `DRAW_LEDGER_LOG_LEVEL`: log level
    /// - `DRAW_LEDGER_UTC_OFFSET_MINUTES`: operator clock offset
    /// - `DRAW_LEDGER_REPORT_TTL_SECS`: report cache lifetime
    /// - `DRAW_LEDGER_REPORT_CACHE_CAPACITY`: report cache size
    ///
    /// Unparseable numeric values keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Config::new();

        if let Ok(dir) = env::var("DRAW_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(format) = env::var("DRAW_LEDGER_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(level) = env::var("DRAW_LEDGER_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(offset) = parse_env("DRAW_LEDGER_UTC_OFFSET_MINUTES") {
            config.utc_offset_minutes = offset;
        }

        if let Some(ttl) = parse_env("DRAW_LEDGER_REPORT_TTL_SECS") {
            config.report_cache_ttl_secs = ttl;
        }

        if let Some(capacity) = parse_env("DRAW_LEDGER_REPORT_CACHE_CAPACITY") {
            config.report_cache_capacity = capacity;
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.output_format, "human");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.utc_offset_minutes, 330);
        assert_eq!(config.report_cache_ttl(), Duration::from_secs(300));
        assert!(config.data_dir.ends_with(".draw-ledger"));
    }

    #[test]
    fn test_config_paths() {
        let config = Config::with_data_dir(PathBuf::from("/tmp/ledger"));
        assert_eq!(config.get_state_path(), PathBuf::from("/tmp/ledger/state.bin"));
    }

    #[test]
    fn test_config_setters() {
        let mut config = Config::new();
        config.set_output_format("json".to_string());
        assert_eq!(config.get_output_format(), "json");

        config.set_log_level("debug".to_string());
        assert_eq!(config.get_log_level(), "debug");
    }
}
