//! Configuration for serterm.
//!
//! Settings are read from `~/.serterm/config.toml`. Every key is optional;
//! a missing or unreadable file yields the defaults. The port and baud rate
//! are not part of the file and must be given on the command line.
//!
//! ```toml
//! # Diagnostic log filter (overridden by SERTERM_LOG)
//! log_level = "info"
//!
//! [serial]
//! read_timeout_ms = 1000
//! poll_interval_ms = 5
//! write_queue_depth = 64
//!
//! [send]
//! append_cr = false
//! append_lf = true
//!
//! [log]
//! enabled = false
//! path = "/tmp/serial.txt"
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::core::log_sink::LogSettings;
use crate::core::session::{SendPolicy, SessionOptions};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive for the diagnostic log
    pub log_level: String,
    /// Port timing
    pub serial: SerialConfig,
    /// Outbound line endings
    pub send: SendConfig,
    /// Traffic log
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            serial: SerialConfig::default(),
            send: SendConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Serial port timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub write_queue_depth: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            poll_interval_ms: 5,
            write_queue_depth: 64,
        }
    }
}

impl From<&SerialConfig> for SessionOptions {
    fn from(config: &SerialConfig) -> Self {
        Self {
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            write_queue_depth: config.write_queue_depth.max(1),
        }
    }
}

/// Send settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    pub append_cr: bool,
    pub append_lf: bool,
}

impl Default for SendConfig {
    fn default() -> Self {
        let policy = SendPolicy::default();
        Self {
            append_cr: policy.append_cr,
            append_lf: policy.append_lf,
        }
    }
}

impl From<&SendConfig> for SendPolicy {
    fn from(config: &SendConfig) -> Self {
        Self {
            append_cr: config.append_cr,
            append_lf: config.append_lf,
        }
    }
}

/// Traffic log settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl From<&LogConfig> for LogSettings {
    fn from(config: &LogConfig) -> Self {
        Self {
            enabled: config.enabled,
            path: config.path.clone(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    match Self::parse(&content) {
                        Ok(config) => return config,
                        Err(e) => tracing::warn!("Ignoring {}: {}", path.display(), e),
                    }
                }
            }
        }
        Self::default()
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Directory holding the config file and the diagnostic log
    pub fn data_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".serterm"))
    }

    fn get_config_path() -> Option<PathBuf> {
        Self::data_dir().map(|dir| dir.join("config.toml"))
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").expect("parse");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.serial.read_timeout_ms, 1000);
        assert!(!config.send.append_cr);
        assert!(config.send.append_lf);
        assert!(!config.log.enabled);
        assert!(config.log.path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [send]
            append_cr = true

            [log]
            enabled = true
            path = "/var/log/uart.txt"
            "#,
        )
        .expect("parse");

        let policy = SendPolicy::from(&config.send);
        assert!(policy.append_cr);
        assert!(policy.append_lf);

        let settings = LogSettings::from(&config.log);
        assert!(settings.enabled);
        assert_eq!(settings.path, Some(PathBuf::from("/var/log/uart.txt")));
    }

    #[test]
    fn test_session_options_are_clamped() {
        let config = Config::parse(
            r#"
            [serial]
            read_timeout_ms = 250
            poll_interval_ms = 0
            write_queue_depth = 0
            "#,
        )
        .expect("parse");

        let options = SessionOptions::from(&config.serial);
        assert_eq!(options.read_timeout, Duration::from_millis(250));
        assert_eq!(options.poll_interval, Duration::from_millis(1));
        assert_eq!(options.write_queue_depth, 1);
    }

    #[test]
    fn test_invalid_type_is_an_error() {
        assert!(Config::parse("[serial]\nread_timeout_ms = \"slow\"").is_err());
    }
}
