//! Configuration structures for scanx.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags.

use serde::{Deserialize, Serialize};

/// Default capacity of an entry exchange, also the pooling key.
pub const DEFAULT_SCAN_CAP: i64 = 512;

/// Largest scan capacity accepted from configuration.
pub const MAX_SCAN_CAP: i64 = 1 << 20;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Scan exchange configuration
    #[serde(default)]
    pub scan: ScanConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Scan exchange configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Standard exchange capacity (non-positive selects the default)
    #[serde(default = "default_scan_cap")]
    pub scan_cap: i64,

    /// Maximum number of idle backing buffers kept by the pool
    #[serde(default = "default_max_pooled_buffers")]
    pub max_pooled_buffers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_cap: default_scan_cap(),
            max_pooled_buffers: default_max_pooled_buffers(),
        }
    }
}

/// Monitoring configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Directive understood by an env filter.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Plain text format
    Text,
}

fn default_scan_cap() -> i64 {
    DEFAULT_SCAN_CAP
}
fn default_max_pooled_buffers() -> usize {
    64
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.scan.scan_cap > MAX_SCAN_CAP {
            return Err(crate::Error::Config(format!(
                "Scan cap {} exceeds maximum {}",
                self.scan.scan_cap, MAX_SCAN_CAP
            )));
        }

        if self.scan.scan_cap <= 0 {
            tracing::warn!(
                scan_cap = self.scan.scan_cap,
                default = DEFAULT_SCAN_CAP,
                "Non-positive scan cap, using default"
            );
        }

        if self.scan.max_pooled_buffers == 0 {
            tracing::warn!("Buffer pooling disabled, every scan allocates its own buffer");
        }

        Ok(())
    }
}
