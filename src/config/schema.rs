//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for log routing.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::event::Level;
use crate::lifecycle::executor::{DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_CONCURRENT_FLUSHES};
use crate::routing::DEFAULT_IDLE_TIMEOUT;
use crate::sink::rolling::{DEFAULT_MAX_ARCHIVES, DEFAULT_MAX_FILE_SIZE};

/// Root configuration for the log router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LogRoutingConfig {
    /// Minimum level routed to any destination.
    pub root_level: Level,

    /// Local file destinations.
    pub local: LocalConfig,

    /// Context entries each router is keyed by.
    pub routes: RouteKeysConfig,

    /// Sifting router behavior.
    pub router: RouterConfig,

    /// Remote (cloud) destinations.
    pub remote: RemoteConfig,

    /// Startup and shutdown behavior.
    pub lifecycle: LifecycleConfig,

    /// Object store backing the remote destinations.
    pub storage: StorageConfig,
}

/// Local file destination configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalConfig {
    /// File created under a routing key directory.
    pub file_name: String,

    /// Size at which the application log rotates. Accepts bytes or `"100MB"`.
    pub max_file_size: ByteSize,

    /// Number of compressed archives kept per key.
    pub max_archive_windows: u32,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            file_name: "app.log".to_string(),
            max_file_size: ByteSize(DEFAULT_MAX_FILE_SIZE),
            max_archive_windows: DEFAULT_MAX_ARCHIVES,
        }
    }
}

/// Routing key name per destination.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteKeysConfig {
    pub local_application: String,
    pub local_job: String,
    pub cloud_application: String,
    pub cloud_job: String,
}

impl Default for RouteKeysConfig {
    fn default() -> Self {
        Self {
            local_application: "workspace_app_root".to_string(),
            local_job: "job_log_path".to_string(),
            cloud_application: "cloud_workspace_app_root".to_string(),
            cloud_job: "cloud_job_log_path".to_string(),
        }
    }
}

impl RouteKeysConfig {
    /// `(field, key name)` pairs, in destination order.
    pub fn named(&self) -> [(&'static str, &str); 4] {
        [
            ("local_application", &self.local_application),
            ("local_job", &self.local_job),
            ("cloud_application", &self.cloud_application),
            ("cloud_job", &self.cloud_job),
        ]
    }
}

/// Sifting router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Minutes a sink may stay unused before it is closed.
    pub idle_timeout_minutes: u64,

    /// Seconds between reaper passes. Derived from the idle timeout when unset.
    pub reap_interval_secs: Option<u64>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: DEFAULT_IDLE_TIMEOUT.as_secs() / 60,
            reap_interval_secs: None,
        }
    }
}

impl RouterConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_minutes.saturating_mul(60))
    }
}

/// Remote destination configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Build the cloud routers.
    pub enabled: bool,

    /// Seconds between background flushes.
    pub flush_interval_secs: u64,

    /// Flushes allowed to run at once across all keys.
    pub max_concurrent_flushes: usize,

    /// Retry settings for one batch upload.
    pub retry: RetryConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL.as_secs(),
            max_concurrent_flushes: DEFAULT_MAX_CONCURRENT_FLUSHES,
            retry: RetryConfig::default(),
        }
    }
}

impl RemoteConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

/// Encoding used by every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    #[default]
    Line,
    Json,
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound on the shutdown drain, in seconds.
    pub shutdown_grace_secs: u64,

    /// Echo every event to stdout.
    pub platform_console: bool,

    pub encoder: EncoderKind,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 30,
            platform_console: true,
            encoder: EncoderKind::Line,
        }
    }
}

impl LifecycleConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Object store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the local directory store.
    pub root_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: "./log-storage".to_string(),
        }
    }
}

/// A byte count, written either as an integer or as `"<n><unit>"` with
/// unit `B`, `KB`, `MB` or `GB` (powers of 1024).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid byte size {s:?}"))?;
        let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "KB" => 1024,
            "MB" => 1024 * 1024,
            "GB" => 1024 * 1024 * 1024,
            other => return Err(format!("unknown size unit {other:?} in {s:?}")),
        };
        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| format!("byte size {s:?} overflows"))
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bytes(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_parsing() {
        assert_eq!("100MB".parse::<ByteSize>().unwrap(), ByteSize(100 * 1024 * 1024));
        assert_eq!("512".parse::<ByteSize>().unwrap(), ByteSize(512));
        assert_eq!("4 kb".parse::<ByteSize>().unwrap(), ByteSize(4096));
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("10TB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: LogRoutingConfig = toml::from_str("root_level = \"DEBUG\"").unwrap();
        assert_eq!(config.root_level, Level::Debug);
        assert_eq!(config.local.file_name, "app.log");
        assert_eq!(config.local.max_file_size.bytes(), 100 * 1024 * 1024);
        assert_eq!(config.router.idle_timeout(), Duration::from_secs(15 * 60));
        assert!(!config.remote.enabled);
    }

    #[test]
    fn test_file_size_accepts_both_forms() {
        let text: LogRoutingConfig = toml::from_str("[local]\nmax_file_size = \"2MB\"").unwrap();
        let number: LogRoutingConfig = toml::from_str("[local]\nmax_file_size = 2097152").unwrap();
        assert_eq!(text.local.max_file_size, number.local.max_file_size);
    }
}
