//! Configuration management for the plot transfer coordinator
//!
//! This module handles loading and validating configuration from a TOML file,
//! covering the staging directory, the configured harvesters, the transfer
//! lock paths, the metrics endpoint and the notification channels.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default minimum plot size in bytes, based on the K32 plot size.
/// Anything at or below this is treated as partially written.
pub const DEFAULT_MIN_PLOT_BYTES: u64 = 108_644_374_730;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Staging directory configuration
    pub staging: StagingConfig,

    /// Transfer and lock configuration
    pub transfer: TransferConfig,

    /// Configured harvesters
    pub harvesters: HarvestersConfig,

    /// Metrics service (live throughput) configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Capacity warning configuration
    #[serde(default)]
    pub capacity: CapacityConfig,

    /// Whole-job retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Notification channel configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Staging directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory scanned for finished plots
    pub dir: PathBuf,

    /// Filename pattern a plot must match
    #[serde(default = "default_plot_pattern")]
    pub pattern: String,

    /// Minimum qualifying size in bytes
    #[serde(default = "default_min_plot_bytes")]
    pub min_plot_bytes: u64,
}

fn default_plot_pattern() -> String {
    r"\.plot$".to_string()
}

fn default_min_plot_bytes() -> u64 {
    DEFAULT_MIN_PLOT_BYTES
}

/// Transfer and lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// External transfer program, invoked with (source path, file name, host)
    pub program: PathBuf,

    /// Process name of the local transfer tool, matched case-insensitively
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Network interface carrying the transfer traffic
    pub network_interface: String,

    /// Throughput below or at this value means "no meaningful traffic"
    #[serde(default = "default_min_throughput")]
    pub min_throughput: f64,

    /// Local lock marker file
    #[serde(default = "default_local_marker")]
    pub local_marker: PathBuf,

    /// Remote lock marker path on the selected harvester
    #[serde(default = "default_remote_marker")]
    pub remote_marker: String,

    /// Remote command that terminates leftover receiver processes
    #[serde(default = "default_cleanup_command")]
    pub remote_cleanup_command: String,

    /// Remote marker touched after a verified transfer
    #[serde(default = "default_received_marker")]
    pub remote_received_marker: String,

    /// Select but do not transfer
    #[serde(default)]
    pub dry_run: bool,
}

fn default_process_name() -> String {
    "nc".to_string()
}

fn default_min_throughput() -> f64 {
    5.0
}

fn default_local_marker() -> PathBuf {
    PathBuf::from("transfer_job_running")
}

fn default_remote_marker() -> String {
    "remote_transfer_is_active".to_string()
}

fn default_cleanup_command() -> String {
    "pkill -x nc".to_string()
}

fn default_received_marker() -> String {
    "new_plot_received".to_string()
}

/// Configured harvesters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestersConfig {
    /// Host identifiers of every configured harvester
    pub hosts: Vec<String>,

    /// Local directory where fetched snapshots are cached, keyed by host
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Remote directory holding each harvester's export document
    #[serde(default = "default_remote_export_dir")]
    pub remote_export_dir: String,

    /// Ping probe attempts per liveness check
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("export")
}

fn default_remote_export_dir() -> String {
    "export".to_string()
}

fn default_probe_attempts() -> u32 {
    2
}

fn default_probe_timeout() -> u64 {
    1
}

impl HarvestersConfig {
    /// Local cache path for a host's snapshot
    pub fn export_path(&self, host: &str) -> PathBuf {
        self.export_dir.join(format!("{host}_export.json"))
    }

    /// Remote path of a host's snapshot document
    pub fn remote_export_path(&self, host: &str) -> String {
        format!(
            "{}/{host}_export.json",
            self.remote_export_dir.trim_end_matches('/')
        )
    }
}

/// Metrics service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Base URL of the local metrics service
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_metrics_timeout")]
    pub timeout_secs: u64,
}

fn default_metrics_timeout() -> u64 {
    5
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:61208".to_string(),
            timeout_secs: default_metrics_timeout(),
        }
    }
}

/// Capacity warning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Warn when staging disk utilization meets or exceeds this percent
    pub warning_percent: u8,

    /// Sentinel file latching "warning already sent"
    #[serde(default = "default_latch_file")]
    pub latch_file: PathBuf,
}

fn default_latch_file() -> PathBuf {
    PathBuf::from("capacity_alert_sent")
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            warning_percent: 95,
            latch_file: default_latch_file(),
        }
    }
}

/// Whole-job retry policy for verification mismatches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum whole-job attempts
    pub max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Delay before a given attempt (1-based) using exponential backoff
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponential = self.base_delay_ms.saturating_mul(1 << (attempt - 2).min(20));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }
}

/// Notification channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationsConfig {
    /// Master switch for all channels
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub sms: SmsConfig,
}

/// Email notifications via the local mail transport
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Recipient addresses
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Push notifications via an HTTP note API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PushConfig {
    #[serde(default)]
    pub enabled: bool,

    /// API access token
    #[serde(default)]
    pub api_token: String,

    /// Override the push API endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// SMS notifications via a Twilio-compatible REST API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub account_sid: String,

    #[serde(default)]
    pub auth_token: String,

    /// Sender number
    #[serde(default)]
    pub from: String,

    /// Recipient numbers
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.harvesters.hosts.is_empty() {
            anyhow::bail!("at least one harvester host must be configured");
        }

        if self.staging.min_plot_bytes == 0 {
            anyhow::bail!("staging.min_plot_bytes must be greater than 0");
        }

        regex::Regex::new(&self.staging.pattern)
            .with_context(|| format!("invalid staging.pattern: {}", self.staging.pattern))?;

        if self.transfer.network_interface.is_empty() {
            anyhow::bail!("transfer.network_interface must be set");
        }

        if self.transfer.min_throughput < 0.0 {
            anyhow::bail!("transfer.min_throughput must not be negative");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be greater than 0");
        }

        if self.capacity.warning_percent == 0 || self.capacity.warning_percent > 100 {
            anyhow::bail!("capacity.warning_percent must be between 1 and 100");
        }

        Ok(())
    }

    /// Get the liveness probe timeout as a Duration
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.harvesters.probe_timeout_secs)
    }

    /// Get the metrics request timeout as a Duration
    #[must_use]
    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics.timeout_secs)
    }
}
