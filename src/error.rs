//! Unified error handling for the plotferry crate
//!
//! A single [`Error`] enum covers every fault the coordinator can hit, from
//! "no harvester answered a ping" down to "the remote size query came back
//! garbled". [`ErrorCategory`] classifies errors for handling strategies and
//! `is_recoverable()` tells the caller whether retrying the whole job can
//! help.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (probes, HTTP, remote sessions)
    Network,
    /// Harvester capacity and selection errors
    Capacity,
    /// Transfer lock state errors
    Lock,
    /// External transfer program errors
    Transfer,
    /// Post-transfer verification errors
    Verification,
    /// Configuration and validation errors
    Config,
    /// Local filesystem errors
    Storage,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Capacity => "capacity",
            Self::Lock => "lock",
            Self::Transfer => "transfer",
            Self::Verification => "verification",
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the plotferry crate
#[derive(Error, Debug)]
pub enum Error {
    /// No configured harvester answered a liveness probe
    #[error("no live harvester available out of {configured} configured")]
    NoHarvesterAvailable { configured: usize },

    /// A harvester's capacity snapshot could not be fetched
    #[error("cannot fetch capacity snapshot from {host}: {reason}")]
    TransferUnreachable { host: String, reason: String },

    /// The local lock marker already exists
    #[error("transfer lock already held: {marker}")]
    LockAlreadyHeld { marker: PathBuf },

    /// Lock held but the transfer process is dead or silent
    #[error("zombie transfer detected on interface {interface}")]
    ZombieLock { interface: String },

    /// Transferred byte size disagrees with the source
    #[error("size mismatch for {plot}: local {local} bytes, remote {remote} bytes")]
    VerificationMismatch {
        plot: String,
        local: u64,
        remote: u64,
    },

    /// External transfer program returned non-zero
    #[error("transfer program exited with {status:?}: {stderr}")]
    TransferProcessFailure {
        status: Option<i32>,
        stderr: String,
    },

    /// A remote command invocation failed
    #[error("remote command on {host} failed: {reason}")]
    RemoteCommandFailure { host: String, reason: String },

    /// The metrics service could not be queried (fail closed)
    #[error("throughput metrics unavailable: {reason}")]
    MetricsUnavailable { reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a remote command failure
    pub fn remote(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoteCommandFailure {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error can be addressed by retrying the whole job
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NoHarvesterAvailable { .. } => false,
            Self::TransferUnreachable { .. } => true,
            Self::LockAlreadyHeld { .. } => false,
            Self::ZombieLock { .. } => true,
            Self::VerificationMismatch { .. } => true,
            Self::TransferProcessFailure { .. } => false,
            Self::RemoteCommandFailure { .. } => false,
            Self::MetricsUnavailable { .. } => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Http(_) => true,
            Self::Config(_) => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoHarvesterAvailable { .. } | Self::TransferUnreachable { .. } => {
                ErrorCategory::Capacity
            }
            Self::LockAlreadyHeld { .. } | Self::ZombieLock { .. } => ErrorCategory::Lock,
            Self::VerificationMismatch { .. } => ErrorCategory::Verification,
            Self::TransferProcessFailure { .. } => ErrorCategory::Transfer,
            Self::RemoteCommandFailure { .. }
            | Self::MetricsUnavailable { .. }
            | Self::Http(_) => ErrorCategory::Network,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Other,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err = Error::NoHarvesterAvailable { configured: 2 };
        assert_eq!(err.category(), ErrorCategory::Capacity);

        let err = Error::VerificationMismatch {
            plot: "plot-a.plot".to_string(),
            local: 10,
            remote: 9,
        };
        assert_eq!(err.category(), ErrorCategory::Verification);

        let err = Error::config("bad threshold");
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_is_recoverable() {
        let mismatch = Error::VerificationMismatch {
            plot: "plot-a.plot".to_string(),
            local: 10,
            remote: 9,
        };
        assert!(mismatch.is_recoverable());

        let held = Error::LockAlreadyHeld {
            marker: PathBuf::from("/tmp/transfer_job_running"),
        };
        assert!(!held.is_recoverable());

        let metrics = Error::MetricsUnavailable {
            reason: "connection refused".to_string(),
        };
        assert!(!metrics.is_recoverable());
    }

    #[test]
    fn test_remote_helper() {
        let err = Error::remote("nas01", "exit status 255");
        assert!(matches!(err, Error::RemoteCommandFailure { .. }));
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.to_string().contains("nas01"));
    }

    #[test]
    fn test_category_as_str() {
        assert_eq!(ErrorCategory::Lock.as_str(), "lock");
        assert_eq!(ErrorCategory::Verification.as_str(), "verification");
    }
}
