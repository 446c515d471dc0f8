//! Notification channels for delivering operator alerts
//!
//! Each delivery mechanism implements [`Channel`] with a single
//! `send(title, message)` entry point; the notifier iterates the configured
//! channels and collects per-channel outcomes.

pub mod email;
pub mod push;
pub mod sms;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Local command invocation failed
    #[error("transport command failed: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid channel configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error
    #[error("channel error: {0}")]
    Other(String),
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the notification was successfully delivered
    pub success: bool,
    /// Channel that delivered (or failed to deliver) the notification
    pub channel: String,
    /// Optional message about the delivery
    pub message: Option<String>,
    /// Timestamp of the delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Create a successful delivery status
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a failed delivery status
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.channel)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Trait for notification channels
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Deliver one alert through this channel
    async fn send(&self, title: &str, message: &str) -> ChannelResult<DeliveryStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_success() {
        let status = DeliveryStatus::success("email");
        assert!(status.success);
        assert_eq!(status.channel, "email");
        assert!(status.message.is_none());
    }

    #[test]
    fn test_delivery_status_failure() {
        let status = DeliveryStatus::failure("sms", "connection timeout");
        assert!(!status.success);
        assert_eq!(status.message, Some("connection timeout".to_string()));
    }

    #[test]
    fn test_delivery_status_display() {
        let success = DeliveryStatus::success("push");
        assert!(success.to_string().contains("SUCCESS"));

        let failure = DeliveryStatus::failure("email", "mail transport missing");
        assert!(failure.to_string().contains("FAILED"));
        assert!(failure.to_string().contains("mail transport missing"));
    }
}
