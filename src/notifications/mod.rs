//! Operator alert fan-out
//!
//! The coordinator calls [`Notifier::notify`] with a title and message; the
//! notifier fans out to every configured channel. A failure in one channel
//! never prevents attempting the others, and no failure is ever raised back
//! to the coordinator: alerting is best-effort by contract.

pub mod channels;

use crate::config::NotificationsConfig;
use tracing::{debug, error};

pub use channels::email::EmailChannel;
pub use channels::push::{PushChannel, PushConfig};
pub use channels::sms::{SmsChannel, SmsConfig};
pub use channels::{Channel, ChannelError, ChannelResult, DeliveryStatus};

/// Fan-out notifier over the configured channels
#[derive(Default)]
pub struct Notifier {
    channels: Vec<Box<dyn Channel + Send + Sync>>,
}

impl Notifier {
    /// Build a notifier from configuration; disabled channels are skipped,
    /// and a master switch disables everything
    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut notifier = Self::default();
        if !config.enabled {
            debug!("Notifications disabled");
            return notifier;
        }

        if config.email.enabled {
            match EmailChannel::new(config.email.recipients.clone()) {
                Ok(channel) => notifier.add_channel(Box::new(channel)),
                Err(e) => error!(error = %e, "Invalid email channel config, skipping"),
            }
        }

        if config.push.enabled {
            let mut push_config = PushConfig::new(config.push.api_token.clone());
            if let Some(endpoint) = &config.push.endpoint {
                push_config = push_config.with_endpoint(endpoint.clone());
            }
            match PushChannel::new(push_config) {
                Ok(channel) => notifier.add_channel(Box::new(channel)),
                Err(e) => error!(error = %e, "Invalid push channel config, skipping"),
            }
        }

        if config.sms.enabled {
            let sms_config = SmsConfig::new(
                config.sms.account_sid.clone(),
                config.sms.auth_token.clone(),
                config.sms.from.clone(),
                config.sms.recipients.clone(),
            );
            match SmsChannel::new(sms_config) {
                Ok(channel) => notifier.add_channel(Box::new(channel)),
                Err(e) => error!(error = %e, "Invalid SMS channel config, skipping"),
            }
        }

        notifier
    }

    /// Add a notification channel
    pub fn add_channel(&mut self, channel: Box<dyn Channel + Send + Sync>) {
        self.channels.push(channel);
    }

    /// Number of active channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Fan an alert out to every channel, collecting per-channel outcomes.
    /// Never fails; delivery errors are logged and recorded in the result.
    pub async fn notify(&self, title: &str, message: &str) -> Vec<DeliveryStatus> {
        debug!(title, message, "notify() called");
        let mut statuses = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let status = match channel.send(title, message).await {
                Ok(status) => status,
                Err(e) => {
                    error!(channel = channel.name(), error = %e, "Notification delivery failed");
                    DeliveryStatus::failure(channel.name(), e.to_string())
                }
            };
            if !status.success {
                error!(channel = channel.name(), status = %status, "Notification not delivered");
            }
            statuses.push(status);
        }

        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyChannel {
        name: &'static str,
        fail: bool,
        hard_error: bool,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Channel for FlakyChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, _title: &str, _message: &str) -> ChannelResult<DeliveryStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hard_error {
                return Err(ChannelError::Other("transport exploded".to_string()));
            }
            if self.fail {
                Ok(DeliveryStatus::failure(self.name, "rejected"))
            } else {
                Ok(DeliveryStatus::success(self.name))
            }
        }
    }

    #[tokio::test]
    async fn test_failure_in_one_channel_does_not_stop_others() {
        let first_calls = Arc::new(AtomicU32::new(0));
        let second_calls = Arc::new(AtomicU32::new(0));

        let mut notifier = Notifier::default();
        notifier.add_channel(Box::new(FlakyChannel {
            name: "email",
            fail: false,
            hard_error: true,
            calls: Arc::clone(&first_calls),
        }));
        notifier.add_channel(Box::new(FlakyChannel {
            name: "push",
            fail: false,
            hard_error: false,
            calls: Arc::clone(&second_calls),
        }));

        let statuses = notifier.notify("title", "message").await;
        assert_eq!(statuses.len(), 2);
        assert!(!statuses[0].success);
        assert!(statuses[1].success);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_config_builds_empty_notifier() {
        let config = NotificationsConfig::default();
        let notifier = Notifier::from_config(&config);
        assert_eq!(notifier.channel_count(), 0);
        assert!(notifier.notify("title", "message").await.is_empty());
    }

    #[tokio::test]
    async fn test_master_switch_overrides_channel_flags() {
        let mut config = NotificationsConfig::default();
        config.email.enabled = true;
        config.email.recipients = vec!["ops@example.com".to_string()];
        // Master switch stays off.
        let notifier = Notifier::from_config(&config);
        assert_eq!(notifier.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_enabled_email_channel_registered() {
        let mut config = NotificationsConfig::default();
        config.enabled = true;
        config.email.enabled = true;
        config.email.recipients = vec!["ops@example.com".to_string()];
        let notifier = Notifier::from_config(&config);
        assert_eq!(notifier.channel_count(), 1);
    }
}
