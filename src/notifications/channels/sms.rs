//! SMS notification channel
//!
//! Sends alerts through a Twilio-compatible REST API, one message per
//! configured recipient number.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};

/// SMS channel configuration
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number
    pub from: String,
    /// Recipient numbers
    pub recipients: Vec<String>,
    /// API base URL
    pub api_base: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SmsConfig {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from: from.into(),
            recipients,
            api_base: "https://api.twilio.com".to_string(),
            timeout_secs: 10,
        }
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            return Err("SMS account credentials cannot be empty".to_string());
        }
        if self.from.is_empty() {
            return Err("SMS sender number cannot be empty".to_string());
        }
        if self.recipients.is_empty() {
            return Err("SMS channel needs at least one recipient".to_string());
        }
        Ok(())
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

/// SMS notification channel
pub struct SmsChannel {
    config: SmsConfig,
    client: Client,
}

impl SmsChannel {
    pub fn new(config: SmsConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    async fn send_one(&self, to: &str, body: &str) -> ChannelResult<()> {
        let params = [("To", to), ("From", self.config.from.as_str()), ("Body", body)];

        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(to, "SMS notification sent");
            Ok(())
        } else {
            Err(ChannelError::Other(format!(
                "HTTP {} from SMS API for {to}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl Channel for SmsChannel {
    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, _title: &str, message: &str) -> ChannelResult<DeliveryStatus> {
        let mut failures = Vec::new();
        for recipient in &self.config.recipients {
            if let Err(e) = self.send_one(recipient, message).await {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(DeliveryStatus::success("sms"))
        } else {
            Ok(DeliveryStatus::failure("sms", failures.join("; ")))
        }
    }
}
