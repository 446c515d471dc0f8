//! Push notification channel
//!
//! Sends alerts as "note" pushes via an HTTP API compatible with the
//! Pushbullet v2 pushes endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};

const DEFAULT_ENDPOINT: &str = "https://api.pushbullet.com/v2/pushes";

/// Push channel configuration
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// API access token
    pub api_token: String,
    /// Pushes endpoint
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl PushConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
        }
    }

    /// Override the pushes endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_token.is_empty() {
            return Err("push API token cannot be empty".to_string());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err("push endpoint must start with http:// or https://".to_string());
        }
        Ok(())
    }
}

/// Push notification channel
pub struct PushChannel {
    config: PushConfig,
    client: Client,
}

impl PushChannel {
    pub fn new(config: PushConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn build_payload(&self, title: &str, message: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "note",
            "title": title,
            "body": message,
        })
    }
}

#[async_trait]
impl Channel for PushChannel {
    fn name(&self) -> &str {
        "push"
    }

    async fn send(&self, title: &str, message: &str) -> ChannelResult<DeliveryStatus> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Access-Token", &self.config.api_token)
            .json(&self.build_payload(title, message))
            .send()
            .await?;

        if response.status().is_success() {
            debug!(title, "Push notification sent");
            Ok(DeliveryStatus::success("push"))
        } else {
            let status = response.status();
            Ok(DeliveryStatus::failure(
                "push",
                format!("HTTP {status} from push API"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(PushConfig::new("o.token").validate().is_ok());
        assert!(PushConfig::new("").validate().is_err());

        let bad_endpoint = PushConfig::new("o.token").with_endpoint("not-a-url");
        assert!(bad_endpoint.validate().is_err());
    }

    #[test]
    fn test_payload_is_a_note() {
        let channel = PushChannel::new(PushConfig::new("o.token")).unwrap();
        let payload = channel.build_payload("NAS OFFLINE", "nas01 cannot be reached");
        assert_eq!(payload["type"], "note");
        assert_eq!(payload["title"], "NAS OFFLINE");
        assert_eq!(payload["body"], "nas01 cannot be reached");
    }

    #[tokio::test]
    async fn test_send_reports_api_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v2/pushes")
            .with_status(401)
            .create_async()
            .await;

        let config =
            PushConfig::new("o.bad-token").with_endpoint(format!("{}/v2/pushes", server.url()));
        let channel = PushChannel::new(config).unwrap();

        let status = channel.send("title", "message").await.unwrap();
        assert!(!status.success);
        assert!(status.message.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn test_send_succeeds_against_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/pushes")
            .match_header("Access-Token", "o.token")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let config =
            PushConfig::new("o.token").with_endpoint(format!("{}/v2/pushes", server.url()));
        let channel = PushChannel::new(config).unwrap();

        let status = channel.send("title", "message").await.unwrap();
        assert!(status.success);
        mock.assert_async().await;
    }
}
