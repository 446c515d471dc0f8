//! Live interface throughput from the metrics service
//!
//! The producer host runs a local metrics service exposing per-interface
//! transmit counters as JSON. The stuck-transfer detector uses the transmit
//! rate on the transfer interface to tell a healthy transfer from a hung
//! one, so this query fails closed: if the service cannot be reached there
//! is no safe answer, and the error is fatal for the current invocation.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Source of live transmit rates per network interface
#[async_trait]
pub trait ThroughputSource: Send + Sync {
    /// Current transmit rate on the interface, in MB-scale units
    async fn tx_rate(&self, interface: &str) -> Result<f64>;
}

/// HTTP client for a glances-style metrics API
pub struct MetricsClient {
    endpoint: String,
    client: Client,
}

impl MetricsClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::MetricsUnavailable {
                reason: format!("cannot build HTTP client: {e}"),
            }
        })?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    fn unavailable(reason: impl Into<String>) -> Error {
        Error::MetricsUnavailable {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ThroughputSource for MetricsClient {
    async fn tx_rate(&self, interface: &str) -> Result<f64> {
        let url = format!(
            "{}/api/3/network/interface_name/{interface}",
            self.endpoint.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::unavailable(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::unavailable(format!(
                "GET {url}: HTTP {}",
                response.status()
            )));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::unavailable(format!("invalid metrics payload: {e}")))?;

        let tx = data
            .get(interface)
            .and_then(|samples| samples.as_array())
            .and_then(|samples| samples.first())
            .and_then(|sample| sample.get("tx"))
            .and_then(|tx| tx.as_f64())
            .ok_or_else(|| {
                Self::unavailable(format!("no tx counter for interface {interface}"))
            })?;

        let rate = tx / 1_000_000.0;
        debug!(interface, rate, "Current transmit rate");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> MetricsClient {
        MetricsClient::new(server.url(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_tx_rate_parses_interface_sample() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/3/network/interface_name/eth10")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"eth10": [{"interface_name": "eth10", "tx": 12000000, "rx": 400}]}"#)
            .create_async()
            .await;

        let rate = client_for(&server).tx_rate("eth10").await.unwrap();
        assert!((rate - 12.0).abs() < f64::EPSILON);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_interface_fails_closed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/3/network/interface_name/eth10")
            .with_status(200)
            .with_body(r#"{"eth0": [{"tx": 5}]}"#)
            .create_async()
            .await;

        let result = client_for(&server).tx_rate("eth10").await;
        assert!(matches!(result, Err(Error::MetricsUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_http_error_fails_closed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/3/network/interface_name/eth10")
            .with_status(500)
            .create_async()
            .await;

        let result = client_for(&server).tx_rate("eth10").await;
        assert!(matches!(result, Err(Error::MetricsUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_service_fails_closed() {
        // Nothing listens on this port.
        let client =
            MetricsClient::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        let result = client.tx_rate("eth10").await;
        assert!(matches!(result, Err(Error::MetricsUnavailable { .. })));
    }
}
