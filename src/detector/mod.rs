//! Stuck-transfer classification
//!
//! Cross-references "is the transfer process alive" against "is there live
//! throughput on the transfer interface" to distinguish a healthy in-flight
//! transfer from a hung one. Process presence is checked first; the
//! throughput query only runs when a process is actually alive, and fails
//! closed when the metrics service is unreachable.

use crate::error::Result;
use crate::liveness::ProcessScanner;
use crate::throughput::ThroughputSource;
use tracing::{debug, warn};

/// Observable state of the transfer machinery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferActivity {
    /// No transfer process running; a held lock is stale
    Clear,
    /// Process alive and traffic flowing; caller must wait
    InProgress,
    /// Process alive but no meaningful traffic; presumed stuck
    Zombie,
}

impl TransferActivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::InProgress => "in-progress",
            Self::Zombie => "zombie",
        }
    }
}

impl std::fmt::Display for TransferActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies the current transfer state
pub struct StuckTransferDetector {
    process_name: String,
    interface: String,
    min_throughput: f64,
    scanner: Box<dyn ProcessScanner>,
    throughput: Box<dyn ThroughputSource>,
}

impl StuckTransferDetector {
    pub fn new(
        process_name: impl Into<String>,
        interface: impl Into<String>,
        min_throughput: f64,
        scanner: Box<dyn ProcessScanner>,
        throughput: Box<dyn ThroughputSource>,
    ) -> Self {
        Self {
            process_name: process_name.into(),
            interface: interface.into(),
            min_throughput,
            scanner,
            throughput,
        }
    }

    /// Classify the transfer state
    ///
    /// Rate at or below the minimum counts as "no meaningful traffic".
    pub async fn classify(&self) -> Result<TransferActivity> {
        if !self.scanner.is_running(&self.process_name) {
            debug!(
                process = %self.process_name,
                "Transfer process not running, no transfer active"
            );
            return Ok(TransferActivity::Clear);
        }

        let rate = self.throughput.tx_rate(&self.interface).await?;
        if rate > self.min_throughput {
            debug!(
                process = %self.process_name,
                rate,
                "Transfer process running with live traffic"
            );
            Ok(TransferActivity::InProgress)
        } else {
            warn!(
                process = %self.process_name,
                rate,
                min = self.min_throughput,
                "Transfer process running but no network traffic"
            );
            Ok(TransferActivity::Zombie)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;

    struct FixedScanner(bool);

    impl ProcessScanner for FixedScanner {
        fn is_running(&self, _name: &str) -> bool {
            self.0
        }
    }

    struct FixedRate(Option<f64>);

    #[async_trait]
    impl ThroughputSource for FixedRate {
        async fn tx_rate(&self, _interface: &str) -> Result<f64> {
            self.0.ok_or(Error::MetricsUnavailable {
                reason: "connection refused".to_string(),
            })
        }
    }

    fn detector(running: bool, rate: Option<f64>) -> StuckTransferDetector {
        StuckTransferDetector::new(
            "nc",
            "eth10",
            5.0,
            Box::new(FixedScanner(running)),
            Box::new(FixedRate(rate)),
        )
    }

    #[tokio::test]
    async fn test_running_with_traffic_is_in_progress() {
        let classification = detector(true, Some(50.0)).classify().await.unwrap();
        assert_eq!(classification, TransferActivity::InProgress);
    }

    #[tokio::test]
    async fn test_running_without_traffic_is_zombie() {
        let classification = detector(true, Some(0.0)).classify().await.unwrap();
        assert_eq!(classification, TransferActivity::Zombie);

        // The threshold itself still counts as silent.
        let classification = detector(true, Some(5.0)).classify().await.unwrap();
        assert_eq!(classification, TransferActivity::Zombie);
    }

    #[tokio::test]
    async fn test_not_running_is_clear_regardless_of_rate() {
        let classification = detector(false, Some(50.0)).classify().await.unwrap();
        assert_eq!(classification, TransferActivity::Clear);

        // Throughput is not even queried when nothing runs.
        let classification = detector(false, None).classify().await.unwrap();
        assert_eq!(classification, TransferActivity::Clear);
    }

    #[tokio::test]
    async fn test_metrics_outage_fails_closed_while_running() {
        let result = detector(true, None).classify().await;
        assert!(matches!(result, Err(Error::MetricsUnavailable { .. })));
    }
}
