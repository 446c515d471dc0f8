//! Host reachability and local process checks
//!
//! Two small capabilities behind traits so the coordinator can be exercised
//! without a network or a live process table: [`HostProbe`] answers "does
//! this host respond to a ping", [`ProcessScanner`] answers "is a process
//! with this name running locally".

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

/// Network reachability probe
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// True iff the host answered at least one probe packet
    async fn is_alive(&self, host: &str) -> bool;
}

/// ICMP probe via the system `ping` binary
///
/// Never blocks longer than `timeout × attempts`; ping enforces the
/// per-packet deadline itself.
pub struct PingProbe {
    attempts: u32,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(attempts: u32, timeout: Duration) -> Self {
        Self { attempts, timeout }
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

#[async_trait]
impl HostProbe for PingProbe {
    async fn is_alive(&self, host: &str) -> bool {
        let status = tokio::process::Command::new("ping")
            .arg("-W")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg("-q")
            .arg("-c")
            .arg(self.attempts.to_string())
            .arg(host)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(host, error = %e, "ping invocation failed");
                false
            }
        }
    }
}

/// Local process table lookup
pub trait ProcessScanner: Send + Sync {
    /// True iff any running process matches `name` case-insensitively
    fn is_running(&self, name: &str) -> bool;
}

/// Process scan over the live system table
///
/// Processes that disappear mid-enumeration or that we lack permission to
/// inspect simply do not match; the scan itself never fails.
#[derive(Default)]
pub struct SystemScanner;

impl ProcessScanner for SystemScanner {
    fn is_running(&self, name: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        system
            .processes()
            .values()
            .any(|process| process.name().eq_ignore_ascii_case(name))
    }
}
