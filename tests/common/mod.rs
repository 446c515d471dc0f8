//! Shared mocks and fixtures for integration tests

use async_trait::async_trait;
use plotferry::config::Config;
use plotferry::error::{Error, Result};
use plotferry::liveness::{HostProbe, ProcessScanner};
use plotferry::models::HarvesterSnapshot;
use plotferry::notifications::{Channel, ChannelResult, DeliveryStatus};
use plotferry::oracle::SnapshotSource;
use plotferry::remote::{CommandOutput, RemoteShell};
use plotferry::throughput::ThroughputSource;
use plotferry::transfer::TransferProgram;
use plotferry::Plot;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Probe answering from a fixed set of live hosts
pub struct StaticProbe {
    alive: Vec<String>,
}

impl StaticProbe {
    pub fn new(alive: &[&str]) -> Self {
        Self {
            alive: alive.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[async_trait]
impl HostProbe for StaticProbe {
    async fn is_alive(&self, host: &str) -> bool {
        self.alive.iter().any(|h| h == host)
    }
}

/// Snapshot source answering from canned export documents
pub struct StaticSource {
    snapshots: HashMap<String, HarvesterSnapshot>,
}

impl StaticSource {
    pub fn new(snapshots: Vec<HarvesterSnapshot>) -> Self {
        Self {
            snapshots: snapshots
                .into_iter()
                .map(|s| (s.server.clone(), s))
                .collect(),
        }
    }
}

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn fetch(&self, host: &str) -> Result<HarvesterSnapshot> {
        self.snapshots
            .get(host)
            .cloned()
            .ok_or_else(|| Error::TransferUnreachable {
                host: host.to_string(),
                reason: "no export".to_string(),
            })
    }
}

pub fn snapshot(server: &str, capacity: u64) -> HarvesterSnapshot {
    HarvesterSnapshot {
        server: server.to_string(),
        total_plots_until_full: capacity,
        current_plot_drive: format!("/mnt/{server}/drive0"),
    }
}

/// Fixed process-table answer
pub struct FixedScanner(pub bool);

impl ProcessScanner for FixedScanner {
    fn is_running(&self, _name: &str) -> bool {
        self.0
    }
}

/// Fixed throughput answer; None means the metrics service is down
pub struct FixedRate(pub Option<f64>);

#[async_trait]
impl ThroughputSource for FixedRate {
    async fn tx_rate(&self, _interface: &str) -> Result<f64> {
        self.0.ok_or(Error::MetricsUnavailable {
            reason: "connection refused".to_string(),
        })
    }
}

/// Remote shell with canned size answers and a full command log
#[derive(Default)]
pub struct ScriptedShell {
    sizes: HashMap<String, u64>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the size query for a remote path
    pub fn with_size(mut self, path: &str, size: u64) -> Self {
        self.sizes.insert(path.to_string(), size);
        self
    }

    /// Handle to the recorded command log
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.commands)
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn run(&self, _host: &str, command: &str) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());

        if let Some(path) = command
            .strip_prefix("ls -al ")
            .and_then(|rest| rest.split(" |").next())
        {
            return Ok(match self.sizes.get(path) {
                Some(size) => CommandOutput {
                    status: Some(0),
                    stdout: format!("{size}\n"),
                    stderr: String::new(),
                },
                None => CommandOutput {
                    status: Some(2),
                    stdout: String::new(),
                    stderr: format!("ls: cannot access '{path}': No such file or directory"),
                },
            });
        }

        Ok(CommandOutput {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Transfer program stub with a fixed exit status and a call counter
pub struct FakeProgram {
    exit: i32,
    calls: Arc<AtomicU32>,
}

impl FakeProgram {
    pub fn succeeding() -> Self {
        Self {
            exit: 0,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing(exit: i32) -> Self {
        Self {
            exit,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl TransferProgram for FakeProgram {
    async fn send(&self, _plot: &Plot, _host: &str) -> Result<CommandOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CommandOutput {
            status: Some(self.exit),
            stdout: String::new(),
            stderr: if self.exit == 0 {
                String::new()
            } else {
                "stream copy failed".to_string()
            },
        })
    }
}

/// Notification channel recording every (title, message) pair
pub struct RecordingChannel {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingChannel {
    pub fn new() -> (Self, Arc<Mutex<Vec<(String, String)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, title: &str, message: &str) -> ChannelResult<DeliveryStatus> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        Ok(DeliveryStatus::success("recording"))
    }
}

/// Config rooted in a test directory, with fast retries and quiet checks
pub fn test_config(root: &Path, hosts: &[&str], max_attempts: u32) -> Config {
    let raw = format!(
        r#"
        [staging]
        dir = "{staging}"
        min_plot_bytes = 1024

        [transfer]
        program = "/usr/local/bin/send_plot.sh"
        network_interface = "eth10"
        local_marker = "{marker}"

        [harvesters]
        hosts = [{hosts}]

        [capacity]
        warning_percent = 100
        latch_file = "{latch}"

        [retry]
        max_attempts = {max_attempts}
        base_delay_ms = 1
        max_delay_ms = 2
        "#,
        staging = root.join("staging").display(),
        marker = root.join("transfer_job_running").display(),
        latch = root.join("capacity_alert_sent").display(),
        hosts = hosts
            .iter()
            .map(|h| format!("\"{h}\""))
            .collect::<Vec<_>>()
            .join(", "),
    );
    let config: Config = toml::from_str(&raw).unwrap();
    std::fs::create_dir_all(root.join("staging")).unwrap();
    config
}
