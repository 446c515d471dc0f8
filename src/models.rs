// Core data structures for the plot transfer coordinator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A finished plot waiting in the staging directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plot {
    /// File name, e.g. `plot-k32-....plot`
    pub name: String,
    /// Absolute path in the staging directory
    pub path: PathBuf,
    /// Size in bytes at discovery time
    pub bytes: u64,
}

impl Plot {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, bytes: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            bytes,
        }
    }
}

/// Capacity snapshot exported by a harvester
///
/// Small JSON document produced by the harvester-side drive manager and
/// fetched over SFTP. `current_plot_drive` is the mount the harvester wants
/// the next plot written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvesterSnapshot {
    /// Host identifier as the harvester reports itself
    pub server: String,
    /// Remaining capacity, measured in plots
    pub total_plots_until_full: u64,
    /// Destination mount for the next incoming plot
    pub current_plot_drive: String,
}

/// A remote storage target, ranked by remaining capacity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Harvester {
    /// Host identifier
    pub host: String,
    /// Destination mount path for incoming plots
    pub mount: String,
    /// Remaining capacity in plots
    pub plots_until_full: u64,
}

impl Harvester {
    pub fn from_snapshot(snapshot: &HarvesterSnapshot) -> Self {
        Self {
            host: snapshot.server.clone(),
            mount: snapshot.current_plot_drive.clone(),
            plots_until_full: snapshot.total_plots_until_full,
        }
    }

    /// Remote path the plot will land at
    pub fn destination(&self, plot_name: &str) -> String {
        format!("{}/{}", self.mount.trim_end_matches('/'), plot_name)
    }
}

/// Status of a transfer job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// No transfer bound yet
    Idle,
    /// Both lock markers created
    Locked,
    /// External transfer program running
    Transferring,
    /// Remote size comparison in progress
    Verifying,
    /// Verified and source removed
    Done,
    /// Verification mismatch, job will be retried from selection
    FailedRetry,
}

impl JobStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Locked => "locked",
            Self::Transferring => "transferring",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::FailedRetry => "failed-retry",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ephemeral unit of work binding one plot to one selected harvester
///
/// All job state lives here and is threaded through the coordinator's calls;
/// nothing about the in-flight transfer is ambient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferJob {
    /// Unique job identifier
    pub id: String,
    /// The plot being moved
    pub plot: Plot,
    /// The selected destination
    pub harvester: Harvester,
    /// Current status
    pub status: JobStatus,
    /// Whole-job attempt counter (1-based)
    pub attempt: u32,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl TransferJob {
    /// Bind a plot to a selected harvester
    pub fn new(plot: Plot, harvester: Harvester, attempt: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            plot,
            harvester,
            status: JobStatus::Idle,
            attempt,
            created_at: Utc::now(),
        }
    }

    /// Remote path the plot is written to on the harvester
    pub fn remote_path(&self) -> String {
        self.harvester.destination(&self.plot.name)
    }

    pub fn advance(&mut self, status: JobStatus) {
        self.status = status;
    }
}
