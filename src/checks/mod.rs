//! Staging disk utilization warnings
//!
//! The staging directory filling up jeopardizes plotting upstream, so the
//! coordinator checks utilization at the start of every cycle. A sentinel
//! latch file records that the warning was already sent; the operator gets
//! one alert per excursion and an all-clear once utilization drops back
//! below the threshold.

use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::{debug, warn};

/// An operator-facing capacity event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityAlert {
    /// Utilization crossed the warning threshold
    Warning { used_percent: u8 },
    /// Utilization dropped back below the threshold after a warning
    AllClear { used_percent: u8 },
}

impl CapacityAlert {
    /// Title and message for the notifier
    pub fn message(&self, dir: &Path) -> (String, String) {
        match self {
            Self::Warning { used_percent } => (
                "WARNING: Directory Utilization Nearing Capacity".to_string(),
                format!(
                    "WARNING: {} is at {used_percent}% utilization.\nPlotting is in Jeopardy!\nCheck your drives IMMEDIATELY!",
                    dir.display()
                ),
            ),
            Self::AllClear { used_percent } => (
                "INFORMATION: Directory Utilization".to_string(),
                format!(
                    "INFORMATION: {} is back to {used_percent}% utilization.\nPlotting will continue.",
                    dir.display()
                ),
            ),
        }
    }
}

/// Latched utilization monitor for the staging disk
pub struct DiskUsageMonitor {
    warning_percent: u8,
    latch_file: PathBuf,
}

impl DiskUsageMonitor {
    pub fn new(warning_percent: u8, latch_file: PathBuf) -> Self {
        Self {
            warning_percent,
            latch_file,
        }
    }

    /// Utilization percent of the disk holding `dir`, from the mounted disk
    /// with the longest mount-point prefix of the path
    pub fn usage_percent(&self, dir: &Path) -> Option<u8> {
        let target = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let disks = Disks::new_with_refreshed_list();

        let disk = disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())?;

        let total = disk.total_space();
        if total == 0 {
            return None;
        }
        let used = total.saturating_sub(disk.available_space());
        Some(((used.saturating_mul(100)) / total) as u8)
    }

    /// Apply the latch logic to a measured utilization
    pub fn evaluate(&self, used_percent: u8) -> Result<Option<CapacityAlert>> {
        let latched = self.latch_file.exists();

        if used_percent >= self.warning_percent {
            if latched {
                debug!(used_percent, "Utilization still high, alert already sent");
                return Ok(None);
            }
            std::fs::write(&self.latch_file, b"")?;
            warn!(
                used_percent,
                threshold = self.warning_percent,
                "Staging disk nearing capacity, sending alert"
            );
            return Ok(Some(CapacityAlert::Warning { used_percent }));
        }

        if latched {
            match std::fs::remove_file(&self.latch_file) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(Some(CapacityAlert::AllClear { used_percent }));
        }

        debug!(used_percent, "Staging disk check complete, all OK");
        Ok(None)
    }

    /// Measure and evaluate in one step
    pub fn check(&self, dir: &Path) -> Result<Option<CapacityAlert>> {
        match self.usage_percent(dir) {
            Some(percent) => self.evaluate(percent),
            None => {
                debug!(dir = %dir.display(), "No disk found for staging directory");
                Ok(None)
            }
        }
    }
}
