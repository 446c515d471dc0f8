//! Two-sided transfer lock
//!
//! A pair of zero-byte marker files, one local and one on the selected
//! harvester, means "a transfer is currently in flight". The local marker is
//! authoritative for serialization; the remote marker mirrors it so the
//! harvester side can see a transfer is active.
//!
//! Local creation uses `create_new`, so acquiring a lock that is already
//! held fails before the remote side is touched.

use crate::error::{Error, Result};
use crate::remote::RemoteShell;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

/// The local + remote marker pair for one producer host
pub struct TransferLock {
    local_marker: PathBuf,
    remote_marker: String,
}

impl TransferLock {
    pub fn new(local_marker: PathBuf, remote_marker: String) -> Self {
        Self {
            local_marker,
            remote_marker,
        }
    }

    /// True iff the local marker file exists
    pub fn is_held(&self) -> bool {
        self.local_marker.exists()
    }

    pub fn local_marker(&self) -> &PathBuf {
        &self.local_marker
    }

    /// Create the local marker, then mirror it on the harvester.
    ///
    /// If the local marker already exists the acquire fails immediately with
    /// [`Error::LockAlreadyHeld`] and the remote side is not touched. A
    /// failure to create the remote marker is logged but does not fail the
    /// acquire; the local marker is what serializes transfers.
    pub async fn acquire(&self, shell: &dyn RemoteShell, host: &str) -> Result<()> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.local_marker)
        {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(marker = %self.local_marker.display(), "Lock marker already exists");
                return Err(Error::LockAlreadyHeld {
                    marker: self.local_marker.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = shell.touch(host, &self.remote_marker).await {
            warn!(host, error = %e, "Could not create remote lock marker");
        }
        debug!(marker = %self.local_marker.display(), host, "Transfer lock acquired");
        Ok(())
    }

    /// Remove both markers. Removing an already-absent marker is a no-op.
    pub async fn release(&self, shell: &dyn RemoteShell, host: &str) -> Result<()> {
        match std::fs::remove_file(&self.local_marker) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(marker = %self.local_marker.display(), "Lock marker does not exist");
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = shell.remove(host, &self.remote_marker).await {
            warn!(host, error = %e, "Could not remove remote lock marker");
        }
        debug!(marker = %self.local_marker.display(), host, "Transfer lock released");
        Ok(())
    }

    /// Remediation path for a zombie transfer: clear both markers so the job
    /// can restart from selection. The caller is responsible for terminating
    /// any surviving transfer process first.
    pub async fn force_reset(&self, shell: &dyn RemoteShell, host: &str) -> Result<()> {
        warn!(marker = %self.local_marker.display(), host, "Forcing transfer lock reset");
        self.release(shell, host).await
    }

    /// Clear a stale local marker left behind by a dead transfer process
    pub fn clear_local(&self) -> Result<()> {
        match std::fs::remove_file(&self.local_marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
