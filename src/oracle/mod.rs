//! Harvester capacity snapshots and ranking
//!
//! Each harvester's drive manager exports a small JSON snapshot describing
//! how many plots it can still take and which mount the next plot should
//! land on. This module fetches those snapshots over an SFTP session,
//! caches them locally keyed by host, and ranks the live harvesters by
//! remaining capacity.

use crate::error::{Error, Result};
use crate::liveness::HostProbe;
use crate::models::{Harvester, HarvesterSnapshot};
use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of harvester capacity snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the capacity snapshot for one harvester
    async fn fetch(&self, host: &str) -> Result<HarvesterSnapshot>;
}

/// SFTP snapshot fetch, cached under a local export directory
pub struct SftpSnapshotSource {
    export_dir: PathBuf,
    remote_export_dir: String,
}

impl SftpSnapshotSource {
    pub fn new(export_dir: PathBuf, remote_export_dir: String) -> Self {
        Self {
            export_dir,
            remote_export_dir,
        }
    }

    fn unreachable(host: &str, reason: impl ToString) -> Error {
        Error::TransferUnreachable {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Open a session, pull the export document, cache and parse it.
    ///
    /// The session is closed on every exit path: `Session` tears down the
    /// transport when dropped.
    fn fetch_blocking(
        host: &str,
        remote_path: &str,
        local_path: &PathBuf,
    ) -> Result<HarvesterSnapshot> {
        let tcp = TcpStream::connect((host, 22))
            .map_err(|e| Self::unreachable(host, format!("connect: {e}")))?;

        let mut session =
            Session::new().map_err(|e| Self::unreachable(host, format!("session: {e}")))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| Self::unreachable(host, format!("handshake: {e}")))?;

        let user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
        if session.userauth_agent(&user).is_err() || !session.authenticated() {
            // Fall back to the usual key files.
            if let Some(home) = dirs::home_dir() {
                for name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let key = home.join(".ssh").join(name);
                    if key.exists()
                        && session
                            .userauth_pubkey_file(&user, None, &key, None)
                            .is_ok()
                    {
                        break;
                    }
                }
            }
        }
        if !session.authenticated() {
            return Err(Self::unreachable(host, "ssh authentication failed"));
        }

        let sftp = session
            .sftp()
            .map_err(|e| Self::unreachable(host, format!("sftp: {e}")))?;
        let mut remote_file = sftp
            .open(Path::new(remote_path))
            .map_err(|e| Self::unreachable(host, format!("open {remote_path}: {e}")))?;

        let mut raw = String::new();
        remote_file
            .read_to_string(&mut raw)
            .map_err(|e| Self::unreachable(host, format!("read {remote_path}: {e}")))?;

        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local_path, &raw)?;

        let snapshot: HarvesterSnapshot = serde_json::from_str(&raw)?;
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotSource for SftpSnapshotSource {
    async fn fetch(&self, host: &str) -> Result<HarvesterSnapshot> {
        let host = host.to_string();
        let remote_path = format!(
            "{}/{host}_export.json",
            self.remote_export_dir.trim_end_matches('/')
        );
        let local_path = self.export_dir.join(format!("{host}_export.json"));

        tokio::task::spawn_blocking(move || {
            Self::fetch_blocking(&host, &remote_path, &local_path)
        })
        .await
        .map_err(|e| Error::TransferUnreachable {
            host: "unknown".to_string(),
            reason: format!("snapshot task failed: {e}"),
        })?
    }
}

/// Ranks configured harvesters by remaining capacity
pub struct CapacityOracle {
    hosts: Vec<String>,
    probe: Box<dyn HostProbe>,
    source: Box<dyn SnapshotSource>,
}

impl CapacityOracle {
    pub fn new(
        hosts: Vec<String>,
        probe: Box<dyn HostProbe>,
        source: Box<dyn SnapshotSource>,
    ) -> Self {
        Self {
            hosts,
            probe,
            source,
        }
    }

    /// Configured harvesters that currently answer a liveness probe.
    /// Every dead host is logged, not silently dropped.
    pub async fn live_hosts(&self) -> Vec<String> {
        let mut alive = Vec::new();
        for host in &self.hosts {
            if self.probe.is_alive(host).await {
                alive.push(host.clone());
            } else {
                warn!(host = %host, "Harvester is OFFLINE");
            }
        }
        alive
    }

    /// Fetch a snapshot per live host and rank by descending remaining
    /// capacity. Ties break by host name so repeated calls with unchanged
    /// inputs are stable. Hosts whose snapshot cannot be fetched are
    /// excluded from this cycle and logged.
    pub async fn rank_harvesters(&self, live_hosts: &[String]) -> Vec<Harvester> {
        let mut ranked = Vec::new();
        for host in live_hosts {
            match self.source.fetch(host).await {
                Ok(snapshot) => {
                    debug!(
                        host = %host,
                        plots_until_full = snapshot.total_plots_until_full,
                        mount = %snapshot.current_plot_drive,
                        "Harvester snapshot"
                    );
                    ranked.push(Harvester::from_snapshot(&snapshot));
                }
                Err(e) => {
                    warn!(host = %host, error = %e, "Excluding harvester from ranking");
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.plots_until_full
                .cmp(&a.plots_until_full)
                .then_with(|| a.host.cmp(&b.host))
        });
        ranked
    }

    /// The live harvester with the most remaining capacity
    pub async fn select_best(&self) -> Result<Harvester> {
        let live = self.live_hosts().await;
        if live.is_empty() {
            return Err(Error::NoHarvesterAvailable {
                configured: self.hosts.len(),
            });
        }

        self.rank_harvesters(&live)
            .await
            .into_iter()
            .next()
            .ok_or(Error::NoHarvesterAvailable {
                configured: self.hosts.len(),
            })
    }
}
