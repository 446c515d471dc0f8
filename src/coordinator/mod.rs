//! The transfer state machine
//!
//! One [`TransferCoordinator::run_cycle`] call performs one bounded pass:
//! system checks, plot discovery, harvester selection, lock acquisition,
//! the external transfer, remote cleanup, size verification, lock release
//! and source deletion. The coordinator is designed to be invoked
//! periodically by an external scheduler; it keeps no state between passes
//! beyond the lock marker files.
//!
//! Side effects are strictly ordered: the lock is acquired before the
//! transfer starts, remote cleanup always runs after the transfer program
//! returns, verification follows cleanup, and the source plot is deleted
//! only after verification succeeds.

use crate::checks::DiskUsageMonitor;
use crate::config::Config;
use crate::detector::{StuckTransferDetector, TransferActivity};
use crate::error::{Error, Result};
use crate::liveness::{HostProbe, PingProbe, SystemScanner};
use crate::lock::TransferLock;
use crate::models::{JobStatus, Plot, TransferJob};
use crate::notifications::Notifier;
use crate::oracle::{CapacityOracle, SftpSnapshotSource};
use crate::remote::{RemoteShell, SshShell};
use crate::staging;
use crate::throughput::MetricsClient;
use crate::transfer::{StreamSender, TransferProgram};
use regex::Regex;
use tracing::{debug, error, info, warn};

/// Result of one coordination pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No qualifying plot in the staging directory
    Idle,
    /// A transfer is already in flight; try again next tick
    Busy,
    /// Dry-run mode: selected a destination but moved nothing
    DryRun { plot: String, harvester: String },
    /// One plot transferred, verified and removed from staging
    Transferred {
        plot: String,
        harvester: String,
        bytes: u64,
        attempts: u32,
    },
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "no plots to process"),
            Self::Busy => write!(f, "transfer already in progress"),
            Self::DryRun { plot, harvester } => {
                write!(f, "dry run: would send {plot} to {harvester}")
            }
            Self::Transferred {
                plot,
                harvester,
                bytes,
                attempts,
            } => write!(
                f,
                "{plot} transferred to {harvester} ({bytes} bytes, {attempts} attempt(s))"
            ),
        }
    }
}

/// Local vs remote byte sizes for one transferred plot
#[derive(Debug, Clone, Copy)]
struct SizeComparison {
    local: u64,
    remote: u64,
}

impl SizeComparison {
    fn matches(&self) -> bool {
        self.local == self.remote
    }
}

/// Outcome of a single whole-job attempt
enum Attempt {
    /// The cycle is finished with this outcome
    Complete(CycleOutcome),
    /// Sizes disagreed; the job restarts from selection
    Mismatch { local: u64, remote: u64 },
    /// A zombie transfer was reset; the job restarts from selection
    ZombieReset,
}

/// Orchestrates selection, locking, transfer, verification and cleanup
pub struct TransferCoordinator {
    config: Config,
    pattern: Regex,
    oracle: CapacityOracle,
    detector: StuckTransferDetector,
    probe: Box<dyn HostProbe>,
    shell: Box<dyn RemoteShell>,
    program: Box<dyn TransferProgram>,
    notifier: Notifier,
    lock: TransferLock,
    usage: DiskUsageMonitor,
}

impl TransferCoordinator {
    /// Wire the coordinator against the real system: ping probes, SSH,
    /// SFTP snapshots, the process table and the metrics service
    pub fn new(config: Config) -> Result<Self> {
        let pattern = Regex::new(&config.staging.pattern)
            .map_err(|e| Error::config(format!("invalid staging pattern: {e}")))?;

        let oracle = CapacityOracle::new(
            config.harvesters.hosts.clone(),
            Box::new(PingProbe::new(
                config.harvesters.probe_attempts,
                config.probe_timeout(),
            )),
            Box::new(SftpSnapshotSource::new(
                config.harvesters.export_dir.clone(),
                config.harvesters.remote_export_dir.clone(),
            )),
        );

        let detector = StuckTransferDetector::new(
            config.transfer.process_name.clone(),
            config.transfer.network_interface.clone(),
            config.transfer.min_throughput,
            Box::new(SystemScanner),
            Box::new(MetricsClient::new(
                config.metrics.endpoint.clone(),
                config.metrics_timeout(),
            )?),
        );

        let probe = Box::new(PingProbe::new(
            config.harvesters.probe_attempts,
            config.probe_timeout(),
        ));
        let shell = Box::new(SshShell::default());
        let program = Box::new(StreamSender::new(config.transfer.program.clone()));
        let notifier = Notifier::from_config(&config.notifications);

        Ok(Self::from_parts(
            config, pattern, oracle, detector, probe, shell, program, notifier,
        ))
    }

    /// Assemble a coordinator from explicit parts; the seam used by tests
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        config: Config,
        pattern: Regex,
        oracle: CapacityOracle,
        detector: StuckTransferDetector,
        probe: Box<dyn HostProbe>,
        shell: Box<dyn RemoteShell>,
        program: Box<dyn TransferProgram>,
        notifier: Notifier,
    ) -> Self {
        let lock = TransferLock::new(
            config.transfer.local_marker.clone(),
            config.transfer.remote_marker.clone(),
        );
        let usage = DiskUsageMonitor::new(
            config.capacity.warning_percent,
            config.capacity.latch_file.clone(),
        );
        Self {
            config,
            pattern,
            oracle,
            detector,
            probe,
            shell,
            program,
            notifier,
            lock,
            usage,
        }
    }

    /// Perform one bounded coordination pass
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.system_checks().await;

        let plot = match staging::next_plot(
            &self.config.staging.dir,
            &self.pattern,
            self.config.staging.min_plot_bytes,
        )? {
            Some(plot) => plot,
            None => return Ok(CycleOutcome::Idle),
        };

        info!(plot = %plot.name, bytes = plot.bytes, "Processing plot");

        let max_attempts = self.config.retry.max_attempts;
        let mut last_mismatch = None;

        for attempt in 1..=max_attempts {
            let delay = self.config.retry.delay_before(attempt);
            if !delay.is_zero() {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match self.attempt_transfer(&plot, attempt).await? {
                Attempt::Complete(outcome) => return Ok(outcome),
                Attempt::Mismatch { local, remote } => {
                    warn!(
                        plot = %plot.name,
                        attempt,
                        local,
                        remote,
                        "Plot sizes DO NOT match, retrying whole job"
                    );
                    last_mismatch = Some((local, remote));
                }
                Attempt::ZombieReset => {
                    warn!(attempt, "Zombie transfer reset, restarting from selection");
                }
            }
        }

        match last_mismatch {
            Some((local, remote)) => {
                self.notifier
                    .notify(
                        "Plot transfer failing",
                        &format!(
                            "Transfer of {} failed verification {max_attempts} time(s). \
                             The source plot has been kept. Please investigate.",
                            plot.name
                        ),
                    )
                    .await;
                Err(Error::VerificationMismatch {
                    plot: plot.name,
                    local,
                    remote,
                })
            }
            None => {
                self.notifier
                    .notify(
                        "Transfer stuck",
                        &format!(
                            "A transfer process kept running with no traffic on {} \
                             across {max_attempts} attempt(s). Please investigate.",
                            self.config.transfer.network_interface
                        ),
                    )
                    .await;
                Err(Error::ZombieLock {
                    interface: self.config.transfer.network_interface.clone(),
                })
            }
        }
    }

    /// One whole-job attempt: selection through verification
    async fn attempt_transfer(&mut self, plot: &Plot, attempt: u32) -> Result<Attempt> {
        // Selection binds the harvester and its current mount to the job.
        let harvester = match self.oracle.select_best().await {
            Ok(harvester) => harvester,
            Err(e @ Error::NoHarvesterAvailable { .. }) => {
                self.notifier
                    .notify(
                        "No harvester available",
                        "No configured harvester answered a liveness probe. \
                         Plots cannot move! Please correct IMMEDIATELY!",
                    )
                    .await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let mut job = TransferJob::new(plot.clone(), harvester, attempt);
        info!(
            job = %job.id,
            harvester = %job.harvester.host,
            mount = %job.harvester.mount,
            attempt,
            "Selected harvester"
        );

        if self.config.transfer.dry_run {
            info!("Dry run only, nothing will be done");
            return Ok(Attempt::Complete(CycleOutcome::DryRun {
                plot: job.plot.name.clone(),
                harvester: job.harvester.host.clone(),
            }));
        }

        // The harvester can go down between selection and locking; that is
        // the one urgent, operator-visible fault.
        let host = job.harvester.host.clone();
        if !self.probe.is_alive(&host).await {
            error!(host = %host, "Selected harvester went OFFLINE, cannot continue");
            self.notifier
                .notify(
                    &format!("{host} OFFLINE"),
                    &format!(
                        "Your harvester {host} cannot be reached. \
                         Plots cannot move! Please correct IMMEDIATELY!"
                    ),
                )
                .await;
            return Err(Error::TransferUnreachable {
                host,
                reason: "liveness probe failed after selection".to_string(),
            });
        }

        match self.detector.classify().await? {
            TransferActivity::InProgress => {
                info!("A transfer is currently running, exiting quietly");
                return Ok(Attempt::Complete(CycleOutcome::Busy));
            }
            TransferActivity::Zombie => {
                self.remediate_zombie(&host).await;
                return Ok(Attempt::ZombieReset);
            }
            TransferActivity::Clear => {
                if self.lock.is_held() {
                    debug!("Stale lock marker with no transfer process, clearing");
                    self.lock.clear_local()?;
                }
            }
        }

        match self.lock.acquire(self.shell.as_ref(), &host).await {
            Ok(()) => {}
            Err(Error::LockAlreadyHeld { .. }) => {
                return Ok(Attempt::Complete(CycleOutcome::Busy));
            }
            Err(e) => return Err(e),
        }
        job.advance(JobStatus::Locked);

        job.advance(JobStatus::Transferring);
        let transfer_result = self.program.send(&job.plot, &host).await;

        // Leftover receiver processes are terminated no matter how the
        // transfer program exited.
        self.remote_cleanup(&host).await;

        let output = match transfer_result {
            Ok(output) => output,
            Err(e) => {
                self.release_lock(&host).await;
                return Err(e);
            }
        };
        if !output.success() {
            error!(
                status = ?output.status,
                stderr = %output.stderr.trim(),
                "Transfer program failed"
            );
            self.release_lock(&host).await;
            return Err(Error::TransferProcessFailure {
                status: output.status,
                stderr: output.stderr,
            });
        }

        job.advance(JobStatus::Verifying);
        match self.verify(&job).await {
            Ok(sizes) if sizes.matches() => {
                // Let the harvester side know a verified plot arrived.
                if let Err(e) = self
                    .shell
                    .touch(&host, &self.config.transfer.remote_received_marker)
                    .await
                {
                    warn!(host = %host, error = %e, "Could not touch received marker");
                }

                self.release_lock(&host).await;
                std::fs::remove_file(&job.plot.path)?;
                info!(plot = %job.plot.path.display(), "Removing source plot");
                job.advance(JobStatus::Done);

                Ok(Attempt::Complete(CycleOutcome::Transferred {
                    plot: job.plot.name.clone(),
                    harvester: host,
                    bytes: job.plot.bytes,
                    attempts: attempt,
                }))
            }
            Ok(sizes) => {
                job.advance(JobStatus::FailedRetry);
                self.release_lock(&host).await;
                Ok(Attempt::Mismatch {
                    local: sizes.local,
                    remote: sizes.remote,
                })
            }
            Err(e) => {
                // Cannot verify: the source must never be deleted on a
                // guess, and the operator gets the error.
                self.release_lock(&host).await;
                Err(e)
            }
        }
    }

    /// Remote size comparison against the local source file
    async fn verify(&self, job: &TransferJob) -> Result<SizeComparison> {
        let remote_path = job.remote_path();
        debug!(host = %job.harvester.host, path = %remote_path, "Verifying transfer");

        let remote = self
            .shell
            .file_size(&job.harvester.host, &remote_path)
            .await?;
        let local = std::fs::metadata(&job.plot.path)?.len();

        debug!(remote, local, "Comparing plot sizes");
        let sizes = SizeComparison { local, remote };
        if sizes.matches() {
            info!("Plot sizes match, we have a good plot move");
        }
        Ok(sizes)
    }

    /// Zombie remediation: kill the remote receiver, then clear both
    /// markers so the job can restart from selection
    async fn remediate_zombie(&self, host: &str) {
        warn!(host, "Forcing reset of a zombie transfer");
        self.remote_cleanup(host).await;
        if let Err(e) = self.lock.force_reset(self.shell.as_ref(), host).await {
            error!(host, error = %e, "Zombie lock reset failed");
        }
    }

    /// Terminate leftover receiver processes on the harvester; best-effort
    async fn remote_cleanup(&self, host: &str) {
        match self
            .shell
            .run(host, &self.config.transfer.remote_cleanup_command)
            .await
        {
            Ok(output) if !output.success() => {
                debug!(host, status = ?output.status, "Remote cleanup returned non-zero");
            }
            Ok(_) => debug!(host, "Remote receiver cleanup called"),
            Err(e) => warn!(host, error = %e, "Remote cleanup failed"),
        }
    }

    /// Release the lock, logging instead of masking the surrounding error
    async fn release_lock(&self, host: &str) {
        if let Err(e) = self.lock.release(self.shell.as_ref(), host).await {
            error!(host, error = %e, "Could not release transfer lock");
        }
    }

    /// Capacity warnings for the staging disk; never blocks the cycle
    async fn system_checks(&self) {
        match self.usage.check(&self.config.staging.dir) {
            Ok(Some(alert)) => {
                let (title, message) = alert.message(&self.config.staging.dir);
                self.notifier.notify(&title, &message).await;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Capacity check failed"),
        }
    }
}
