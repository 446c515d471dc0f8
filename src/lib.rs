//! plotferry - Plot Transfer Coordinator
//!
//! Moves finished plots from a plotter host to the remote harvester with the
//! most free capacity, over an external high-throughput stream program, and
//! verifies every transfer byte-for-byte before the source is deleted.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`staging`] - Plot discovery in the staging directory
//! - [`liveness`] - Host reachability and local process checks
//! - [`remote`] - Remote command execution channel
//! - [`oracle`] - Harvester capacity snapshots and ranking
//! - [`lock`] - Two-sided transfer lock (local + remote marker files)
//! - [`throughput`] - Live interface throughput from the metrics service
//! - [`detector`] - Stuck-transfer classification
//! - [`transfer`] - External transfer program invocation
//! - [`checks`] - Staging disk utilization warnings
//! - [`coordinator`] - The transfer state machine
//! - [`notifications`] - Operator alert fan-out
//!
//! # Example
//!
//! ```no_run
//! use plotferry::config::Config;
//! use plotferry::coordinator::TransferCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.toml".as_ref())?;
//!     let mut coordinator = TransferCoordinator::new(config)?;
//!     let outcome = coordinator.run_cycle().await?;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

pub mod checks;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod error;
pub mod liveness;
pub mod lock;
pub mod models;
pub mod notifications;
pub mod oracle;
pub mod remote;
pub mod staging;
pub mod throughput;
pub mod transfer;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::coordinator::{CycleOutcome, TransferCoordinator};
    pub use crate::detector::TransferActivity;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{Harvester, HarvesterSnapshot, JobStatus, Plot, TransferJob};
}

// Direct re-exports for convenience
pub use models::{Harvester, HarvesterSnapshot, JobStatus, Plot, TransferJob};
