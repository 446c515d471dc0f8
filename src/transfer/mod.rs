//! External transfer program invocation
//!
//! The actual byte transfer is an external high-throughput stream program
//! (historically a netcat wrapper script). It is invoked with three
//! positional arguments and its exit status and output are captured, never
//! assumed.

use crate::error::Result;
use crate::models::Plot;
use crate::remote::CommandOutput;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// The external byte-transfer mechanism
#[async_trait]
pub trait TransferProgram: Send + Sync {
    /// Invoke the transfer with (source path, file name, destination host)
    async fn send(&self, plot: &Plot, host: &str) -> Result<CommandOutput>;
}

/// Subprocess invocation of the configured transfer program
pub struct StreamSender {
    program: PathBuf,
}

impl StreamSender {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl TransferProgram for StreamSender {
    async fn send(&self, plot: &Plot, host: &str) -> Result<CommandOutput> {
        info!(
            program = %self.program.display(),
            plot = %plot.name,
            host,
            "Starting plot transfer"
        );

        // Dominant wall-clock cost of the whole cycle lives here.
        let output = tokio::process::Command::new(&self.program)
            .arg(&plot.path)
            .arg(&plot.name)
            .arg(host)
            .output()
            .await?;

        Ok(output.into())
    }
}
