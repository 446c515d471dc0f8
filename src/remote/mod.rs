//! Remote command execution channel
//!
//! Every external invocation is captured as a [`CommandOutput`] value so the
//! coordinator branches on exit status and captured output explicitly
//! instead of trusting a call to have worked.
//!
//! Assumes passwordless SSH between this host and the harvesters.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tracing::debug;

/// Captured result of one external command invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status code, None if killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Short single-line description of a failure, for logs
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit status {:?}", self.status)
        } else {
            format!("exit status {:?}: {stderr}", self.status)
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Remote command execution on a harvester
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a shell command on the remote host and capture its output
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput>;

    /// Create an empty marker file on the remote host
    async fn touch(&self, host: &str, path: &str) -> Result<()> {
        let output = self.run(host, &format!("touch {path}")).await?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::remote(host, output.failure_reason()))
        }
    }

    /// Remove a remote file; removing an absent file is not an error
    async fn remove(&self, host: &str, path: &str) -> Result<()> {
        let output = self.run(host, &format!("rm -f {path}")).await?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::remote(host, output.failure_reason()))
        }
    }

    /// Byte size of a remote file, extracted from its listing metadata
    async fn file_size(&self, host: &str, path: &str) -> Result<u64> {
        let output = self
            .run(host, &format!("ls -al {path} | awk '{{print $5}}'"))
            .await?;
        if !output.success() {
            return Err(Error::remote(host, output.failure_reason()));
        }
        output.stdout.trim().parse::<u64>().map_err(|_| {
            Error::remote(
                host,
                format!("unparseable size listing for {path}: {:?}", output.stdout.trim()),
            )
        })
    }
}

/// SSH subprocess channel
///
/// BatchMode keeps a missing key from degenerating into a password prompt
/// that would hang the scheduler tick.
pub struct SshShell {
    connect_timeout_secs: u64,
}

impl SshShell {
    pub fn new(connect_timeout_secs: u64) -> Self {
        Self {
            connect_timeout_secs,
        }
    }
}

impl Default for SshShell {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        debug!(host, command, "Running remote command");
        let output = tokio::process::Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(host)
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(output.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned-response shell for exercising the trait helpers
    struct CannedShell {
        responses: HashMap<String, CommandOutput>,
        log: Mutex<Vec<String>>,
    }

    impl CannedShell {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn respond(mut self, command: &str, output: CommandOutput) -> Self {
            self.responses.insert(command.to_string(), output);
            self
        }
    }

    #[async_trait]
    impl RemoteShell for CannedShell {
        async fn run(&self, _host: &str, command: &str) -> Result<CommandOutput> {
            self.log.lock().unwrap().push(command.to_string());
            Ok(self
                .responses
                .get(command)
                .cloned()
                .unwrap_or(CommandOutput {
                    status: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                }))
        }
    }

    fn ok_with(stdout: &str) -> CommandOutput {
        CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            status: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_command_output_success() {
        assert!(ok_with("").success());
        assert!(!failed("boom").success());
        assert!(failed("boom").failure_reason().contains("boom"));
    }

    #[tokio::test]
    async fn test_file_size_parses_listing() {
        let shell = CannedShell::new().respond(
            "ls -al /mnt/drive0/plot-a.plot | awk '{print $5}'",
            ok_with("108644374730\n"),
        );
        let size = shell
            .file_size("nas01", "/mnt/drive0/plot-a.plot")
            .await
            .unwrap();
        assert_eq!(size, 108_644_374_730);
    }

    #[tokio::test]
    async fn test_file_size_rejects_garbage() {
        let shell = CannedShell::new().respond(
            "ls -al /mnt/drive0/plot-a.plot | awk '{print $5}'",
            ok_with("not-a-number"),
        );
        let result = shell.file_size("nas01", "/mnt/drive0/plot-a.plot").await;
        assert!(matches!(result, Err(Error::RemoteCommandFailure { .. })));
    }

    #[tokio::test]
    async fn test_file_size_escalates_command_failure() {
        let shell = CannedShell::new().respond(
            "ls -al /mnt/drive0/missing.plot | awk '{print $5}'",
            failed("No such file or directory"),
        );
        let result = shell.file_size("nas01", "/mnt/drive0/missing.plot").await;
        assert!(matches!(result, Err(Error::RemoteCommandFailure { .. })));
    }

    #[tokio::test]
    async fn test_touch_and_remove_report_failures() {
        let shell = CannedShell::new()
            .respond("touch /tmp/marker", ok_with(""))
            .respond("rm -f /tmp/marker", failed("read-only file system"));

        assert!(shell.touch("nas01", "/tmp/marker").await.is_ok());
        assert!(shell.remove("nas01", "/tmp/marker").await.is_err());
    }
}
