//! Email notification channel
//!
//! Sends through the local `mail` transport, one invocation per recipient.
//! The host must already be configured to send mail (postfix or similar) or
//! deliveries will fail.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};

/// Local mail transport channel
pub struct EmailChannel {
    recipients: Vec<String>,
}

impl EmailChannel {
    pub fn new(recipients: Vec<String>) -> ChannelResult<Self> {
        if recipients.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "email channel needs at least one recipient".to_string(),
            ));
        }
        Ok(Self { recipients })
    }

    async fn send_one(&self, recipient: &str, subject: &str, body: &str) -> ChannelResult<()> {
        let mut child = tokio::process::Command::new("mail")
            .arg("-s")
            .arg(subject)
            .arg(recipient)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(body.as_bytes()).await?;
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(ChannelError::Other(format!(
                "mail exited with {:?} for {recipient}",
                status.code()
            )));
        }
        debug!(recipient, subject, "Email notification sent");
        Ok(())
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, title: &str, message: &str) -> ChannelResult<DeliveryStatus> {
        let mut failures = Vec::new();
        for recipient in &self.recipients {
            if let Err(e) = self.send_one(recipient, title, message).await {
                failures.push(format!("{recipient}: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(DeliveryStatus::success("email"))
        } else {
            Ok(DeliveryStatus::failure("email", failures.join("; ")))
        }
    }
}
