//! Console transport: every outgoing chat message becomes one line on stdout.

use async_trait::async_trait;
use dispatch_core::notifier::{Notifier, NotifyPayload};
use dispatch_core::NotifyError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::render;

/// A rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub recipient: String,
    pub text: String,
}

impl Outgoing {
    pub fn new(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            text: text.into(),
        }
    }
}

/// Renders engine notifications and queues them for the console writer.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    outbox: mpsc::UnboundedSender<Outgoing>,
}

impl ConsoleNotifier {
    pub fn new(outbox: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, recipient: &str, payload: NotifyPayload) -> Result<(), NotifyError> {
        let kind = payload.kind();
        self.outbox
            .send(Outgoing::new(recipient, render::notification(&payload)))
            .map_err(|_| NotifyError::new(recipient, kind, "console output closed"))
    }
}

/// Write queued messages until every sender is gone.
pub async fn write_outbox<W>(mut outbox: mpsc::UnboundedReceiver<Outgoing>, mut out: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbox.recv().await {
        let mut block = String::new();
        for line in message.text.lines() {
            block.push_str(&format!("-> {}: {line}\n", message.recipient));
        }
        out.write_all(block.as_bytes()).await?;
        out.flush().await?;
    }
    Ok(())
}
