//! Response sink: the only writer of the output stream
//!
//! Workers and the heartbeat hold cheap [`ResponseSink`] handles that feed a channel. One
//! writer task drains the channel and writes each message as a single JSON line followed
//! by a flush, so lines can never interleave.

use keytag_common::protocol::OutboundMessage;
use keytag_common::{Error, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Handle for submitting outbound messages
#[derive(Debug, Clone)]
pub struct ResponseSink {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ResponseSink {
    /// Submit one message; fails only once the writer has stopped
    pub async fn send(&self, message: impl Into<OutboundMessage>) -> Result<()> {
        self.tx
            .send(message.into())
            .await
            .map_err(|_| Error::Internal("response writer has stopped".to_string()))
    }
}

/// Spawn the writer task over `output`
///
/// The task ends once every [`ResponseSink`] clone is dropped and the channel is empty,
/// returning the number of lines written. A failed write ends it early with the I/O error.
pub fn spawn_sink<W>(output: W, capacity: usize) -> (ResponseSink, JoinHandle<Result<u64>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(write_lines(rx, output));
    (ResponseSink { tx }, handle)
}

async fn write_lines<W>(mut rx: mpsc::Receiver<OutboundMessage>, mut output: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to encode outbound message, dropping it");
                continue;
            }
        };
        line.push(b'\n');

        output.write_all(&line).await?;
        output.flush().await?;
        written += 1;
    }

    output.shutdown().await.ok();
    debug!(lines = written, "Response writer finished");
    Ok(written)
}
