//! Push transports.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

/// The receiving end of a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("push sink closed")]
pub struct SinkClosed;

/// Write side of one live connection.
///
/// Writes must not block: the hub calls them while holding its registry lock.
/// Dropping the sink ends the connection.
pub trait PushSink: Send + Sync {
    fn write(&self, frame: Arc<str>) -> Result<(), SinkClosed>;
}

/// Sink backed by an unbounded tokio channel.
///
/// The receiver is typically turned into a streaming HTTP response.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Arc<str>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<str>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PushSink for ChannelSink {
    fn write(&self, frame: Arc<str>) -> Result<(), SinkClosed> {
        self.tx.send(frame).map_err(|_| SinkClosed)
    }
}
