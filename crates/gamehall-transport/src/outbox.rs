//! The bounded outbound queue between producers and a connection's write
//! task.
//!
//! Anything that wants to reach a client (its own read loop, a lobby actor,
//! a game fan-out task) holds a cloned [`Outbox`]. Exactly one write task
//! owns the matching [`OutboundQueue`] and is the only code that touches the
//! socket's write half.
//!
//! A full queue makes [`Outbox::send`] wait. Nothing is dropped.

use std::fmt::Display;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::{ConnectionId, FrameSink, TransportError};

/// One item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound<T> {
    /// A data message, encoded by the write task.
    Message(T),
    /// A keepalive ping.
    Ping,
    /// Close sentinel. The write task closes the link and exits.
    Close,
}

/// Producer side of a connection's outbound queue.
pub struct Outbox<T> {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound<T>>,
}

// Manual impl: `T` itself doesn't need to be `Clone`.
impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Outbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("id", &self.id)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<T: Send> Outbox<T> {
    /// The connection this outbox writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Enqueues a message, waiting while the queue is full.
    pub async fn send(&self, message: T) -> Result<(), TransportError> {
        self.push(Outbound::Message(message)).await
    }

    /// Enqueues a keepalive ping.
    pub async fn ping(&self) -> Result<(), TransportError> {
        self.push(Outbound::Ping).await
    }

    /// Enqueues the close sentinel.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.push(Outbound::Close).await
    }

    /// Enqueues the close sentinel without waiting.
    ///
    /// Used from `Drop`, where awaiting isn't possible. Returns `false` if
    /// the queue was full or already closed.
    pub fn try_close(&self) -> bool {
        self.tx.try_send(Outbound::Close).is_ok()
    }

    /// Whether the write task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn push(&self, item: Outbound<T>) -> Result<(), TransportError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| TransportError::ConnectionClosed(self.id.to_string()))
    }
}

/// Consumer side of a connection's outbound queue.
#[derive(Debug)]
pub struct OutboundQueue<T> {
    id: ConnectionId,
    rx: mpsc::Receiver<Outbound<T>>,
}

impl<T> OutboundQueue<T> {
    /// The connection this queue feeds.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next item. `None` once every `Outbox` is dropped.
    pub async fn recv(&mut self) -> Option<Outbound<T>> {
        self.rx.recv().await
    }
}

/// Creates a connection's outbound queue with room for `capacity` items.
pub fn channel<T>(
    id: ConnectionId,
    capacity: usize,
) -> (Outbox<T>, OutboundQueue<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Outbox { id, tx }, OutboundQueue { id, rx })
}

/// Drains `queue` onto `sink` until the close sentinel arrives, every
/// producer is gone, or the sink fails.
///
/// Messages that fail to encode are logged and skipped.
pub async fn run_writer<T, S, F, E>(
    mut sink: S,
    mut queue: OutboundQueue<T>,
    mut encode: F,
) where
    S: FrameSink,
    F: FnMut(&T) -> Result<Vec<u8>, E>,
    E: Display,
{
    let conn_id = queue.id();

    while let Some(item) = queue.recv().await {
        let result = match item {
            Outbound::Message(message) => match encode(&message) {
                Ok(bytes) => sink.send(bytes).await,
                Err(e) => {
                    tracing::warn!(%conn_id, error = %e, "dropping unencodable message");
                    continue;
                }
            },
            Outbound::Ping => sink.ping().await,
            Outbound::Close => break,
        };

        if let Err(e) = result {
            tracing::debug!(%conn_id, error = %e, "write failed, stopping writer");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::debug!(%conn_id, "writer stopped");
}

/// Enqueues a ping every `period` until enqueueing fails.
///
/// The first ping goes out one full period after the call.
pub async fn run_keepalive<T: Send>(outbox: Outbox<T>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // completes immediately

    loop {
        interval.tick().await;
        if outbox.ping().await.is_err() {
            tracing::debug!(conn_id = %outbox.id(), "keepalive stopped");
            return;
        }
    }
}
