//! Transport layer for Gamehall.
//!
//! A physical client link is split into two halves that run in separate
//! tasks:
//!
//! - a [`FrameStream`] owned by the connection's read loop, and
//! - a [`FrameSink`] owned by the write task ([`run_writer`]), which drains
//!   the connection's bounded [`Outbox`] queue.
//!
//! The halves never share state; the outbound queue is the only link
//! between "someone wants to talk to this client" and the socket.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket halves over `axum`'s upgraded socket

mod error;
mod outbox;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use outbox::{
    OutboundQueue, Outbound, Outbox, channel, run_keepalive, run_writer,
};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketSink, WebSocketStream, split};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique ID.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The write half of a client link.
pub trait FrameSink: Send + 'static {
    /// Sends one data frame to the remote peer.
    fn send(
        &mut self,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a keepalive ping.
    fn ping(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the link. The peer sees a clean close.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The read half of a client link.
pub trait FrameStream: Send + 'static {
    /// Receives the next data frame from the remote peer.
    ///
    /// Control frames are skipped. Returns `Ok(None)` when the connection
    /// is cleanly closed.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }
}
