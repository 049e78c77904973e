//! Streaming transport layer for Scorelink.
//!
//! Provides the [`Connector`] and [`Link`] traits that abstract over the
//! network protocol carrying telemetry frames, and [`ConnectionClient`], which
//! owns exactly one logical connection and its 4-state lifecycle.
//!
//! ```text
//! Closed → Connecting → Open → Closing → Closed
//! ```
//!
//! Inbound frames never interrupt the caller: they are buffered by a
//! background reader and surface only when [`ConnectionClient::dispatch_queue`]
//! runs, typically once per tick of the owning driver loop.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket connector via `tokio-tungstenite`

mod client;
mod close;
mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use client::{ConnectionClient, ConnectionEvent, ConnectionState};
pub use close::CloseCode;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketLink};

use std::fmt;
use std::future::Future;

/// Opaque identifier for one connection attempt.
///
/// Every [`ConnectionClient`] gets a fresh id, so log lines from a replaced
/// connection can be told apart from its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
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

/// A frame read from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text frame (binary frames are decoded as UTF-8 by the link).
    Text(String),
    /// The peer closed the connection with the given code.
    Closed(CloseCode),
}

/// Opens links to a streaming backend.
///
/// The connector is shared by every connection attempt of a supervisor, so
/// it must be cheap to call repeatedly.
pub trait Connector: Send + Sync + 'static {
    /// The link type produced by a successful handshake.
    type Link: Link;

    /// Performs the transport-specific handshake against `url`.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// One established, bidirectional message link.
///
/// Methods take `&self` so one task can read while another writes.
pub trait Link: Send + Sync + 'static {
    /// Sends a text frame to the remote peer.
    fn send_text(
        &self,
        text: String,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the stream ends without a close frame.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Incoming>, TransportError>> + Send;

    /// Sends a close frame with `code` and shuts the link down.
    fn close(
        &self,
        code: CloseCode,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
