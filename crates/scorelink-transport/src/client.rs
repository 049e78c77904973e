//! [`ConnectionClient`]: one logical streaming connection and its lifecycle.
//!
//! The client is driven from a single control task. Network I/O runs in two
//! background tasks per connection (a reader and a writer), but neither of
//! them touches the client's state: the reader only buffers frames, and the
//! control task applies them when it calls [`ConnectionClient::dispatch_queue`].
//!
//! ```text
//!            open()                 handshake ok
//! [Closed] ─────────→ [Connecting] ─────────────→ [Open]
//!    ↑                     │ handshake failed        │ close(code) / peer close
//!    │                     ▼                         ▼
//!    └──────────────── [Closed] ←──────────────── [Closing]
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::{CloseCode, ConnectionId, Connector, Incoming, Link, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long `close` waits for the writer to flush and send the close frame.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle state of a [`ConnectionClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link. Both the initial and the terminal state.
    Closed,
    /// Handshake in progress.
    Connecting,
    /// Link established; frames may be sent and received.
    Open,
    /// Teardown in progress.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

/// Something that happened to the connection, reported to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The handshake completed; the connection is `Open`.
    Opened,
    /// A text frame arrived from the peer.
    Message(String),
    /// A transport failure (handshake, send or receive).
    Error(String),
    /// The connection reached `Closed` with this code.
    Closed(CloseCode),
}

/// Frames queued for the writer task.
enum Outbound {
    Text(String),
    Close(CloseCode),
}

/// What the reader and writer tasks report back to the control task.
enum Inbound {
    Text(String),
    Closed(CloseCode),
    Failed(String),
}

/// The I/O half of an open connection.
struct Active {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Active {
    fn spawn<L: Link>(link: L) -> Self {
        let link = Arc::new(link);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(Arc::clone(&link), in_tx.clone()));
        let writer = tokio::spawn(write_loop(link, out_rx, in_tx));

        Self {
            outbound: out_tx,
            inbound: in_rx,
            reader,
            writer,
        }
    }

    /// Sends the close frame and waits (bounded) for the writer to finish.
    async fn shutdown(self, code: CloseCode) {
        let Self {
            outbound,
            reader,
            mut writer,
            ..
        } = self;

        reader.abort();
        let _ = outbound.send(Outbound::Close(code));
        drop(outbound);

        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            tracing::debug!("writer did not finish in time, aborting");
            writer.abort();
        }
    }

    /// Stops reading and lets the writer close the link in the background.
    fn abandon(self) {
        self.reader.abort();
        // Dropping `outbound` ends the writer loop, which then sends a
        // normal close frame on its own.
    }
}

async fn read_loop<L: Link>(link: Arc<L>, inbound: mpsc::UnboundedSender<Inbound>) {
    loop {
        let frame = match link.recv().await {
            Ok(Some(Incoming::Text(text))) => Inbound::Text(text),
            Ok(Some(Incoming::Closed(code))) => {
                let _ = inbound.send(Inbound::Closed(code));
                return;
            }
            Ok(None) => {
                let _ = inbound.send(Inbound::Closed(CloseCode::Abnormal));
                return;
            }
            Err(e) => {
                let _ = inbound.send(Inbound::Failed(e.to_string()));
                return;
            }
        };
        if inbound.send(frame).is_err() {
            return;
        }
    }
}

async fn write_loop<L: Link>(
    link: Arc<L>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    let code = loop {
        match outbound.recv().await {
            Some(Outbound::Text(text)) => {
                if let Err(e) = link.send_text(text).await {
                    let _ = inbound.send(Inbound::Failed(e.to_string()));
                    return;
                }
            }
            Some(Outbound::Close(code)) => break code,
            None => break CloseCode::Normal,
        }
    };

    if let Err(e) = link.close(code).await {
        tracing::debug!(error = %e, "close frame not delivered");
    }
}

/// Owns a single logical connection to the streaming backend.
///
/// All operations are non-fatal: misuse (opening twice, sending while not
/// open) is logged and ignored, and transport failures are reported as
/// [`ConnectionEvent`]s returned by [`dispatch_queue`](Self::dispatch_queue).
///
/// Dropping a client that is not `Closed` forces a close: the reader stops
/// immediately and the writer sends a normal close frame in the background.
pub struct ConnectionClient<C: Connector> {
    id: ConnectionId,
    url: String,
    connector: Arc<C>,
    connect_timeout: Duration,
    state: ConnectionState,
    active: Option<Active>,
    events: VecDeque<ConnectionEvent>,
}

impl<C: Connector> ConnectionClient<C> {
    /// Creates a client in the `Closed` state. Nothing touches the network
    /// until [`open`](Self::open) is called.
    pub fn new(
        connector: Arc<C>,
        url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            id: ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            url: url.into(),
            connector,
            connect_timeout,
            state: ConnectionState::Closed,
            active: None,
            events: VecDeque::new(),
        }
    }

    /// Returns this connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` while the connection is `Open`.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Performs the handshake.
    ///
    /// A no-op (with a warning) unless the client is `Closed`. On success the
    /// client is `Open` and an [`Opened`](ConnectionEvent::Opened) event is
    /// queued; on failure it is back to `Closed` with an
    /// [`Error`](ConnectionEvent::Error) event queued. Never retries.
    pub async fn open(&mut self) {
        if self.state != ConnectionState::Closed {
            tracing::warn!(
                conn_id = %self.id,
                state = %self.state,
                "open ignored: connection already active"
            );
            return;
        }

        self.state = ConnectionState::Connecting;
        tracing::debug!(conn_id = %self.id, url = %self.url, "connecting");

        let handshake = tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(&self.url),
        )
        .await;

        let link = match handshake {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => return self.fail_handshake(e),
            Err(_) => {
                return self
                    .fail_handshake(TransportError::HandshakeTimeout(self.connect_timeout));
            }
        };

        self.active = Some(Active::spawn(link));
        self.state = ConnectionState::Open;
        tracing::info!(conn_id = %self.id, url = %self.url, "connection open");
        self.events.push_back(ConnectionEvent::Opened);
    }

    fn fail_handshake(&mut self, error: TransportError) {
        tracing::error!(conn_id = %self.id, error = %error, "handshake failed");
        self.state = ConnectionState::Closed;
        self.events.push_back(ConnectionEvent::Error(error.to_string()));
    }

    /// Queues a text frame for transmission.
    ///
    /// Fire-and-forget: there is no acknowledgement and no backpressure.
    /// Dropped with a warning unless the connection is `Open`.
    pub fn send(&self, text: impl Into<String>) {
        let active = match (&self.active, self.state) {
            (Some(active), ConnectionState::Open) => active,
            _ => {
                tracing::warn!(
                    conn_id = %self.id,
                    state = %self.state,
                    "send dropped: connection not open"
                );
                return;
            }
        };

        let text = text.into();
        tracing::debug!(conn_id = %self.id, bytes = text.len(), "sending frame");
        if active.outbound.send(Outbound::Text(text)).is_err() {
            tracing::warn!(conn_id = %self.id, "send dropped: writer has stopped");
        }
    }

    /// Closes the connection with `code`.
    ///
    /// A no-op when already `Closed`. Works from `Connecting` too, for a
    /// handshake that was abandoned before it completed. Queues a
    /// [`Closed`](ConnectionEvent::Closed) event carrying `code`.
    pub async fn close(&mut self, code: CloseCode) {
        if self.state == ConnectionState::Closed {
            return;
        }

        tracing::debug!(conn_id = %self.id, %code, "closing");
        self.state = ConnectionState::Closing;
        if let Some(active) = self.active.take() {
            active.shutdown(code).await;
        }
        self.state = ConnectionState::Closed;
        tracing::info!(conn_id = %self.id, %code, "connection closed");
        self.events.push_back(ConnectionEvent::Closed(code));
    }

    /// Delivers everything that happened since the last call.
    ///
    /// While `Open`, buffered inbound frames are turned into
    /// [`Message`](ConnectionEvent::Message) events in arrival order; a peer
    /// close or read failure moves the client to `Closed`. Lifecycle events
    /// queued by `open`/`close` are returned in any state. Never blocks.
    pub fn dispatch_queue(&mut self) -> Vec<ConnectionEvent> {
        if self.state == ConnectionState::Open {
            self.pump_inbound();
        }
        self.events.drain(..).collect()
    }

    fn pump_inbound(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let mut closed_with = None;
        loop {
            match active.inbound.try_recv() {
                Ok(Inbound::Text(text)) => {
                    self.events.push_back(ConnectionEvent::Message(text));
                }
                Ok(Inbound::Closed(code)) => {
                    closed_with = Some(code);
                    break;
                }
                Ok(Inbound::Failed(reason)) => {
                    tracing::error!(conn_id = %self.id, error = %reason, "connection failed");
                    self.events.push_back(ConnectionEvent::Error(reason));
                    closed_with = Some(CloseCode::Abnormal);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed_with = Some(CloseCode::Abnormal);
                    break;
                }
            }
        }

        if let Some(code) = closed_with {
            if let Some(active) = self.active.take() {
                active.abandon();
            }
            self.state = ConnectionState::Closed;
            tracing::info!(conn_id = %self.id, %code, "connection closed by peer");
            self.events.push_back(ConnectionEvent::Closed(code));
        }
    }
}

impl<C: Connector> Drop for ConnectionClient<C> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(conn_id = %self.id, state = %self.state, "forcing close on drop");
            active.abandon();
        }
        self.state = ConnectionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Closing.to_string(), "Closing");
    }
}
