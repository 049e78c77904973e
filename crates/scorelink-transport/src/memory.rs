//! In-process connector that speaks the link protocol over channels.
//!
//! Each scripted connect either hands back a link paired with a
//! [`MemoryPeer`], refuses, or stalls forever. The peer plays the backend:
//! it reads what the client sent and pushes frames or close codes back.
//! Dropping the peer without closing looks like a network drop (`1006`).
//!
//! ```rust
//! # async fn demo() {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use scorelink_transport::{ConnectionClient, ConnectionEvent};
//! use scorelink_transport::memory::{MemoryConnector, PeerFrame};
//!
//! let connector = Arc::new(MemoryConnector::new());
//! let mut peer = connector.accept_next();
//!
//! let mut client = ConnectionClient::new(connector, "memory://scores", Duration::from_secs(1));
//! client.open().await;
//! client.send(r#"{"game":"observe","data":[]}"#);
//!
//! assert!(matches!(peer.recv().await, Some(PeerFrame::Text(_))));
//! assert_eq!(client.dispatch_queue(), vec![ConnectionEvent::Opened]);
//! # }
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::{CloseCode, Connector, Incoming, Link, TransportError};

/// A frame the client wrote, as seen by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFrame {
    /// A text frame.
    Text(String),
    /// The client's close frame.
    Close(CloseCode),
}

enum Script {
    Accept(MemoryLink),
    Refuse(String),
    Stall,
}

/// A [`Connector`] whose handshakes are scripted by the test.
///
/// Connect attempts consume the script front to back; once it is empty
/// every attempt is refused.
#[derive(Default)]
pub struct MemoryConnector {
    script: Mutex<VecDeque<Script>>,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    /// Creates a connector with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next connect to succeed, returning the backend side.
    pub fn accept_next(&self) -> MemoryPeer {
        let (to_peer, from_client) = mpsc::unbounded_channel();
        let (to_client, from_peer) = mpsc::unbounded_channel();
        self.push(Script::Accept(MemoryLink {
            to_peer,
            from_peer: tokio::sync::Mutex::new(from_peer),
        }));
        MemoryPeer {
            to_client,
            from_client,
        }
    }

    /// Scripts the next connect to be refused with `reason`.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.push(Script::Refuse(reason.into()));
    }

    /// Scripts the next connect to never complete.
    pub fn stall_next(&self) {
        self.push(Script::Stall);
    }

    /// Number of connect attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn push(&self, step: Script) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }
}

impl Connector for MemoryConnector {
    type Link = MemoryLink;

    async fn connect(&self, url: &str) -> Result<MemoryLink, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            script.pop_front()
        };

        match next {
            Some(Script::Accept(link)) => Ok(link),
            Some(Script::Refuse(reason)) => Err(TransportError::ConnectFailed(
                io::Error::new(io::ErrorKind::ConnectionRefused, reason),
            )),
            Some(Script::Stall) => std::future::pending().await,
            None => Err(TransportError::ConnectFailed(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no peer scripted for {url}"),
            ))),
        }
    }
}

/// Client side of an in-memory connection.
pub struct MemoryLink {
    to_peer: mpsc::UnboundedSender<PeerFrame>,
    from_peer: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
}

impl Link for MemoryLink {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.to_peer.send(PeerFrame::Text(text)).map_err(|_| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer went away",
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Incoming>, TransportError> {
        Ok(self.from_peer.lock().await.recv().await)
    }

    async fn close(&self, code: CloseCode) -> Result<(), TransportError> {
        // The peer may already be gone; a close to nobody is still a close.
        let _ = self.to_peer.send(PeerFrame::Close(code));
        Ok(())
    }
}

/// Backend side of an in-memory connection.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<Incoming>,
    from_client: mpsc::UnboundedReceiver<PeerFrame>,
}

impl MemoryPeer {
    /// Pushes a text frame to the client. Returns `false` if the client's
    /// reader is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(Incoming::Text(text.into())).is_ok()
    }

    /// Closes the connection from the backend side with `code`.
    pub fn close(&self, code: CloseCode) {
        let _ = self.to_client.send(Incoming::Closed(code));
    }

    /// Waits for the next frame written by the client.
    ///
    /// Returns `None` once the client side is gone and everything it sent
    /// has been read.
    pub async fn recv(&mut self) -> Option<PeerFrame> {
        self.from_client.recv().await
    }

    /// Returns the next frame written by the client, if one is buffered.
    pub fn try_recv(&mut self) -> Option<PeerFrame> {
        self.from_client.try_recv().ok()
    }
}
