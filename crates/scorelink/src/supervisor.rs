//! Bounded automatic reconnection around a [`ConnectionClient`].
//!
//! The supervisor owns at most one client at a time and replaces it (never
//! reuses it) on every attempt. Its state machine:
//!
//! ```text
//!                 abnormal close, attempts < max
//!   [Connected] ──────────────────────────────────→ [Pending(at)]
//!        ↑                                              │ poll() at/after `at`
//!        │ opened (attempts = 0)                        ▼
//!        └───────────────────────────────────────── [Connecting]
//!                                                       │ abnormal close / handshake
//!                                                       │ failure, attempts == max
//!                                                       ▼
//!                                                  [Exhausted]
//! ```
//!
//! A close is "abnormal" when its code is not `1000` and the owner did not
//! ask for it. A handshake that fails counts as an abnormal close (`1006`).
//!
//! The pending reconnect is a deadline, not a spawned timer: it is checked
//! by [`ReconnectSupervisor::poll`], so cancelling it is just clearing it,
//! and nothing can fire after the supervisor is dropped.

use std::sync::Arc;
use std::time::Duration;

use scorelink_transport::{
    CloseCode, ConnectionClient, ConnectionEvent, ConnectionState, Connector,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ReconnectConfig;

/// Something the supervisor observed, reported by
/// [`poll`](ReconnectSupervisor::poll).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A connection opened. The attempt counter is back to 0.
    Connected,
    /// An inbound text frame.
    Message(String),
    /// A transport failure (handshake, send or receive).
    Error(String),
    /// The connection closed with this code.
    Disconnected(CloseCode),
    /// Reconnect number `attempt` will run at `at`.
    ReconnectScheduled { attempt: u32, at: Instant },
    /// No attempts left. Terminal until [`open`](ReconnectSupervisor::open)
    /// is called again.
    Exhausted { last_error: Option<String> },
}

/// Wraps one [`ConnectionClient`] with bounded automatic reconnection.
pub struct ReconnectSupervisor<C: Connector> {
    connector: Arc<C>,
    url: String,
    connect_timeout: Duration,
    config: ReconnectConfig,
    client: Option<ConnectionClient<C>>,
    attempts: u32,
    pending: Option<Instant>,
    /// Set by `close`/`shutdown`; suppresses reconnection for the close
    /// that follows.
    close_requested: bool,
    /// The last `open` ended without a connection.
    handshake_failed: bool,
    exhausted: bool,
    last_error: Option<String>,
}

impl<C: Connector> ReconnectSupervisor<C> {
    /// Creates a supervisor. Nothing connects until [`open`](Self::open).
    pub fn new(
        connector: Arc<C>,
        url: impl Into<String>,
        connect_timeout: Duration,
        config: ReconnectConfig,
    ) -> Self {
        Self {
            connector,
            url: url.into(),
            connect_timeout,
            config,
            client: None,
            attempts: 0,
            pending: None,
            close_requested: false,
            handshake_failed: false,
            exhausted: false,
            last_error: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// State of the current client, `Closed` if there is none.
    pub fn state(&self) -> ConnectionState {
        self.client
            .as_ref()
            .map_or(ConnectionState::Closed, ConnectionClient::state)
    }

    /// Reconnect attempts scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` once automatic reconnection has given up.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// When the pending reconnect will run, if one is scheduled.
    pub fn pending_reconnect(&self) -> Option<Instant> {
        self.pending
    }

    /// The most recent transport error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Opens a connection now.
    ///
    /// A no-op (with a warning) while a connection is `Connecting` or
    /// `Open`. Otherwise any pending reconnect is cancelled, exhaustion is
    /// cleared, the attempt budget starts over, and a fresh client performs
    /// the handshake. The outcome is reported by the next
    /// [`poll`](Self::poll).
    pub async fn open(&mut self) {
        if self.state() != ConnectionState::Closed {
            warn!(url = %self.url, state = %self.state(), "open ignored: connection already active");
            return;
        }

        self.pending = None;
        self.exhausted = false;
        self.close_requested = false;
        self.attempts = 0;
        self.connect().await;
    }

    /// Queues `text` on the current connection. Dropped with a warning if
    /// there is none or it is not open.
    pub fn send(&self, text: impl Into<String>) {
        match &self.client {
            Some(client) => client.send(text),
            None => warn!(url = %self.url, "send dropped: no connection"),
        }
    }

    /// Closes the current connection with `code` and cancels any pending
    /// reconnect. The close that follows never triggers reconnection.
    pub async fn close(&mut self, code: CloseCode) {
        self.close_requested = true;
        if let Some(at) = self.pending.take() {
            debug!(url = %self.url, ?at, "pending reconnect cancelled");
        }
        if let Some(client) = self.client.as_mut() {
            client.close(code).await;
        }
    }

    /// Closes normally and releases the client. Nothing is scheduled
    /// afterwards.
    pub async fn shutdown(&mut self) {
        self.close(CloseCode::Normal).await;
        self.client = None;
        self.handshake_failed = false;
        debug!(url = %self.url, "supervisor shut down");
    }

    /// Delivers connection events and runs a reconnect that has come due.
    ///
    /// Must be called periodically; inbound frames and the reconnect timer
    /// are only observed here.
    pub async fn poll(&mut self) -> Vec<SupervisorEvent> {
        let mut events = Vec::new();
        self.drain_client(&mut events);

        let due = self.pending.is_some_and(|at| Instant::now() >= at);
        if due {
            self.pending = None;
            info!(url = %self.url, attempt = self.attempts, max = self.config.max_attempts, "reconnecting");
            self.connect().await;
            self.drain_client(&mut events);
        }

        events
    }

    /// Replaces the client with a fresh one and runs its handshake.
    ///
    /// The attempt counts as failed until the handshake completes, so a
    /// caller that drops this future mid-handshake still gets a retry
    /// scheduled on the next drain.
    async fn connect(&mut self) {
        self.handshake_failed = true;
        let mut client =
            ConnectionClient::new(Arc::clone(&self.connector), self.url.clone(), self.connect_timeout);
        client.open().await;
        self.handshake_failed = !client.is_open();
        self.client = Some(client);
    }

    fn drain_client(&mut self, events: &mut Vec<SupervisorEvent>) {
        let queued = self
            .client
            .as_mut()
            .map(ConnectionClient::dispatch_queue)
            .unwrap_or_default();

        for event in queued {
            match event {
                ConnectionEvent::Opened => {
                    self.attempts = 0;
                    self.last_error = None;
                    events.push(SupervisorEvent::Connected);
                }
                ConnectionEvent::Message(text) => events.push(SupervisorEvent::Message(text)),
                ConnectionEvent::Error(reason) => {
                    self.last_error = Some(reason.clone());
                    events.push(SupervisorEvent::Error(reason));
                }
                ConnectionEvent::Closed(code) => {
                    events.push(SupervisorEvent::Disconnected(code));
                    self.on_closed(code, events);
                }
            }
        }

        if self.handshake_failed {
            self.handshake_failed = false;
            self.on_closed(CloseCode::Abnormal, events);
        }
    }

    fn on_closed(&mut self, code: CloseCode, events: &mut Vec<SupervisorEvent>) {
        if self.close_requested {
            debug!(url = %self.url, %code, "close was requested, not reconnecting");
            return;
        }
        if code.is_normal() {
            debug!(url = %self.url, %code, "normal close, not reconnecting");
            return;
        }
        self.schedule(events);
    }

    fn schedule(&mut self, events: &mut Vec<SupervisorEvent>) {
        if self.attempts >= self.config.max_attempts {
            self.pending = None;
            self.exhausted = true;
            error!(
                url = %self.url,
                attempts = self.attempts,
                last_error = self.last_error.as_deref().unwrap_or("none"),
                "reconnection attempts exhausted"
            );
            events.push(SupervisorEvent::Exhausted {
                last_error: self.last_error.clone(),
            });
            return;
        }

        self.attempts += 1;
        let at = Instant::now() + self.config.delay;
        self.pending = Some(at);
        info!(
            url = %self.url,
            attempt = self.attempts,
            max = self.config.max_attempts,
            delay_ms = self.config.delay.as_millis() as u64,
            "reconnect scheduled"
        );
        events.push(SupervisorEvent::ReconnectScheduled {
            attempt: self.attempts,
            at,
        });
    }
}
