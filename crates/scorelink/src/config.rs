//! Client configuration.
//!
//! Every knob has a default matching the deployed backend, so most callers
//! only touch the fields they care about:
//!
//! ```rust
//! use std::time::Duration;
//! use scorelink::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .base_url("http://localhost:4000")
//!     .ws_url("ws://localhost:4000/websocket")
//!     .reconnect_delay(Duration::from_secs(1))
//!     .build();
//!
//! assert_eq!(config.reconnect.max_attempts, 3);
//! ```

use std::collections::HashSet;
use std::time::Duration;

use scorelink_session::ApiConfig;

// ---------------------------------------------------------------------------
// ReconnectConfig
// ---------------------------------------------------------------------------

/// Bounded automatic reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Fixed delay between an abnormal close and the next attempt.
    ///
    /// Default: 5 seconds.
    pub delay: Duration,

    /// Attempts allowed since the last successful open. 0 disables
    /// automatic reconnection.
    ///
    /// Default: 3.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// CorrelationConfig
// ---------------------------------------------------------------------------

/// Which outbound messages get a client-generated `messageId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationConfig {
    /// Prefix of generated ids (`p1`, `p2`, ...).
    pub prefix: String,

    /// Game variants whose messages are correlated.
    pub games: HashSet<String>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            prefix: "p".into(),
            games: HashSet::from(["aim-gridshot".to_owned()]),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything a [`SessionCoordinator`](crate::SessionCoordinator) needs to
/// know about the backend and its own timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP endpoints for validation, submission and redirects.
    pub api: ApiConfig,

    /// Streaming endpoint.
    ///
    /// Default: `wss://test.bardtest.gg/websocket`.
    pub ws_url: String,

    /// Upper bound on a single streaming handshake.
    ///
    /// Default: 10 seconds.
    pub connect_timeout: Duration,

    pub reconnect: ReconnectConfig,

    /// Pause between a successful submission and the success redirect.
    ///
    /// Default: 2 seconds.
    pub redirect_grace: Duration,

    /// Rate of the driver loop that pumps inbound frames.
    ///
    /// Default: 30 Hz.
    pub tick_rate_hz: u32,

    pub correlation: CorrelationConfig,

    /// Buffer size of each listener topic. Slow listeners that fall this
    /// far behind skip ahead.
    ///
    /// Default: 64.
    pub listener_capacity: usize,

    /// Also send the user to the failure page when reconnection gives up.
    ///
    /// Default: `false`.
    pub redirect_on_exhaustion: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            ws_url: "wss://test.bardtest.gg/websocket".into(),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            redirect_grace: Duration::from_secs(2),
            tick_rate_hz: 30,
            correlation: CorrelationConfig::default(),
            listener_capacity: 64,
            redirect_on_exhaustion: false,
        }
    }
}

impl ClientConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

// ---------------------------------------------------------------------------
// ClientConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn game_id(mut self, game_id: impl Into<String>) -> Self {
        self.config.api.game_id = game_id.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.api.request_timeout = timeout;
        self
    }

    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.config.ws_url = url.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.delay = delay;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect.max_attempts = attempts;
        self
    }

    pub fn redirect_grace(mut self, grace: Duration) -> Self {
        self.config.redirect_grace = grace;
        self
    }

    pub fn tick_rate_hz(mut self, hz: u32) -> Self {
        self.config.tick_rate_hz = hz;
        self
    }

    pub fn correlation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.correlation.prefix = prefix.into();
        self
    }

    /// Adds a game variant to the correlated set.
    pub fn correlate_game(mut self, game: impl Into<String>) -> Self {
        self.config.correlation.games.insert(game.into());
        self
    }

    /// Replaces the correlated set.
    pub fn correlated_games<I, S>(mut self, games: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.correlation.games = games.into_iter().map(Into::into).collect();
        self
    }

    pub fn listener_capacity(mut self, capacity: usize) -> Self {
        self.config.listener_capacity = capacity;
        self
    }

    pub fn redirect_on_exhaustion(mut self, enabled: bool) -> Self {
        self.config.redirect_on_exhaustion = enabled;
        self
    }

    /// Finishes the builder. A zero listener capacity is raised to 1.
    pub fn build(mut self) -> ClientConfig {
        self.config.listener_capacity = self.config.listener_capacity.max(1);
        self.config
    }
}
