//! One-shot play-session validation.
//!
//! Before anything is streamed, the backend has to confirm that this play
//! session may start. The answer is one of three outcomes:
//!
//! ```text
//!                       ┌─ 2xx, SUCCESS, canStartGame ──→ CanStart(data)
//! GET play-sessions ────┼─ 2xx, anything else ─────────→ CannotStart (redirect)
//!                       ├─ 4xx ────────────────────────→ Error (redirect)
//!                       └─ 5xx / transport / bad body ──→ Error (no redirect)
//! ```
//!
//! The validator never retries; calling [`SessionValidator::validate`] again
//! is the caller's decision.

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{ApiConfig, SessionContext, SessionError, StatusSignal};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `GET /api/play-sessions/{id}`.
///
/// Absent or null fields fall back to their defaults, so an incomplete
/// object is a denial rather than a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaySessionResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<PlaySessionData>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// What the backend knows about the play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySessionData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub can_start_game: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub save_results: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// ValidationOutcome
// ---------------------------------------------------------------------------

/// The decision reached by [`SessionValidator::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The session may start.
    CanStart(PlaySessionData),

    /// The backend explicitly denied the session. Terminal; the caller
    /// should send the user to the failure page.
    CannotStart(String),

    /// The request failed or the answer was unreadable.
    ///
    /// `redirect` is `true` only for client-range statuses (400–499).
    Error { message: String, redirect: bool },
}

impl ValidationOutcome {
    /// Returns `true` if this outcome should send the user to the failure
    /// page.
    pub fn requires_failure_redirect(&self) -> bool {
        match self {
            Self::CanStart(_) => false,
            Self::CannotStart(_) => true,
            Self::Error { redirect, .. } => *redirect,
        }
    }

    fn error(err: SessionError) -> Self {
        let redirect = matches!(err.status(), Some(400..=499));
        Self::Error {
            message: err.to_string(),
            redirect,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionValidator
// ---------------------------------------------------------------------------

/// Asks the backend whether a play session may start.
pub struct SessionValidator {
    http: reqwest::Client,
    api: ApiConfig,
    status: StatusSignal,
}

impl SessionValidator {
    /// Creates a validator with its own HTTP client and status signal.
    ///
    /// # Errors
    /// Returns [`SessionError::Http`] if the HTTP client cannot be built.
    pub fn new(api: ApiConfig) -> Result<Self, SessionError> {
        let http = crate::http_client(&api)?;
        Ok(Self::with_client(http, api, StatusSignal::new()))
    }

    /// Creates a validator that reuses `http` and reports into `status`.
    pub fn with_client(http: reqwest::Client, api: ApiConfig, status: StatusSignal) -> Self {
        Self { http, api, status }
    }

    /// Returns the endpoint configuration.
    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Subscribes to the "request in flight" signal.
    pub fn subscribe_status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Validates the play session described by `ctx`.
    ///
    /// Issues exactly one request. The status signal is raised before the
    /// request starts and lowered once it has finished, whatever the
    /// outcome.
    pub async fn validate(&self, ctx: &SessionContext) -> ValidationOutcome {
        let _busy = self.status.busy();
        let session_id = ctx.session_id();

        let body = match self.fetch(ctx).await {
            Ok(body) => body,
            Err(e) => {
                error!(session_id, error = %e, "play-session request failed");
                return ValidationOutcome::error(e);
            }
        };

        let response: PlaySessionResponse = match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(e) => {
                error!(session_id, error = %e, "play-session response did not parse");
                return ValidationOutcome::error(SessionError::Parse(e));
            }
        };

        match response.data {
            Some(data) if response.status.as_deref() == Some("SUCCESS") && data.can_start_game => {
                info!(session_id, username = %data.username, "play session can start");
                ValidationOutcome::CanStart(data)
            }
            _ => {
                warn!(session_id, status = ?response.status, "play session cannot start");
                ValidationOutcome::CannotStart("Test cannot start".into())
            }
        }
    }

    async fn fetch(&self, ctx: &SessionContext) -> Result<String, SessionError> {
        let url = self.api.validation_url(ctx)?;
        debug!(%url, "validating play session");

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(SessionError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}
