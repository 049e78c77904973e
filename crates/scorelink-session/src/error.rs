//! Error types for the session layer.

/// Errors that can occur while talking to the session backend.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session parameters carried no play-session id, so there is
    /// nothing to validate or submit against.
    #[error("missing session id")]
    MissingSessionId,

    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// The body did not match the expected shape.
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A configured base URL could not be turned into an endpoint URL.
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl SessionError {
    /// Returns the HTTP status if this error came from a status response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
