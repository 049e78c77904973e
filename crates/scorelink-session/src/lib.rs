//! Play-session validation and result submission for Scorelink.
//!
//! Everything in this crate talks to the scoring backend over plain HTTP,
//! one request at a time:
//!
//! 1. **Validation**: before any streaming, ask the backend whether this
//!    play session may start ([`SessionValidator`]).
//! 2. **Submission**: when the run is over, post the final score
//!    ([`ResultSubmitter`]).
//!
//! Both are scoped to a single [`SessionContext`] built from the session
//! parameters the host page hands us.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← decides when to validate, submit and redirect
//!     ↕
//! Session Layer (this crate)  ← one-shot HTTP requests, outcome types
//!     ↕
//! Scoring backend  ← GET /api/play-sessions/{id}, POST /api/results/{id}
//! ```

mod api;
mod context;
mod error;
mod results;
mod status;
mod validator;

pub use api::ApiConfig;
pub use context::{SessionContext, SessionParams};
pub use error::SessionError;
pub use results::{ResultSubmission, ResultSubmitter, SubmittedResults};
pub use status::{BusyGuard, StatusSignal};
pub use validator::{PlaySessionData, PlaySessionResponse, SessionValidator, ValidationOutcome};

/// Builds the HTTP client shared by the validator and the submitter.
///
/// # Errors
/// Returns [`SessionError::Http`] if the TLS backend cannot be initialised.
pub fn http_client(api: &ApiConfig) -> Result<reqwest::Client, SessionError> {
    let client = reqwest::Client::builder()
        .timeout(api.request_timeout)
        .user_agent(concat!("scorelink/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
