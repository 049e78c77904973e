//! Backend endpoint configuration.

use std::time::Duration;

use reqwest::Url;

use crate::{SessionContext, SessionError};

/// Where the scoring backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Scheme and host (and optional path prefix) of the backend.
    ///
    /// Default: `https://test.bardtest.gg`.
    pub base_url: String,

    /// Game id sent as the `game` query parameter on validation.
    ///
    /// Default: `unity-demo`.
    pub game_id: String,

    /// Per-request timeout for validation and submission.
    ///
    /// Default: 10 seconds.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://test.bardtest.gg".into(),
            game_id: "unity-demo".into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ApiConfig {
    /// `GET {base}/api/play-sessions/{id}?game=..&input=..&variant=..`
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidUrl`] if `base_url` is not a valid
    /// base URL.
    pub fn validation_url(&self, ctx: &SessionContext) -> Result<Url, SessionError> {
        let mut url = self.endpoint(&["api", "play-sessions", ctx.session_id()])?;
        url.query_pairs_mut()
            .append_pair("game", &self.game_id)
            .append_pair("input", ctx.input())
            .append_pair("variant", ctx.variant());
        Ok(url)
    }

    /// `POST {base}/api/results/{id}`
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidUrl`] if `base_url` is not a valid
    /// base URL.
    pub fn results_url(&self, ctx: &SessionContext) -> Result<Url, SessionError> {
        self.endpoint(&["api", "results", ctx.session_id()])
    }

    /// Page the user is sent to when the session cannot go on.
    pub fn failure_url(&self) -> String {
        format!("{}/failed-play-session", self.base_url.trim_end_matches('/'))
    }

    /// Page the user is sent to after results were saved.
    pub fn progress_url(&self) -> String {
        format!(
            "{}/progressing-play-session",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SessionError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SessionError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| SessionError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
