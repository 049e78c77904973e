//! Final result submission.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::{ApiConfig, SessionContext, SessionError, StatusSignal};

/// Body of `POST /api/results/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub game: String,
    pub variant: String,
    pub input: String,
    pub results: SubmittedResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedResults {
    pub score: f64,
}

/// Posts a session's final score to the backend.
///
/// One request per call and no retry. The response body is ignored; only
/// a 2xx status counts as success.
pub struct ResultSubmitter {
    http: reqwest::Client,
    api: ApiConfig,
    status: StatusSignal,
}

impl ResultSubmitter {
    /// Creates a submitter with its own HTTP client and status signal.
    ///
    /// # Errors
    /// Returns [`SessionError::Http`] if the HTTP client cannot be built.
    pub fn new(api: ApiConfig) -> Result<Self, SessionError> {
        let http = crate::http_client(&api)?;
        Ok(Self::with_client(http, api, StatusSignal::new()))
    }

    /// Creates a submitter that reuses `http` and reports into `status`.
    pub fn with_client(http: reqwest::Client, api: ApiConfig, status: StatusSignal) -> Self {
        Self { http, api, status }
    }

    /// Subscribes to the "request in flight" signal.
    pub fn subscribe_status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Submits `score` for `game` under the session in `ctx`.
    ///
    /// # Errors
    /// - [`SessionError::Http`] if the request could not be completed.
    /// - [`SessionError::Status`] if the backend answered with a non-2xx
    ///   status.
    pub async fn submit(
        &self,
        ctx: &SessionContext,
        game: &str,
        score: f64,
    ) -> Result<(), SessionError> {
        let _busy = self.status.busy();
        let url = self.api.results_url(ctx)?;
        let body = ResultSubmission {
            game: game.to_owned(),
            variant: ctx.variant().to_owned(),
            input: ctx.input().to_owned(),
            results: SubmittedResults { score },
        };
        debug!(%url, game, score, "submitting results");

        let response = self.http.post(url).json(&body).send().await.map_err(|e| {
            error!(session_id = ctx.session_id(), error = %e, "result submission failed");
            SessionError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                session_id = ctx.session_id(),
                status = status.as_u16(),
                "result submission rejected"
            );
            return Err(SessionError::Status(status.as_u16()));
        }

        info!(session_id = ctx.session_id(), game, score, "results saved");
        Ok(())
    }
}
