//! The session flow, from validation to the final redirect.
//!
//! ```text
//!         start()            CanStart             Connected
//! [Idle] ────────→ [Validating] ────→ [Ready] ───────────→ [Streaming]
//!                      │  │                 │                    │
//!          CannotStart │  │ Error           └──── submit_result ─┤
//!                      ▼  ▼                                      ▼
//!               [Denied] [ValidationError]                 [Submitting]
//!                            │ retry_validation()           │ ok     │ failed
//!                            └──→ [Validating]              ▼        └─→ back to
//!                                                     [Redirecting]       Ready/Streaming
//!                                                           │ grace elapsed
//!                                                           ▼
//!                                                      [Completed]
//! ```
//!
//! The coordinator is owned by one control task. Everything that happens
//! asynchronously (inbound frames, reconnect deadlines, the redirect
//! deadline) is only acted on inside [`SessionCoordinator::pump`].
//! Requests borrow the coordinator mutably for their whole duration, so a
//! response can never land in a phase other than the one that sent it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use scorelink_protocol::{Codec, JsonCodec, ProtocolError, ScoreMessage, ScoreResponse};
use scorelink_session::{
    PlaySessionData, ResultSubmitter, SessionContext, SessionError, SessionParams,
    SessionValidator, StatusSignal, ValidationOutcome,
};
use scorelink_transport::{CloseCode, Connector};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    ClientConfig, MessageCorrelator, Navigator, ReconnectSupervisor, ScorelinkError,
    SupervisorEvent, TickDriver,
};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the session flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session parameters yet.
    Idle,
    /// Waiting for the validation response.
    Validating,
    /// The backend refused the session. Terminal.
    Denied,
    /// Validation failed; [`retry_validation`](SessionCoordinator::retry_validation)
    /// may be called.
    ValidationError,
    /// Validated; the stream is being opened.
    Ready,
    /// The stream is open (or recovering).
    Streaming,
    /// Waiting for the result submission response.
    Submitting,
    /// Results saved; waiting out the grace period before redirecting.
    Redirecting,
    /// Success redirect issued. Terminal.
    Completed,
    /// Reconnection gave up and the user was sent to the failure page.
    /// Terminal. Only reached with `redirect_on_exhaustion`.
    Failed,
}

impl Phase {
    /// `true` for phases the flow never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Denied | Self::Completed | Self::Failed)
    }

    /// `true` while scores may be streamed.
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Ready | Self::Streaming)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// CoordinatorEvent
// ---------------------------------------------------------------------------

/// Something that happened during the flow, reported by
/// [`pump`](SessionCoordinator::pump).
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// The backend allowed the session.
    Validated(PlaySessionData),
    /// The backend refused the session.
    Denied(String),
    /// Validation could not be completed.
    ValidationFailed { message: String, redirect: bool },
    /// The stream opened.
    Connected,
    /// The stream closed.
    Disconnected(CloseCode),
    /// A stream transport failure.
    TransportError(String),
    ReconnectScheduled { attempt: u32, at: Instant },
    ReconnectExhausted { last_error: Option<String> },
    /// A score reply arrived.
    Score(ScoreResponse),
    /// An inbound frame that is not a score reply.
    MalformedFrame(String),
    ResultsSaved,
    ResultsFailed(String),
    /// The user was sent to this URL.
    Redirected(String),
}

// ---------------------------------------------------------------------------
// SessionCoordinator
// ---------------------------------------------------------------------------

/// Sequences validation, streaming, submission and redirect for the one
/// play session of this process.
pub struct SessionCoordinator<C: Connector, N: Navigator> {
    config: ClientConfig,
    phase: Phase,
    context: Option<SessionContext>,
    validator: SessionValidator,
    submitter: ResultSubmitter,
    status: StatusSignal,
    supervisor: ReconnectSupervisor<C>,
    correlator: MessageCorrelator,
    codec: JsonCodec,
    navigator: N,
    redirect_at: Option<Instant>,
    events: VecDeque<CoordinatorEvent>,
}

impl<C: Connector, N: Navigator> SessionCoordinator<C, N> {
    /// Wires up all components from `config`.
    ///
    /// # Errors
    /// Returns [`ScorelinkError::Session`] if the HTTP client cannot be
    /// built.
    pub fn new(config: ClientConfig, connector: Arc<C>, navigator: N) -> Result<Self, ScorelinkError> {
        let http = scorelink_session::http_client(&config.api)?;
        let status = StatusSignal::new();
        let validator =
            SessionValidator::with_client(http.clone(), config.api.clone(), status.clone());
        let submitter = ResultSubmitter::with_client(http, config.api.clone(), status.clone());
        let supervisor = ReconnectSupervisor::new(
            connector,
            config.ws_url.clone(),
            config.connect_timeout,
            config.reconnect,
        );
        let correlator = MessageCorrelator::new(config.correlation.clone(), config.listener_capacity);

        Ok(Self {
            config,
            phase: Phase::Idle,
            context: None,
            validator,
            submitter,
            status,
            supervisor,
            correlator,
            codec: JsonCodec,
            navigator,
            redirect_at: None,
            events: VecDeque::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The session this coordinator is scoped to, once started.
    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The streaming supervisor, for inspection.
    pub fn supervisor(&self) -> &ReconnectSupervisor<C> {
        &self.supervisor
    }

    /// When the success redirect will be issued, while `Redirecting`.
    pub fn redirect_deadline(&self) -> Option<Instant> {
        self.redirect_at
    }

    pub fn subscribe_scores(&self) -> broadcast::Receiver<ScoreResponse> {
        self.correlator.subscribe_scores()
    }

    pub fn subscribe_raw(&self) -> broadcast::Receiver<String> {
        self.correlator.subscribe_raw()
    }

    /// `true` while a validation or submission request is in flight.
    pub fn subscribe_status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Starts the flow with the host page's session parameters.
    ///
    /// Only allowed once, from `Idle`. Validates the session and, if it may
    /// start, opens the stream. Returns the phase reached.
    ///
    /// # Errors
    /// - [`ScorelinkError::InvalidPhase`] if already started.
    /// - [`ScorelinkError::Session`] with `MissingSessionId` if the session
    ///   id is empty. The validator is not called and the coordinator
    ///   stays `Idle`.
    pub async fn start(&mut self, params: SessionParams) -> Result<Phase, ScorelinkError> {
        self.expect_phase("start", |p| p == Phase::Idle)?;

        let ctx = SessionContext::from_params(params).inspect_err(|e| {
            warn!(error = %e, "cannot start session");
        })?;
        info!(session_id = ctx.session_id(), variant = ctx.variant(), "session parameters received");
        self.context = Some(ctx);

        self.validate().await
    }

    /// Runs validation again after a [`ValidationError`](Phase::ValidationError).
    ///
    /// # Errors
    /// Returns [`ScorelinkError::InvalidPhase`] from any other phase.
    pub async fn retry_validation(&mut self) -> Result<Phase, ScorelinkError> {
        self.expect_phase("retry_validation", |p| p == Phase::ValidationError)?;
        self.validate().await
    }

    async fn validate(&mut self) -> Result<Phase, ScorelinkError> {
        let Some(ctx) = self.context.clone() else {
            return Err(SessionError::MissingSessionId.into());
        };

        self.set_phase(Phase::Validating);
        let outcome = self.validator.validate(&ctx).await;
        let failure_redirect = outcome.requires_failure_redirect();

        match outcome {
            ValidationOutcome::CanStart(data) => {
                self.set_phase(Phase::Ready);
                self.events.push_back(CoordinatorEvent::Validated(data));
                self.supervisor.open().await;
            }
            ValidationOutcome::CannotStart(reason) => {
                self.set_phase(Phase::Denied);
                self.events.push_back(CoordinatorEvent::Denied(reason));
            }
            ValidationOutcome::Error { message, redirect } => {
                self.set_phase(Phase::ValidationError);
                self.events
                    .push_back(CoordinatorEvent::ValidationFailed { message, redirect });
            }
        }

        if failure_redirect {
            let url = self.config.api.failure_url();
            self.redirect(url);
        }
        Ok(self.phase)
    }

    /// Tags, encodes and streams one score message.
    ///
    /// Returns the correlation id attached, if any. Outside `Ready` and
    /// `Streaming` the message is dropped with a warning and `Ok(None)` is
    /// returned. Delivery is best-effort.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the message has no game or cannot be
    /// encoded.
    pub fn send_score(&mut self, mut message: ScoreMessage) -> Result<Option<String>, ProtocolError> {
        if !self.phase.is_streaming() {
            warn!(phase = %self.phase, game = %message.game, "score dropped: not streaming");
            return Ok(None);
        }

        message.check()?;
        let id = self.correlator.tag(&mut message);
        let frame = self.codec.encode(&message)?;
        debug!(game = %message.game, message_id = ?id, "streaming score");
        self.supervisor.send(frame);
        Ok(id)
    }

    /// Submits the final score for `game`.
    ///
    /// On success the flow moves to `Redirecting` and the success redirect
    /// is issued by the first [`pump`](Self::pump) at or after
    /// `now + redirect_grace`. On failure the phase is restored and the
    /// error returned; nothing is retried.
    ///
    /// # Errors
    /// - [`ScorelinkError::InvalidPhase`] outside `Ready` and `Streaming`.
    /// - [`ScorelinkError::Session`] if the request failed.
    pub async fn submit_result(&mut self, game: &str, score: f64) -> Result<(), ScorelinkError> {
        let prior = self.expect_phase("submit_result", Phase::is_streaming)?;
        let Some(ctx) = self.context.clone() else {
            return Err(SessionError::MissingSessionId.into());
        };

        self.set_phase(Phase::Submitting);
        let submitted = self.submitter.submit(&ctx, game, score).await;
        match submitted {
            Ok(()) => {
                let at = Instant::now() + self.config.redirect_grace;
                self.redirect_at = Some(at);
                self.set_phase(Phase::Redirecting);
                self.events.push_back(CoordinatorEvent::ResultsSaved);
                Ok(())
            }
            Err(e) => {
                self.set_phase(prior);
                self.events
                    .push_back(CoordinatorEvent::ResultsFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Reopens the stream after exhaustion or a manual close.
    pub async fn reconnect(&mut self) {
        if !self.phase.is_streaming() {
            warn!(phase = %self.phase, "reconnect ignored: not streaming");
            return;
        }
        self.supervisor.open().await;
    }

    /// Runs one step of the cooperative loop.
    ///
    /// Delivers stream events and inbound frames, fires a due reconnect,
    /// and issues the success redirect once its deadline has passed.
    /// Returns everything that happened since the previous call, in order.
    pub async fn pump(&mut self) -> Vec<CoordinatorEvent> {
        for event in self.supervisor.poll().await {
            self.on_supervisor_event(event).await;
        }

        let redirect_due = self.phase == Phase::Redirecting
            && self.redirect_at.is_some_and(|at| Instant::now() >= at);
        if redirect_due {
            self.redirect_at = None;
            let url = self.config.api.progress_url();
            self.redirect(url);
            self.supervisor.close(CloseCode::Normal).await;
            self.set_phase(Phase::Completed);
        }

        self.events.drain(..).collect()
    }

    async fn on_supervisor_event(&mut self, event: SupervisorEvent) {
        let mapped = match event {
            SupervisorEvent::Connected => {
                if self.phase == Phase::Ready {
                    self.set_phase(Phase::Streaming);
                }
                CoordinatorEvent::Connected
            }
            SupervisorEvent::Message(text) => match self.correlator.dispatch(&text) {
                Ok(response) => CoordinatorEvent::Score(response),
                Err(_) => CoordinatorEvent::MalformedFrame(text),
            },
            SupervisorEvent::Error(reason) => CoordinatorEvent::TransportError(reason),
            SupervisorEvent::Disconnected(code) => CoordinatorEvent::Disconnected(code),
            SupervisorEvent::ReconnectScheduled { attempt, at } => {
                CoordinatorEvent::ReconnectScheduled { attempt, at }
            }
            SupervisorEvent::Exhausted { last_error } => {
                self.events.push_back(CoordinatorEvent::ReconnectExhausted { last_error });
                if self.config.redirect_on_exhaustion && self.phase.is_streaming() {
                    self.supervisor.shutdown().await;
                    let url = self.config.api.failure_url();
                    self.redirect(url);
                    self.set_phase(Phase::Failed);
                }
                return;
            }
        };
        self.events.push_back(mapped);
    }

    /// Pumps once per tick until the flow reaches a phase it cannot leave
    /// on its own, passing every event to `on_event`. Returns that phase.
    ///
    /// Stops at terminal phases and at `Idle`/`ValidationError`, which
    /// wait for the caller. Keeps running while `Ready`/`Streaming`.
    pub async fn run<F>(&mut self, driver: &mut TickDriver, mut on_event: F) -> Phase
    where
        F: FnMut(&CoordinatorEvent),
    {
        loop {
            for event in self.pump().await {
                on_event(&event);
            }
            if self.phase.is_terminal() || matches!(self.phase, Phase::Idle | Phase::ValidationError)
            {
                return self.phase;
            }
            driver.wait_for_tick().await;
        }
    }

    /// Closes the stream and drops any pending reconnect or redirect.
    pub async fn shutdown(&mut self) {
        self.redirect_at = None;
        self.supervisor.shutdown().await;
        info!(phase = %self.phase, "coordinator shut down");
    }

    fn expect_phase(
        &self,
        operation: &'static str,
        allowed: impl Fn(Phase) -> bool,
    ) -> Result<Phase, ScorelinkError> {
        if allowed(self.phase) {
            Ok(self.phase)
        } else {
            warn!(operation, phase = %self.phase, "operation not allowed in this phase");
            Err(ScorelinkError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "phase change");
            self.phase = phase;
        }
    }

    fn redirect(&mut self, url: String) {
        info!(%url, "redirecting");
        self.navigator.navigate(&url);
        self.events.push_back(CoordinatorEvent::Redirected(url));
    }
}
