//! # Scorelink
//!
//! Client-side session flow against a remote scoring backend.
//!
//! A play session goes through three stages:
//!
//! 1. **Validation**: one HTTP request asks the backend whether the session
//!    may start. Denials and client errors send the user to a failure page.
//! 2. **Streaming**: a persistent connection carries score messages out and
//!    score replies back. Abnormal drops are retried a bounded number of
//!    times.
//! 3. **Submission**: the final score is posted, and after a short grace
//!    period the user is sent onward.
//!
//! [`SessionCoordinator`] sequences the three. It is single-owner and
//! cooperative: nothing happens to it between calls, and inbound frames
//! surface only when [`SessionCoordinator::pump`] runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scorelink::prelude::*;
//!
//! # async fn demo() -> Result<(), ScorelinkError> {
//! let config = ClientConfig::builder().build();
//! let mut coordinator =
//!     SessionCoordinator::new(config, Arc::new(WebSocketConnector), LogNavigator)?;
//!
//! coordinator.start(SessionParams::with_session_id("3f2b...")).await?;
//! coordinator.send_score(ScoreMessage::new("observe").with_metric(ScoreMetric::score(12.0)))?;
//! coordinator.submit_result("observe", 12.0).await?;
//!
//! let mut driver = TickDriver::new(30);
//! coordinator.run(&mut driver, |event| println!("{event:?}")).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod correlator;
mod error;
mod navigator;
mod supervisor;
mod tick;

pub use config::{ClientConfig, ClientConfigBuilder, CorrelationConfig, ReconnectConfig};
pub use coordinator::{CoordinatorEvent, Phase, SessionCoordinator};
pub use correlator::MessageCorrelator;
pub use error::ScorelinkError;
pub use navigator::{LogNavigator, Navigator};
pub use supervisor::{ReconnectSupervisor, SupervisorEvent};
pub use tick::{TickDriver, TickInfo};

pub use scorelink_protocol as protocol;
pub use scorelink_session as session;
pub use scorelink_transport as transport;

/// Convenience re-exports for the common case.
pub mod prelude {
    pub use crate::{
        ClientConfig, CoordinatorEvent, LogNavigator, Navigator, Phase, ScorelinkError,
        SessionCoordinator, TickDriver,
    };
    pub use scorelink_protocol::{ScoreMessage, ScoreMetric, ScoreResponse};
    pub use scorelink_session::SessionParams;
    pub use scorelink_transport::CloseCode;
    #[cfg(feature = "websocket")]
    pub use scorelink_transport::WebSocketConnector;
}
