//! Unified error type for Scorelink.

use scorelink_protocol::ProtocolError;
use scorelink_session::SessionError;
use scorelink_transport::TransportError;

use crate::Phase;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ScorelinkError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (missing id, HTTP, bad response).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The coordinator was asked to do something its current phase does
    /// not allow.
    #[error("{operation} not allowed while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },
}
