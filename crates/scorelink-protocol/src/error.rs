//! Error types for the protocol layer.
//!
//! Each crate in Scorelink defines its own error enum, so a
//! `ProtocolError` always means the problem is in the shape of a frame,
//! not in the network or the backend's HTTP answers.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a frame).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning a frame into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or wrong
    /// data types.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope parsed but breaks a protocol rule, e.g. a score
    /// message with no game id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
