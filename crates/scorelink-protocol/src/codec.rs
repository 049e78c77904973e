//! Codec trait and implementations for text frames.
//!
//! The streaming backend speaks text frames, so a codec here converts
//! between Rust types and `String`s rather than raw bytes. The rest of the
//! stack only depends on the [`Codec`] trait; [`JsonCodec`] is the one the
//! backend understands.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to text frames and decode them back.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means the decoded value owns
/// all its data, so the frame can be dropped right after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or doesn't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use scorelink_protocol::{Codec, JsonCodec, ScoreMessage, ScoreMetric};
///
/// let codec = JsonCodec;
/// let msg = ScoreMessage::new("buttonsmash").with_metric(ScoreMetric::score(12.0));
///
/// let frame = codec.encode(&msg).unwrap();
/// let decoded: ScoreMessage = codec.decode(&frame).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
