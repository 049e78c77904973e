//! Wire protocol for Scorelink's streaming channel.
//!
//! This crate defines what travels over the socket:
//!
//! - **Types** ([`ScoreMessage`], [`ScoreMetric`], [`ScoreResponse`]):
//!   outbound telemetry envelopes and inbound score replies.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those envelopes are
//!   converted to and from text frames.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The metric bodies are opaque: each game variant fills in its own fields
//! and the core only guarantees the envelope survives the trip.
//!
//! ```text
//! Transport (text frames) → Protocol (envelopes) → Coordinator (listeners)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ScoreMessage, ScoreMetric, ScoreResponse};
