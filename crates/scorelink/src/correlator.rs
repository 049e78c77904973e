//! Outbound message tagging and inbound reply fan-out.
//!
//! Some game variants need their replies matched back to the request that
//! produced them. For those, the correlator stamps every outbound
//! [`ScoreMessage`] with a client-generated id (`p1`, `p2`, ...) from one
//! monotonically increasing counter. Other variants go out untagged.
//!
//! Matching is best-effort. There is no table of pending requests: every
//! inbound reply is broadcast to all listeners, and a listener that cares
//! about a particular request compares `message_id` itself. Replies that
//! never arrive are never noticed.
//!
//! Two topics are published:
//!
//! | Topic | Payload | Receives |
//! |---|---|---|
//! | scores | [`ScoreResponse`] | every inbound frame that decodes |
//! | raw | `String` | every inbound frame, decodable or not |

use std::collections::HashSet;

use scorelink_protocol::{Codec, JsonCodec, ProtocolError, ScoreMessage, ScoreResponse};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::CorrelationConfig;

/// Tags outbound messages and broadcasts inbound replies.
pub struct MessageCorrelator {
    prefix: String,
    next_id: u64,
    games: HashSet<String>,
    codec: JsonCodec,
    scores: broadcast::Sender<ScoreResponse>,
    raw: broadcast::Sender<String>,
}

impl MessageCorrelator {
    /// Creates a correlator. `capacity` is the per-topic buffer size
    /// (raised to 1 if zero).
    pub fn new(config: CorrelationConfig, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (scores, _) = broadcast::channel(capacity);
        let (raw, _) = broadcast::channel(capacity);

        Self {
            prefix: config.prefix,
            next_id: 1,
            games: config.games,
            codec: JsonCodec,
            scores,
            raw,
        }
    }

    /// Returns `true` if messages for `game` carry a correlation id.
    pub fn requires_correlation(&self, game: &str) -> bool {
        self.games.contains(game)
    }

    /// Stamps `message` with the next id if its game is correlated.
    ///
    /// Returns the id that was attached. Messages for uncorrelated games
    /// leave with no id and do not advance the counter.
    pub fn tag(&mut self, message: &mut ScoreMessage) -> Option<String> {
        if !self.requires_correlation(&message.game) {
            message.message_id = None;
            return None;
        }

        let id = format!("{}{}", self.prefix, self.next_id);
        self.next_id += 1;
        message.message_id = Some(id.clone());
        Some(id)
    }

    /// Publishes one inbound frame.
    ///
    /// The raw text always goes to the raw topic. If it decodes as a
    /// [`ScoreResponse`] that goes to the scores topic too and is returned.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the frame is not a score reply.
    pub fn dispatch(&self, text: &str) -> Result<ScoreResponse, ProtocolError> {
        // No listeners is fine; the frame is simply not observed.
        let _ = self.raw.send(text.to_owned());

        match self.codec.decode::<ScoreResponse>(text) {
            Ok(response) => {
                debug!(
                    message_id = %response.message_id,
                    value = response.value,
                    "score received"
                );
                let _ = self.scores.send(response.clone());
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, bytes = text.len(), "inbound frame is not a score reply");
                Err(e)
            }
        }
    }

    /// Subscribes to decoded score replies.
    pub fn subscribe_scores(&self) -> broadcast::Receiver<ScoreResponse> {
        self.scores.subscribe()
    }

    /// Subscribes to every inbound frame as raw text.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<String> {
        self.raw.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use scorelink_protocol::ScoreMetric;

    use super::*;

    fn correlator() -> MessageCorrelator {
        MessageCorrelator::new(CorrelationConfig::default(), 8)
    }

    #[test]
    fn test_correlated_game_gets_increasing_ids() {
        let mut c = correlator();
        let mut first = ScoreMessage::new("aim-gridshot").with_metric(ScoreMetric::score(1.0));
        let mut second = ScoreMessage::new("aim-gridshot").with_metric(ScoreMetric::score(2.0));

        assert_eq!(c.tag(&mut first).as_deref(), Some("p1"));
        assert_eq!(c.tag(&mut second).as_deref(), Some("p2"));
        assert_eq!(first.message_id.as_deref(), Some("p1"));
        assert_eq!(second.message_id.as_deref(), Some("p2"));
    }

    #[test]
    fn test_uncorrelated_game_is_untagged_and_keeps_counter() {
        let mut c = correlator();
        let mut plain = ScoreMessage::new("buttonsmash");
        plain.message_id = Some("stale".into());

        assert_eq!(c.tag(&mut plain), None);
        assert_eq!(plain.message_id, None);

        let mut tagged = ScoreMessage::new("aim-gridshot");
        assert_eq!(c.tag(&mut tagged).as_deref(), Some("p1"));
    }

    #[test]
    fn test_custom_prefix_and_games() {
        let config = CorrelationConfig {
            prefix: "req-".into(),
            games: HashSet::from(["observe".to_owned()]),
        };
        let mut c = MessageCorrelator::new(config, 8);
        let mut msg = ScoreMessage::new("observe");

        assert!(c.requires_correlation("observe"));
        assert!(!c.requires_correlation("aim-gridshot"));
        assert_eq!(c.tag(&mut msg).as_deref(), Some("req-1"));
    }

    #[test]
    fn test_dispatch_broadcasts_to_both_topics() {
        let c = correlator();
        let mut scores = c.subscribe_scores();
        let mut raw = c.subscribe_raw();

        let frame = r#"{"messageId":"p1","value":99.5}"#;
        let resp = c.dispatch(frame).unwrap();

        assert_eq!(resp.message_id, "p1");
        assert_eq!(scores.try_recv().unwrap(), resp);
        assert_eq!(raw.try_recv().unwrap(), frame);
    }

    #[test]
    fn test_malformed_frame_reaches_raw_listeners_only() {
        let c = correlator();
        let mut scores = c.subscribe_scores();
        let mut raw = c.subscribe_raw();

        let result = c.dispatch("{\"hello\":1}");

        assert!(matches!(result, Err(ProtocolError::Decode(_))));
        assert_eq!(raw.try_recv().unwrap(), "{\"hello\":1}");
        assert!(scores.try_recv().is_err());
    }

    #[test]
    fn test_dispatch_without_listeners_still_decodes() {
        let c = correlator();
        let resp = c.dispatch(r#"{"messageId":"x","value":1}"#).unwrap();
        assert_eq!(resp.value, 1.0);
    }
}
