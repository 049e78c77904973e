//! Envelopes that travel over the streaming channel.
//!
//! Outbound, the client sends one [`ScoreMessage`] per telemetry event:
//!
//! ```json
//! { "game": "aim-gridshot", "data": [ { "type": "hit", "precision": 0.82 } ], "messageId": "p3" }
//! ```
//!
//! Inbound, the backend answers with [`ScoreResponse`] frames:
//!
//! ```json
//! { "messageId": "p3", "value": 118.4 }
//! ```
//!
//! Field names follow the backend's camelCase JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// ScoreMetric
// ---------------------------------------------------------------------------

/// One opaque metric record inside a [`ScoreMessage`].
///
/// Each game variant defines its own fields (`score`, `precision`,
/// `streak`, ...). The core never interprets them; it only carries them.
/// `#[serde(transparent)]` makes this serialize as the bare JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreMetric(Map<String, Value>);

impl ScoreMetric {
    /// Creates an empty metric.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a metric holding only a `score` field.
    pub fn score(score: f64) -> Self {
        Self::new().with("score", score)
    }

    /// Sets `field` to `value`, replacing any previous value.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns the value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns all fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ScoreMessage
// ---------------------------------------------------------------------------

/// An outbound telemetry envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMessage {
    /// Game variant id, e.g. `"aim-gridshot"`.
    pub game: String,

    /// Metric records for this event.
    #[serde(default)]
    pub data: Vec<ScoreMetric>,

    /// Correlation id, set only for games whose replies are matched back
    /// to requests.
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Seconds since the round started, for timed games.
    #[serde(rename = "timeElapsed", default, skip_serializing_if = "Option::is_none")]
    pub time_elapsed: Option<f64>,
}

impl ScoreMessage {
    /// Creates an envelope for `game` with no metrics.
    pub fn new(game: impl Into<String>) -> Self {
        Self {
            game: game.into(),
            data: Vec::new(),
            message_id: None,
            time_elapsed: None,
        }
    }

    /// Appends a metric record.
    pub fn with_metric(mut self, metric: ScoreMetric) -> Self {
        self.data.push(metric);
        self
    }

    /// Sets the elapsed-time field.
    pub fn with_time_elapsed(mut self, seconds: f64) -> Self {
        self.time_elapsed = Some(seconds);
        self
    }

    /// Checks the envelope-level rules.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] when `game` is empty.
    pub fn check(&self) -> Result<(), ProtocolError> {
        if self.game.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "score message has no game id".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScoreResponse
// ---------------------------------------------------------------------------

/// An inbound score reply from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    /// Identifier of the reply. For correlated games this echoes the
    /// outbound `messageId`; otherwise it is backend-generated.
    #[serde(rename = "messageId")]
    pub message_id: String,

    /// The computed score.
    pub value: f64,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The backend parses these frames with a strict camelCase schema, so
    //! the tests pin the exact JSON shapes.

    use super::*;

    #[test]
    fn test_score_message_omits_unset_optional_fields() {
        let msg = ScoreMessage::new("observe").with_metric(ScoreMetric::score(3.0));
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["game"], "observe");
        assert_eq!(json["data"][0]["score"], 3.0);
        assert!(json.get("messageId").is_none());
        assert!(json.get("timeElapsed").is_none());
    }

    #[test]
    fn test_score_message_uses_camel_case_optional_fields() {
        let mut msg = ScoreMessage::new("holdthewall")
            .with_time_elapsed(12.5)
            .with_metric(ScoreMetric::score(40.0));
        msg.message_id = Some("p7".into());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["messageId"], "p7");
        assert_eq!(json["timeElapsed"], 12.5);
    }

    #[test]
    fn test_metric_fields_are_carried_verbatim() {
        let metric = ScoreMetric::new()
            .with("type", "hit")
            .with("precision", 0.8125)
            .with("age", 3)
            .with("obstacleBlock", true)
            .with("targetClicks", serde_json::json!(["a", "b"]));
        let json = serde_json::to_value(&metric).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "hit",
                "precision": 0.8125,
                "age": 3,
                "obstacleBlock": true,
                "targetClicks": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_round_trip_preserves_game_and_float_bits() {
        let precision = 0.1_f64 + 0.2_f64; // not exactly representable in decimal
        let msg = ScoreMessage::new("aim-gridshot")
            .with_metric(ScoreMetric::new().with("precision", precision).with("nth", 4));

        let text = serde_json::to_string(&msg).unwrap();
        let decoded: ScoreMessage = serde_json::from_str(&text).unwrap();

        assert_eq!(decoded.game, "aim-gridshot");
        let got = decoded.data[0].get("precision").and_then(Value::as_f64).unwrap();
        assert_eq!(got.to_bits(), precision.to_bits());
        assert_eq!(decoded.data[0].get("nth").and_then(Value::as_i64), Some(4));
    }

    #[test]
    fn test_score_message_without_data_decodes_to_empty() {
        let msg: ScoreMessage = serde_json::from_str(r#"{"game":"buttonsmash"}"#).unwrap();
        assert!(msg.data.is_empty());
        assert_eq!(msg.message_id, None);
    }

    #[test]
    fn test_check_rejects_blank_game() {
        assert!(ScoreMessage::new("observe").check().is_ok());
        assert!(matches!(
            ScoreMessage::new("  ").check(),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_score_response_decodes_backend_frame() {
        let resp: ScoreResponse =
            serde_json::from_str(r#"{"messageId":"response_4821","value":131.25}"#).unwrap();
        assert_eq!(resp.message_id, "response_4821");
        assert_eq!(resp.value, 131.25);
    }

    #[test]
    fn test_score_response_missing_value_is_an_error() {
        let result: Result<ScoreResponse, _> = serde_json::from_str(r#"{"messageId":"p1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_score_message_missing_game_is_an_error() {
        let result: Result<ScoreMessage, _> = serde_json::from_str(r#"{"data":[]}"#);
        assert!(result.is_err());
    }
}
