//! Wire codec for the push event stream.
//!
//! The push server speaks Socket.IO v5 on top of Engine.IO v4, carried
//! in WebSocket text frames. Only the subset a receive-only client needs
//! is implemented:
//!
//! | frame             | meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `0{...}`          | Engine.IO open, carries ping settings     |
//! | `1`               | Engine.IO close                           |
//! | `2` / `3`         | ping / pong (we must answer `2` with `3`) |
//! | `40` / `40{...}`  | namespace connected                       |
//! | `41`              | namespace disconnected                    |
//! | `42[name, data]`  | event                                     |
//! | `44{...}`         | namespace connect error                   |

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::models::FeedItemResponse;

/// Sent after the Engine.IO open packet to join the default namespace.
pub const CONNECT_NAMESPACE: &str = "40";
/// Reply to an Engine.IO ping.
pub const PONG: &str = "3";

const EVENT_TEMPERATURE_PREDICTION: &str = "temperaturePrediction";
const EVENT_SECURITY_ALERT: &str = "securityAlert";
const EVENT_NOTIFICATION: &str = "notification";

// ── Events ───────────────────────────────────────────────────────────

/// A typed event received from the push stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// New outdoor temperature forecast.
    TemperaturePrediction {
        temperature: f64,
        predicted_for: Option<String>,
    },
    /// A security alert to prepend to the alert feed.
    SecurityAlert(FeedItemResponse),
    /// A notification to prepend to the notification feed.
    Notification(FeedItemResponse),
}

impl PushEvent {
    /// Socket.IO event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TemperaturePrediction { .. } => EVENT_TEMPERATURE_PREDICTION,
            Self::SecurityAlert(_) => EVENT_SECURITY_ALERT,
            Self::Notification(_) => EVENT_NOTIFICATION,
        }
    }

    /// Encode as a `42[...]` frame, the way the push server sends it.
    pub fn to_frame(&self) -> String {
        let payload = match self {
            Self::TemperaturePrediction {
                temperature,
                predicted_for,
            } => {
                let mut obj = serde_json::json!({ "temperature": temperature });
                if let Some(at) = predicted_for {
                    obj["predictedFor"] = Value::String(at.clone());
                }
                obj
            }
            Self::SecurityAlert(item) | Self::Notification(item) => {
                serde_json::to_value(item).unwrap_or(Value::Null)
            }
        };
        format!("42{}", Value::Array(vec![Value::from(self.name()), payload]))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemperaturePredictionPayload {
    temperature: f64,
    #[serde(default)]
    predicted_for: Option<String>,
}

// ── Frames ───────────────────────────────────────────────────────────

/// Engine.IO handshake parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    #[serde(default)]
    pub sid: String,
    /// Milliseconds between server pings.
    #[serde(default)]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    #[serde(default)]
    pub ping_timeout: u64,
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(OpenPacket),
    Close,
    Ping,
    Pong,
    Connected,
    Disconnected,
    ConnectError(String),
    Event(PushEvent),
    /// Valid but irrelevant to a receive-only client (noop, upgrade, acks).
    Ignored,
}

/// Decode one WebSocket text frame.
pub fn decode_frame(text: &str) -> Result<Frame, Error> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(malformed("empty frame"));
    };
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(Frame::Open)
            .map_err(|e| malformed(format!("bad open packet: {e}"))),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_socketio(rest),
        '5' | '6' => Ok(Frame::Ignored),
        other => Err(malformed(format!("unknown engine.io packet type '{other}'"))),
    }
}

fn decode_socketio(packet: &str) -> Result<Frame, Error> {
    let mut chars = packet.chars();
    let Some(kind) = chars.next() else {
        return Err(malformed("empty socket.io packet"));
    };
    let body = strip_namespace_and_ack(chars.as_str());

    match kind {
        '0' => Ok(Frame::Connected),
        '1' => Ok(Frame::Disconnected),
        '2' => decode_event(body).map(Frame::Event),
        '3' => Ok(Frame::Ignored),
        '4' => Ok(Frame::ConnectError(body.to_owned())),
        other => Err(malformed(format!("unsupported socket.io packet type '{other}'"))),
    }
}

/// Drop an optional `/namespace,` prefix and numeric ack id.
fn strip_namespace_and_ack(body: &str) -> &str {
    let body = if body.starts_with('/') {
        body.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        body
    };
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(body: &str) -> Result<PushEvent, Error> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("event is not JSON: {e}")))?;
    let Value::Array(mut parts) = value else {
        return Err(malformed("event payload is not an array"));
    };
    if parts.is_empty() {
        return Err(malformed("event array is empty"));
    }
    let name = match parts.remove(0) {
        Value::String(name) => name,
        other => return Err(malformed(format!("event name is not a string: {other}"))),
    };
    let payload = if parts.is_empty() {
        Value::Null
    } else {
        parts.swap_remove(0)
    };

    match name.as_str() {
        EVENT_TEMPERATURE_PREDICTION => {
            let p: TemperaturePredictionPayload = payload_as(&name, payload)?;
            Ok(PushEvent::TemperaturePrediction {
                temperature: p.temperature,
                predicted_for: p.predicted_for,
            })
        }
        EVENT_SECURITY_ALERT => payload_as(&name, payload).map(PushEvent::SecurityAlert),
        EVENT_NOTIFICATION => payload_as(&name, payload).map(PushEvent::Notification),
        other => Err(malformed(format!("unknown event '{other}'"))),
    }
}

fn payload_as<T: serde::de::DeserializeOwned>(name: &str, payload: Value) -> Result<T, Error> {
    serde_json::from_value(payload).map_err(|e| malformed(format!("{name}: {e}")))
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedFrame {
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ItemId;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_open_packet() {
        let frame =
            decode_frame(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
                .unwrap();
        assert_eq!(
            frame,
            Frame::Open(OpenPacket {
                sid: "abc".into(),
                ping_interval: 25_000,
                ping_timeout: 20_000,
            })
        );
    }

    #[test]
    fn decodes_control_frames() {
        assert_eq!(decode_frame("2").unwrap(), Frame::Ping);
        assert_eq!(decode_frame("3").unwrap(), Frame::Pong);
        assert_eq!(decode_frame("40").unwrap(), Frame::Connected);
        assert_eq!(decode_frame(r#"40{"sid":"x"}"#).unwrap(), Frame::Connected);
        assert_eq!(decode_frame("41").unwrap(), Frame::Disconnected);
        assert_eq!(decode_frame("6").unwrap(), Frame::Ignored);
    }

    #[test]
    fn decodes_temperature_prediction() {
        let frame = decode_frame(r#"42["temperaturePrediction",{"temperature":30.1}]"#).unwrap();
        assert_eq!(
            frame,
            Frame::Event(PushEvent::TemperaturePrediction {
                temperature: 30.1,
                predicted_for: None,
            })
        );
    }

    #[test]
    fn decodes_security_alert_with_namespace_and_ack() {
        let frame = decode_frame(
            r#"42/dash,7["securityAlert",{"id":2,"message":"Door forced","time":"11:52 AM","type":"critical"}]"#,
        )
        .unwrap();
        let Frame::Event(PushEvent::SecurityAlert(item)) = frame else {
            panic!("expected security alert, got {frame:?}");
        };
        assert_eq!(item.id, ItemId::Number(2));
        assert_eq!(item.kind, "critical");
    }

    #[test]
    fn unknown_event_is_malformed() {
        let err = decode_frame(r#"42["fanCommand",{"speed":100}]"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn wrong_payload_shape_is_malformed() {
        let err = decode_frame(r#"42["temperaturePrediction",{"temp":"hot"}]"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));

        let err = decode_frame(r#"42{"not":"an array"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(decode_frame("").is_err());
        assert!(decode_frame("not a frame").is_err());
    }

    #[test]
    fn encoded_events_decode_back() {
        let event = PushEvent::Notification(FeedItemResponse {
            id: ItemId::Number(4),
            message: "Maintenance check completed".into(),
            time: "Yesterday".into(),
            kind: "normal".into(),
        });
        assert_eq!(decode_frame(&event.to_frame()).unwrap(), Frame::Event(event));
    }
}
