//! Wire envelope types.
//!
//! The envelope is the unit exchanged over the socket, one JSON object per
//! text frame.
//!
//! # Format
//!
//! Outbound:
//!
//! ```json
//! {
//!   "event": "chat",
//!   "data": "hello",
//!   "receiver": { "type": "room", "id": "lobby" },
//!   "time": 1700000000000,
//!   "token": "optional-auth-token"
//! }
//! ```
//!
//! Inbound frames additionally carry `sender` and `meta`, and may use
//! `message` instead of `data`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Result;

use super::frame::{AUTH_TOKEN, PING, PONG, ROOM_JOIN, ROOM_LEAVE};

// ============================================================================
// ReceiverKind
// ============================================================================

/// Addressing class of a [`Receiver`].
///
/// Unknown wire values are preserved in [`ReceiverKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReceiverKind {
    /// The server itself.
    Server,
    /// A named room.
    Room,
    /// Connection-level control traffic.
    System,
    /// Any other addressing class.
    Other(String),
}

impl ReceiverKind {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Server => "server",
            Self::Room => "room",
            Self::System => "system",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for ReceiverKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "server" => Self::Server,
            "room" => Self::Room,
            "system" => Self::System,
            _ => Self::Other(value),
        }
    }
}

impl From<ReceiverKind> for String {
    fn from(kind: ReceiverKind) -> Self {
        match kind {
            ReceiverKind::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ReceiverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Destination of an envelope. An absent receiver means broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    /// Addressing class.
    #[serde(rename = "type")]
    pub kind: ReceiverKind,

    /// Target identifier (room name for rooms). Numeric ids are kept in
    /// their decimal form.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
}

impl Receiver {
    /// Addresses the server.
    #[inline]
    #[must_use]
    pub fn server() -> Self {
        Self {
            kind: ReceiverKind::Server,
            id: None,
        }
    }

    /// Addresses connection-level control traffic.
    #[inline]
    #[must_use]
    pub fn system() -> Self {
        Self {
            kind: ReceiverKind::System,
            id: None,
        }
    }

    /// Addresses the room called `name`.
    #[inline]
    #[must_use]
    pub fn room(name: impl Into<String>) -> Self {
        Self {
            kind: ReceiverKind::Room,
            id: Some(name.into()),
        }
    }

    /// Returns the room name when this receiver addresses a room.
    #[inline]
    #[must_use]
    pub fn room_name(&self) -> Option<&str> {
        match self.kind {
            ReceiverKind::Room => self.id.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// Sender
// ============================================================================

/// Origin of an inbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    /// Origin class (`user`, `server`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Origin identifier, string or number depending on the server.
    #[serde(default)]
    pub id: Value,

    /// Extra origin details.
    ///
    /// Arrives as a JSON-encoded string and is decoded before listeners see it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

// ============================================================================
// Envelope
// ============================================================================

/// A single message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name.
    #[serde(default)]
    pub event: String,

    /// Event payload.
    #[serde(default, alias = "message")]
    pub data: Value,

    /// Origin (inbound only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,

    /// Destination; `None` is a broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Receiver>,

    /// Emission time in epoch milliseconds.
    #[serde(default)]
    pub time: u64,

    /// Open metadata map (inbound only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,

    /// Authentication token (outbound only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Envelope {
    /// Creates an envelope stamped with the current time.
    #[must_use]
    pub fn new(event: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            sender: None,
            receiver: None,
            time: now_millis(),
            meta: None,
            token: None,
        }
    }

    /// Sets the receiver.
    #[inline]
    #[must_use]
    pub fn with_receiver(mut self, receiver: Option<Receiver>) -> Self {
        self.receiver = receiver;
        self
    }

    /// Sets the authentication token.
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Keepalive probe.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(PING, Value::Null).with_receiver(Some(Receiver::system()))
    }

    /// Keepalive reply.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(PONG, Value::Null).with_receiver(Some(Receiver::system()))
    }

    /// Authentication handshake sent right after the socket opens.
    #[must_use]
    pub fn auth(token: impl Into<String>) -> Self {
        Self::new(AUTH_TOKEN, json!({ "token": token.into() }))
            .with_receiver(Some(Receiver::system()))
    }

    /// Room membership request.
    #[must_use]
    pub fn room_join(name: &str) -> Self {
        Self::new(ROOM_JOIN, json!({ "room": name })).with_receiver(Some(Receiver::room(name)))
    }

    /// Room departure notice.
    #[must_use]
    pub fn room_leave(name: &str) -> Self {
        Self::new(ROOM_LEAVE, json!({ "room": name })).with_receiver(Some(Receiver::room(name)))
    }

    /// Returns the room this envelope is addressed to, if any.
    #[inline]
    #[must_use]
    pub fn room_name(&self) -> Option<&str> {
        self.receiver.as_ref().and_then(Receiver::room_name)
    }

    /// Serializes the envelope to a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Accepts a string, a number or `null` for an identifier.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number id, got {other}"
        ))),
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_shape() {
        let envelope = Envelope::new("chat", "hi")
            .with_receiver(Some(Receiver::room("lobby")))
            .with_token(Some("secret".into()));

        let value: Value = serde_json::from_str(&envelope.to_json().expect("serialize"))
            .expect("parse");

        assert_eq!(value["event"], "chat");
        assert_eq!(value["data"], "hi");
        assert_eq!(value["receiver"], json!({ "type": "room", "id": "lobby" }));
        assert_eq!(value["token"], "secret");
        assert!(value["time"].as_u64().is_some_and(|t| t > 0));
        assert!(value.get("sender").is_none());
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn test_broadcast_omits_receiver() {
        let json = Envelope::new("chat", 1).to_json().expect("serialize");
        assert!(!json.contains("receiver"));
        assert!(!json.contains("token"));
    }

    #[test]
    fn test_message_alias() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"event":"chat","message":"legacy"}"#).expect("parse");
        assert_eq!(envelope.data, "legacy");
        assert_eq!(envelope.time, 0);
    }

    #[test]
    fn test_unknown_receiver_kind_preserved() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"event":"dm","receiver":{"type":"user","id":"42"}}"#)
                .expect("parse");
        let receiver = envelope.receiver.expect("receiver");
        assert_eq!(receiver.kind, ReceiverKind::Other("user".into()));
        assert_eq!(receiver.kind.to_string(), "user");
        assert!(receiver.room_name().is_none());
    }

    #[test]
    fn test_room_name() {
        let envelope = Envelope::room_join("lobby");
        assert_eq!(envelope.event, ROOM_JOIN);
        assert_eq!(envelope.room_name(), Some("lobby"));
        assert_eq!(Envelope::ping().room_name(), None);
    }

    #[test]
    fn test_receiver_numeric_id() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"event":"dm","receiver":{"type":"user","id":42}}"#)
                .expect("parse");
        let receiver = envelope.receiver.expect("receiver");
        assert_eq!(receiver.kind, ReceiverKind::Other("user".into()));
        assert_eq!(receiver.id.as_deref(), Some("42"));

        let room: Envelope =
            serde_json::from_str(r#"{"event":"chat","receiver":{"type":"room","id":7}}"#)
                .expect("parse");
        assert_eq!(room.room_name(), Some("7"));
    }

    #[test]
    fn test_receiver_null_id() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"event":"chat","receiver":{"type":"server","id":null}}"#)
                .expect("parse");
        assert_eq!(envelope.receiver, Some(Receiver::server()));
    }

    #[test]
    fn test_receiver_object_id_rejected() {
        let result: serde_json::Result<Envelope> =
            serde_json::from_str(r#"{"event":"chat","receiver":{"type":"room","id":{}}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_sender_numeric_id() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"event":"chat","sender":{"type":"user","id":7},"time":12}"#,
        )
        .expect("parse");
        let sender = envelope.sender.expect("sender");
        assert_eq!(sender.kind, "user");
        assert_eq!(sender.id, 7);
        assert_eq!(envelope.time, 12);
    }
}
