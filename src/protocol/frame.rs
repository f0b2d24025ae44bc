//! Inbound frame decoding and classification.
//!
//! Every text frame is decoded into an [`Envelope`], normalized, and
//! classified into a [`Frame`] so routing can match exhaustively over the
//! reserved control events.
//!
//! # Reserved Events
//!
//! | Event | Frame | Surfaced to application |
//! |-------|-------|-------------------------|
//! | `ping` | [`Frame::Ping`] | no |
//! | `pong` | [`Frame::Pong`] | no |
//! | `auth.token` | [`Frame::AuthToken`] | no |
//! | `conn.rejected` | [`Frame::Rejected`] | filtered channel only |
//! | anything else | [`Frame::Event`] | yes |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

use super::envelope::Envelope;

// ============================================================================
// Constants
// ============================================================================

/// Keepalive probe.
pub const PING: &str = "ping";

/// Keepalive reply.
pub const PONG: &str = "pong";

/// Server refused this client; stop reconnecting.
pub const CONN_REJECTED: &str = "conn.rejected";

/// Authentication handshake.
pub const AUTH_TOKEN: &str = "auth.token";

/// Room membership request.
pub const ROOM_JOIN: &str = "room_join";

/// Room departure notice.
pub const ROOM_LEAVE: &str = "room_leave";

/// `meta` key carrying a JSON-encoded string.
const META_USER_INFO: &str = "user_info";

// ============================================================================
// Frame
// ============================================================================

/// A decoded inbound envelope tagged by its role.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Server keepalive probe; answered with `pong`.
    Ping(Envelope),
    /// Reply to our keepalive probe.
    Pong(Envelope),
    /// Authentication handshake echo.
    AuthToken(Envelope),
    /// Server refuses further connection attempts.
    Rejected(Envelope),
    /// Application event.
    Event(Envelope),
}

impl Frame {
    /// Decodes a raw text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a JSON envelope
    pub fn decode(text: &str) -> Result<Self> {
        let mut envelope: Envelope = serde_json::from_str(text)?;
        normalize(&mut envelope);
        Ok(Self::classify(envelope))
    }

    /// Tags an already decoded envelope.
    #[must_use]
    pub fn classify(envelope: Envelope) -> Self {
        match envelope.event.as_str() {
            PING => Self::Ping(envelope),
            PONG => Self::Pong(envelope),
            AUTH_TOKEN => Self::AuthToken(envelope),
            CONN_REJECTED => Self::Rejected(envelope),
            _ => Self::Event(envelope),
        }
    }

    /// Returns the underlying envelope.
    #[inline]
    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        match self {
            Self::Ping(envelope)
            | Self::Pong(envelope)
            | Self::AuthToken(envelope)
            | Self::Rejected(envelope)
            | Self::Event(envelope) => envelope,
        }
    }

    /// Returns `true` for reserved control events.
    #[inline]
    #[must_use]
    pub fn is_control(&self) -> bool {
        !matches!(self, Self::Event(_))
    }
}

impl TryFrom<&str> for Frame {
    type Error = Error;

    fn try_from(text: &str) -> Result<Self> {
        Self::decode(text)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Decodes the nested JSON strings the server encodes twice.
///
/// `sender.info` and `meta.user_info` arrive as JSON text inside the JSON
/// envelope. Strings that do not parse are left untouched.
pub fn normalize(envelope: &mut Envelope) {
    if let Some(info) = envelope.sender.as_mut().and_then(|sender| sender.info.as_mut()) {
        decode_nested(info, "sender.info");
    }

    if let Some(user_info) = envelope
        .meta
        .as_mut()
        .and_then(|meta| meta.get_mut(META_USER_INFO))
    {
        decode_nested(user_info, "meta.user_info");
    }
}

/// Replaces a JSON-encoded string with its decoded value.
fn decode_nested(value: &mut Value, field: &str) {
    let Value::String(text) = value else {
        return;
    };

    match serde_json::from_str::<Value>(text) {
        Ok(decoded) => *value = decoded,
        Err(e) => warn!(field, error = %e, "Nested field is not JSON, keeping raw string"),
    }
}

// ============================================================================
// Tests
// ============================================================================
