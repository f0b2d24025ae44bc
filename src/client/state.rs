//! Connection lifecycle states.
//!
//! ```text
//!  standby ──connect──► connecting ──open──► open ──close──► close ──timer──► reconnecting
//!                                             │                 ▲                   │
//!                                             └──error──► error ┘                   │
//!                                             ▲                                     │
//!                                             └────────────────open─────────────────┘
//!
//!  open ──reconnect()──► internal_reconnection ──close──► close ──timer──► reconnecting
//!  any  ──close()──────► closed (until a fresh connect())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a [`Connection`](crate::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Created, never connected.
    #[default]
    Standby,
    /// First connection attempt in flight.
    Connecting,
    /// Socket open and writable.
    Open,
    /// Socket closed; a reconnect may be pending.
    Close,
    /// Socket reported a failure.
    Error,
    /// Reconnection attempt in flight.
    Reconnecting,
    /// Socket being closed by `reconnect()`.
    InternalReconnection,
    /// Closed by the user.
    Closed,
}

impl ConnectionState {
    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standby => "standby",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Close => "close",
            Self::Error => "error",
            Self::Reconnecting => "reconnecting",
            Self::InternalReconnection => "internal_reconnection",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` while a socket is being established or is open.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(ConnectionState::default(), ConnectionState::Standby);
        assert_eq!(ConnectionState::InternalReconnection.to_string(), "internal_reconnection");
        assert_eq!(ConnectionState::Closed.as_str(), "closed");
    }

    #[test]
    fn test_is_active() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Reconnecting.is_active());
        assert!(ConnectionState::Open.is_active());
        assert!(!ConnectionState::Close.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }
}
