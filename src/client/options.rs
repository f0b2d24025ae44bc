//! Connection options and endpoint resolution.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use roomlink::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_reconnect_interval(Duration::from_secs(5))
//!     .with_ping_interval(Duration::from_secs(20))
//!     .with_auth_token("secret");
//! ```
//!
//! Options deserialize from JSON with durations in milliseconds:
//!
//! ```json
//! { "reconnect_interval_ms": 5000, "ping_interval_ms": 20000, "host": "chat.local" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay before an automatic reconnection attempt.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Default host for URLs given without a `ws://` or `wss://` scheme.
pub const DEFAULT_HOST: &str = "localhost";

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Tunable behavior of a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Reconnect automatically after an unexpected close.
    pub reconnect: bool,

    /// Delay before reconnecting. Zero disables automatic retries.
    #[serde(rename = "reconnect_interval_ms", with = "millis")]
    pub reconnect_interval: Duration,

    /// Keepalive period; `None` disables keepalive pings.
    #[serde(rename = "ping_interval_ms", with = "optional_millis")]
    pub ping_interval: Option<Duration>,

    /// Token attached to every outgoing envelope.
    pub auth_token: Option<String>,

    /// Host used to resolve scheme-less URLs.
    pub host: String,

    /// Re-send room joins after a successful reconnection.
    pub rejoin_rooms: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            ping_interval: None,
            auth_token: None,
            host: DEFAULT_HOST.to_string(),
            rejoin_rooms: true,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables automatic reconnection.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Sets the reconnection delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Enables keepalive pings at `interval`.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Sets the authentication token.
    #[inline]
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the host used for scheme-less URLs.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Enables or disables re-joining rooms after reconnect.
    #[inline]
    #[must_use]
    pub fn with_rejoin_rooms(mut self, enabled: bool) -> Self {
        self.rejoin_rooms = enabled;
        self
    }

    /// Parses options from a JSON document.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// URL Resolution
// ============================================================================

/// Resolves an endpoint, applying the default scheme and host.
///
/// `ws://` and `wss://` URLs are used as given; anything else is treated as a
/// path on `host` and becomes `ws://<host><path>`.
///
/// # Errors
///
/// - [`Error::Config`] if `endpoint` is empty
/// - [`Error::InvalidUrl`] if the resolved URL does not parse
pub fn resolve_url(endpoint: &str, host: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(Error::config("Endpoint URL is empty"));
    }

    let resolved = if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        endpoint.to_string()
    } else if endpoint.starts_with('/') {
        format!("ws://{host}{endpoint}")
    } else {
        format!("ws://{host}/{endpoint}")
    };

    Url::parse(&resolved).map_err(|e| Error::invalid_url(resolved, e))
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// `Duration` as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `Option<Duration>` as integer milliseconds; `0` and `null` mean `None`.
mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.filter(|ms| *ms > 0).map(Duration::from_millis))
    }
}

// ============================================================================
// Tests
// ============================================================================
