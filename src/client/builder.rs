//! Builder pattern for connection configuration.
//!
//! Provides a fluent API for configuring and creating [`Connection`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use roomlink::Connection;
//!
//! # async fn example() -> roomlink::Result<()> {
//! let conn = Connection::builder()
//!     .url("/ws")
//!     .host("chat.local:9000")
//!     .ping_interval(Duration::from_secs(20))
//!     .auth_token("secret")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::{Error, Result};
use crate::transport::{Transport, WebSocketTransport};

use super::core::Connection;
use super::options::{ConnectionOptions, resolve_url};

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectionBuilder {
    /// Endpoint, absolute or relative to the configured host.
    url: Option<String>,
    /// Tunable behavior.
    options: ConnectionOptions,
    /// Socket factory; defaults to [`WebSocketTransport`].
    transport: Option<Arc<dyn Transport>>,
    /// Runtime for timers; defaults to the current one.
    runtime: Option<Handle>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionBuilder Implementation
// ============================================================================

impl ConnectionBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint.
    ///
    /// `ws://` and `wss://` URLs are used as-is; anything else is resolved
    /// against [`host`](Self::host).
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables or disables automatic reconnection.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.options.reconnect = enabled;
        self
    }

    /// Sets the reconnection delay.
    #[inline]
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.options.reconnect_interval = interval;
        self
    }

    /// Sets the keepalive period.
    #[inline]
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.options.ping_interval = Some(interval);
        self
    }

    /// Sets the token attached to outgoing envelopes.
    #[inline]
    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.options.auth_token = Some(token.into());
        self
    }

    /// Sets the host used for scheme-less URLs.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Enables or disables re-joining rooms after a reconnection.
    #[inline]
    #[must_use]
    pub fn rejoin_rooms(mut self, enabled: bool) -> Self {
        self.options.rejoin_rooms = enabled;
        self
    }

    /// Uses a custom socket factory.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Runs timers on the given runtime instead of the current one.
    #[inline]
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the connection in the `standby` state.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no URL was set or it is empty
    /// - [`Error::InvalidUrl`] if the URL cannot be parsed
    /// - [`Error::Runtime`] if no runtime was given and none is current
    pub fn build(self) -> Result<Connection> {
        let endpoint = self.url.as_deref().ok_or_else(|| {
            Error::config(
                "Endpoint URL is required. Use .url() to set it.\n\
                 Example: Connection::builder().url(\"ws://localhost:9000/ws\")",
            )
        })?;

        let url = resolve_url(endpoint, &self.options.host)?;

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| {
                Error::runtime(format!(
                    "No Tokio runtime available: {e}. Build inside a runtime or use .runtime()."
                ))
            })?,
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport::with_handle(runtime.clone())),
        };

        Ok(Connection::new(url, self.options, transport, runtime))
    }
}

// ============================================================================
// Tests
// ============================================================================
