//! Connection-level subscriptions.
//!
//! # Channels
//!
//! | Name | Fired when | Listener |
//! |------|-----------|----------|
//! | `connecting` | first attempt starts | [`Connection::on_connecting`] |
//! | `reconnecting` | retry attempt starts | [`Connection::on_reconnecting`] |
//! | `open` | socket open | [`Connection::on_open`] |
//! | `reconnect` | socket open after a retry | [`Connection::on_reconnect`] |
//! | `close` | socket closed | [`Connection::on_close`] |
//! | `error` | socket failure or malformed frame | [`Connection::on_error`] |
//! | `disconnect` | after [`Connection::close`] | [`Connection::on_disconnect`] |
//! | `message` | every decoded frame | [`Connection::on_message`] |
//! | `event` | every application event | [`Connection::on_any_event`] |
//! | `event.<name>` | application event `<name>` | [`Connection::on_event`] |

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::Envelope;

use super::core::Connection;
use super::state::ConnectionState;

// ============================================================================
// Channel Names
// ============================================================================

pub(crate) const CONNECTING: &str = "connecting";
pub(crate) const RECONNECTING: &str = "reconnecting";
pub(crate) const OPEN: &str = "open";
pub(crate) const RECONNECT: &str = "reconnect";
pub(crate) const CLOSE: &str = "close";
pub(crate) const ERROR: &str = "error";
pub(crate) const DISCONNECT: &str = "disconnect";
pub(crate) const MESSAGE: &str = "message";
pub(crate) const EVENT: &str = "event";

/// Filtered channel name for an application event.
#[inline]
pub(crate) fn event_channel(name: &str) -> String {
    format!("{EVENT}.{name}")
}

// ============================================================================
// Signal
// ============================================================================

/// Value carried on the connection bus.
#[derive(Debug, Clone)]
pub(crate) enum Signal {
    /// Lifecycle notification with the state it reports.
    Lifecycle(ConnectionState),
    /// Failure description.
    Error(String),
    /// Decoded envelope.
    Envelope(Envelope),
}

// ============================================================================
// Connection - Subscriptions
// ============================================================================

impl Connection {
    /// Registers a lifecycle listener on `name`.
    fn on_lifecycle<F>(&self, name: &str, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.bus.on(name, move |signal: &Signal| {
            if let Signal::Lifecycle(_) = signal {
                listener();
            }
        });
    }

    /// Registers an envelope listener on `name`.
    fn on_envelope<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.bus.on(name, move |signal: &Signal| {
            if let Signal::Envelope(envelope) = signal {
                listener(envelope);
            }
        });
    }

    /// Called when the socket opens.
    pub fn on_open<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_lifecycle(OPEN, listener);
    }

    /// Called when the socket closes, whatever the cause.
    pub fn on_close<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_lifecycle(CLOSE, listener);
    }

    /// Called when the first connection attempt starts.
    pub fn on_connecting<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_lifecycle(CONNECTING, listener);
    }

    /// Called when a reconnection attempt starts.
    pub fn on_reconnecting<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_lifecycle(RECONNECTING, listener);
    }

    /// Called when a reconnection attempt succeeds, before `open`.
    pub fn on_reconnect<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_lifecycle(RECONNECT, listener);
    }

    /// Called after [`Connection::close`], on the next scheduler tick.
    pub fn on_disconnect<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_lifecycle(DISCONNECT, listener);
    }

    /// Called with a description of socket failures and malformed frames.
    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.bus.on(ERROR, move |signal: &Signal| {
            if let Signal::Error(message) = signal {
                listener(message);
            }
        });
    }

    /// Called with every decoded frame, control frames included.
    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.on_envelope(MESSAGE, listener);
    }

    /// Called with every application event.
    pub fn on_any_event<F>(&self, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.on_envelope(EVENT, listener);
    }

    /// Called with application events named `name`.
    ///
    /// `conn.rejected` is delivered here too, so applications can react to a
    /// server refusal.
    pub fn on_event<F>(&self, name: &str, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.on_envelope(event_channel(name), listener);
    }

    /// Called once with the next application event named `name`.
    pub fn once_event<F>(&self, name: &str, listener: F)
    where
        F: FnOnce(&Envelope) + Send + 'static,
    {
        self.inner
            .bus
            .once(event_channel(name), move |signal: &Signal| {
                if let Signal::Envelope(envelope) = signal {
                    listener(envelope);
                }
            });
    }
}

// ============================================================================
// Tests
// ============================================================================
