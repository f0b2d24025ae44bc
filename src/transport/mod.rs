//! Socket transport boundary.
//!
//! The connection state machine never touches a network stream directly. It
//! asks a [`Transport`] for a [`Socket`] and receives the socket's
//! notifications through [`SocketEvents`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  Transport::open(url, events)  ┌──────────────────┐
//! │                  │───────────────────────────────►│                  │
//! │    Connection    │                                │  Socket (I/O     │
//! │  (state machine) │◄───────────────────────────────│  task per open)  │
//! │                  │  open / message / close / error│                  │
//! └──────────────────┘                                └──────────────────┘
//! ```
//!
//! # Notification Contract
//!
//! - `open` at most once, when the socket becomes writable
//! - `message` for every inbound text frame while open
//! - `error` for failures; a failed attempt is followed by `close`
//! - `close` exactly once, last
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | Default transport on `tokio-tungstenite` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport on tokio-tungstenite.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::WebSocketTransport;

// ============================================================================
// ReadyState
// ============================================================================

/// Socket readiness, mirroring the WebSocket `readyState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Writable.
    Open = 1,
    /// Close requested, not yet confirmed.
    Closing = 2,
    /// Closed or failed.
    Closed = 3,
}

impl ReadyState {
    /// Converts from the `repr(u8)` value; unknown values map to `Closed`.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

// ============================================================================
// SocketEvent
// ============================================================================

/// A notification from a socket to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket became writable.
    Open,
    /// An inbound text frame.
    Message(String),
    /// The socket closed.
    Close,
    /// A transport failure.
    Error(String),
}

// ============================================================================
// SocketEvents
// ============================================================================

/// Notification sink handed to [`Transport::open`].
#[derive(Clone)]
pub struct SocketEvents {
    /// Callback receiving every notification.
    sink: Arc<dyn Fn(SocketEvent) + Send + Sync>,
}

impl fmt::Debug for SocketEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketEvents").finish_non_exhaustive()
    }
}

impl SocketEvents {
    /// Wraps a notification callback.
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(SocketEvent) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Delivers a notification.
    #[inline]
    pub fn emit(&self, event: SocketEvent) {
        (self.sink)(event);
    }

    /// Reports that the socket is open.
    #[inline]
    pub fn open(&self) {
        self.emit(SocketEvent::Open);
    }

    /// Reports an inbound text frame.
    #[inline]
    pub fn message(&self, text: impl Into<String>) {
        self.emit(SocketEvent::Message(text.into()));
    }

    /// Reports that the socket closed.
    #[inline]
    pub fn close(&self) {
        self.emit(SocketEvent::Close);
    }

    /// Reports a transport failure.
    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.emit(SocketEvent::Error(message.into()));
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A single socket instance.
pub trait Socket: Send + Sync {
    /// Writes a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`](crate::Error::NotConnected) unless open
    fn send(&self, text: String) -> Result<()>;

    /// Requests the socket to close. `close` is notified when done.
    fn close(&self);

    /// Returns the current readiness.
    fn ready_state(&self) -> ReadyState;
}

/// Factory for sockets.
///
/// `open` and `message` must be delivered after [`Transport::open`] returns.
/// `error` and `close` may be delivered synchronously, from inside
/// [`Transport::open`] or [`Socket::close`].
pub trait Transport: Send + Sync + 'static {
    /// Starts opening a socket to `url`.
    fn open(&self, url: &Url, events: SocketEvents) -> Arc<dyn Socket>;
}

// ============================================================================
// Tests
// ============================================================================
