//! Resilient messaging client.
//!
//! A [`Connection`] wraps one socket with a lifecycle state machine,
//! automatic reconnection, keepalive pings and send buffering. Inbound frames
//! are routed to connection-level listeners and to [`Room`]s.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Connection`] state machine, timers and sending |
//! | `events` | Connection-level subscriptions |
//! | `router` | Inbound frame routing |
//! | `room` | [`Room`] handles and the room registry |
//! | `builder` | [`ConnectionBuilder`] |
//! | `options` | [`ConnectionOptions`] and URL resolution |
//! | `state` | [`ConnectionState`] |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for connection configuration.
pub mod builder;

/// Connection state machine.
pub mod core;

/// Connection-level subscriptions.
pub mod events;

/// Connection options and endpoint resolution.
pub mod options;

/// Rooms multiplexed over one connection.
pub mod room;

/// Inbound frame routing.
mod router;

/// Lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionBuilder;
pub use core::{Connection, SendFuture};
pub use options::{ConnectionOptions, DEFAULT_HOST, DEFAULT_RECONNECT_INTERVAL, resolve_url};
pub use room::{ALL_EVENTS, Room};
pub use state::ConnectionState;
