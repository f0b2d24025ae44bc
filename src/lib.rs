//! Roomlink - resilient real-time messaging client.
//!
//! This library maintains a persistent socket to a messaging server,
//! multiplexes named rooms over it and dispatches inbound events to
//! registered listeners.
//!
//! # Architecture
//!
//! The client is layered around one state machine per connection:
//!
//! - **Transport**: opens sockets and reports `open` / `message` / `close` / `error`
//! - **Connection**: lifecycle, reconnection, keepalive, send buffering
//! - **Router**: classifies inbound frames and dispatches application events
//! - **Rooms**: room-scoped listeners fed by the router
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns at most one socket and one pending reconnect
//! - Sends made before the socket opens are flushed on `open`, in call order
//! - Listeners never run under an internal lock and may call back freely
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use roomlink::{Connection, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let conn = Connection::builder()
//!         .url("ws://127.0.0.1:9000/ws")
//!         .ping_interval(Duration::from_secs(20))
//!         .build()?;
//!
//!     conn.on_open(|| println!("connected"));
//!     conn.on_event("notice", |envelope| println!("{:?}", envelope.data));
//!
//!     let lobby = conn.join_room("lobby");
//!     lobby.on("chat", |envelope| println!("{:?}", envelope.data));
//!
//!     conn.connect();
//!     lobby.send("chat", "hello").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bus`] | Name-keyed listener registry |
//! | [`client`] | [`Connection`], [`Room`] and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Envelope types and inbound frame decoding |
//! | [`transport`] | Socket boundary and the WebSocket transport |
//!
//! # Features
//!
//! - **tls**: `wss://` support through rustls with webpki roots

// ============================================================================
// Modules
// ============================================================================

/// Name-keyed publish/subscribe registry.
pub mod bus;

/// Connection, rooms and configuration.
///
/// Use [`Connection::builder()`] to create a connection.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Wire protocol types.
pub mod protocol;

/// Socket transport boundary.
///
/// Implement [`Transport`] to run the client over something other than
/// WebSocket.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bus types
pub use bus::EventBus;

// Client types
pub use client::{
    Connection, ConnectionBuilder, ConnectionOptions, ConnectionState, Room, SendFuture,
};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{Envelope, Frame, Receiver, ReceiverKind, Sender};

// Transport types
pub use transport::{
    ReadyState, Socket, SocketEvent, SocketEvents, Transport, WebSocketTransport,
};
