//! Wire protocol types.
//!
//! This module defines the JSON envelope exchanged over the socket and the
//! tagged union inbound frames are classified into.
//!
//! # Protocol Overview
//!
//! | Event | Direction | Purpose |
//! |-------|-----------|---------|
//! | `auth.token` | Local → Remote | Authentication after open |
//! | `ping` / `pong` | Both | Keepalive |
//! | `room_join` / `room_leave` | Local → Remote | Room membership |
//! | `conn.rejected` | Remote → Local | Server refuses this client |
//! | anything else | Both | Application events |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope, Sender and Receiver types |
//! | `frame` | Inbound decoding, normalization, classification |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope, sender and receiver types.
pub mod envelope;

/// Inbound frame decoding and classification.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, Receiver, ReceiverKind, Sender, now_millis};
pub use frame::{
    AUTH_TOKEN, CONN_REJECTED, Frame, PING, PONG, ROOM_JOIN, ROOM_LEAVE, normalize,
};
