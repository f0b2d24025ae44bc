//! Inbound frame routing.
//!
//! Classified frames are handled as follows:
//!
//! | Frame | Action |
//! |-------|--------|
//! | `Ping` | reply `pong` to the system receiver |
//! | `Pong` | swallowed |
//! | `AuthToken` | swallowed |
//! | `Rejected` | stop reconnecting, then `event.conn.rejected` |
//! | `Event` | `event`, `event.<name>`, then the addressed room |

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, trace, warn};

use crate::protocol::{CONN_REJECTED, Envelope, Frame};

use super::core::Connection;
use super::events::{self, Signal, event_channel};

// ============================================================================
// Connection - Routing
// ============================================================================

impl Connection {
    /// Routes one decoded inbound frame.
    pub(crate) fn route(&self, frame: Frame) {
        match frame {
            Frame::Ping(_) => {
                trace!("Ping received, replying pong");
                if let Err(e) = self.write(&Envelope::pong()) {
                    debug!(error = %e, "Failed to send pong");
                }
            }

            Frame::Pong(_) => trace!("Pong received"),

            Frame::AuthToken(_) => trace!("Auth token echo ignored"),

            Frame::Rejected(envelope) => {
                self.handle_rejection();
                self.emit(&event_channel(CONN_REJECTED), &Signal::Envelope(envelope));
            }

            Frame::Event(envelope) => self.dispatch_event(envelope),
        }
    }

    /// Dispatches an application event on the connection and its room.
    fn dispatch_event(&self, envelope: Envelope) {
        if envelope.event.is_empty() {
            warn!("Envelope without event name dropped");
            return;
        }

        trace!(event = %envelope.event, "Dispatching event");

        let channel = event_channel(&envelope.event);
        let signal = Signal::Envelope(envelope);
        self.emit(events::EVENT, &signal);
        self.emit(&channel, &signal);

        if let Signal::Envelope(envelope) = &signal {
            self.inner.rooms.route(envelope);
        }
    }
}
