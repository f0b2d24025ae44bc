//! Rooms multiplexed over one connection.
//!
//! A [`Room`] is a named channel with its own listener registry. Rooms never
//! own a socket; they send through their [`Connection`].
//!
//! # Lifecycle
//!
//! 1. [`Connection::join_room`] - registers the room and sends `room_join`
//!    (queued until open when needed)
//! 2. Inbound envelopes addressed `{type:"room", id:<name>}` reach the room's
//!    `all_events` listeners, then its listeners for the event name
//! 3. [`Connection::leave_room`] - sends `room_leave` and unregisters the room
//!    once that send settles, whether it succeeded or not
//!
//! # Example
//!
//! ```no_run
//! # async fn example(conn: roomlink::Connection) -> roomlink::Result<()> {
//! let lobby = conn.join_room("lobby");
//! lobby.on("chat", |envelope| println!("{:?}", envelope.data));
//! lobby.send("chat", "hi").await?;
//! lobby.leave().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::bus::EventBus;
use crate::error::{Error, Result};
use crate::protocol::{Envelope, Receiver};

use super::core::{Connection, SendFuture};

// ============================================================================
// Constants
// ============================================================================

/// Room channel receiving every event addressed to the room.
pub const ALL_EVENTS: &str = "all_events";

// ============================================================================
// RoomInner
// ============================================================================

/// Registry entry for one room.
pub(crate) struct RoomInner {
    /// Room name, unique per connection.
    name: String,
    /// Room-scoped listeners.
    bus: EventBus<Envelope>,
    /// A join envelope has been written at least once.
    joined: AtomicBool,
}

impl RoomInner {
    fn new(name: String) -> Self {
        Self {
            name,
            bus: EventBus::new(),
            joined: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// RoomRegistry
// ============================================================================

/// Ordered set of joined rooms.
#[derive(Default)]
pub(crate) struct RoomRegistry {
    rooms: Mutex<Vec<Arc<RoomInner>>>,
}

impl RoomRegistry {
    /// First room named `name`.
    fn find(&self, name: &str) -> Option<Arc<RoomInner>> {
        self.rooms
            .lock()
            .iter()
            .find(|room| room.name == name)
            .cloned()
    }

    fn insert(&self, room: Arc<RoomInner>) {
        self.rooms.lock().push(room);
    }

    /// Removes exactly this entry; a newer room with the same name stays.
    fn remove(&self, room: &Arc<RoomInner>) {
        self.rooms.lock().retain(|entry| !Arc::ptr_eq(entry, room));
    }

    /// Whether exactly this entry is still registered.
    fn contains(&self, room: &Arc<RoomInner>) -> bool {
        self.rooms.lock().iter().any(|entry| Arc::ptr_eq(entry, room))
    }

    fn snapshot(&self) -> Vec<Arc<RoomInner>> {
        self.rooms.lock().clone()
    }

    /// Forgets every room without sending anything.
    pub(crate) fn clear(&self) {
        self.rooms.lock().clear();
    }

    /// Delivers an envelope to the room it is addressed to.
    ///
    /// Returns `true` if a room matched.
    pub(crate) fn route(&self, envelope: &Envelope) -> bool {
        let Some(name) = envelope.room_name() else {
            return false;
        };

        let Some(room) = self.find(name) else {
            trace!(room = name, event = %envelope.event, "Event for unknown room");
            return false;
        };

        room.bus.dispatch(ALL_EVENTS, envelope);
        room.bus.dispatch(&envelope.event, envelope);
        true
    }
}

// ============================================================================
// Room
// ============================================================================

/// Handle to a joined room.
///
/// Cheap to clone. The handle keeps working after the room is left, but no
/// more inbound events are routed to it.
#[derive(Clone)]
pub struct Room {
    /// Registry entry.
    inner: Arc<RoomInner>,
    /// Owning connection.
    connection: Connection,
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.inner.name)
            .field("joined", &self.inner.joined.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl Room {
    /// Returns the room name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` once a join envelope has been written.
    #[inline]
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.inner.joined.load(Ordering::Acquire)
    }

    /// Returns the owning connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Sends an event addressed to this room.
    pub fn send(&self, event: impl Into<String>, data: impl Into<Value>) -> SendFuture {
        self.connection
            .send(event, data, Some(Receiver::room(self.inner.name.as_str())))
    }

    /// Called with room events named `event`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.bus.on(event, listener);
    }

    /// Called once with the next room event named `event`.
    pub fn once<F>(&self, event: impl Into<String>, listener: F)
    where
        F: FnOnce(&Envelope) + Send + 'static,
    {
        self.inner.bus.once(event, listener);
    }

    /// Called with every event addressed to this room.
    pub fn on_all_events<F>(&self, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.bus.on(ALL_EVENTS, listener);
    }

    /// Leaves the room. See [`Connection::leave_room`].
    pub fn leave(&self) -> BoxFuture<'static, Result<()>> {
        self.connection.leave_room(&self.inner.name)
    }
}

// ============================================================================
// Connection - Rooms
// ============================================================================

impl Connection {
    /// Joins a room and returns its handle.
    ///
    /// The `room_join` envelope is written now, or on the next `open`.
    /// Joining a name that is already registered returns the existing room
    /// without sending a second join.
    pub fn join_room(&self, name: impl Into<String>) -> Room {
        let name = name.into();

        if let Some(existing) = self.inner.rooms.find(&name) {
            debug!(room = %name, "Room already joined");
            return Room {
                inner: existing,
                connection: self.clone(),
            };
        }

        let room = Arc::new(RoomInner::new(name));
        self.inner.rooms.insert(Arc::clone(&room));
        self.send_join(&room);

        debug!(room = %room.name, "Room joined");

        Room {
            inner: room,
            connection: self.clone(),
        }
    }

    /// Leaves a room.
    ///
    /// The room is unregistered once the `room_leave` send settles, so events
    /// keep reaching it until then. The future resolves with the send result.
    ///
    /// # Errors
    ///
    /// - [`Error::RoomNotFound`] if no room has this name
    /// - [`Error::ConnectionClosed`] if [`close`](Connection::close) forgets
    ///   the room before the queued leave is sent
    /// - any error of [`Connection::send`]
    pub fn leave_room(&self, name: &str) -> BoxFuture<'static, Result<()>> {
        let Some(room) = self.inner.rooms.find(name) else {
            return future::ready(Err(Error::room_not_found(name))).boxed();
        };

        let (tx, rx) = oneshot::channel();
        let weak = self.downgrade();
        let envelope = self.stamp(Envelope::room_leave(name));
        let still_registered = Self::still_registered(Arc::downgrade(&room));

        self.deliver_while(envelope, still_registered, move |result| {
            if let Some(conn) = Connection::upgrade(&weak) {
                conn.inner.rooms.remove(&room);
            }
            if let Err(e) = &result {
                warn!(room = %room.name, error = %e, "Leave send failed");
            }
            debug!(room = %room.name, "Room left");
            let _ = tx.send(result);
        });

        async move { rx.await.unwrap_or(Err(Error::ConnectionClosed)) }.boxed()
    }

    /// Returns the room named `name`, if joined.
    #[must_use]
    pub fn get_room(&self, name: &str) -> Option<Room> {
        self.inner.rooms.find(name).map(|inner| Room {
            inner,
            connection: self.clone(),
        })
    }

    /// Returns the names of all registered rooms, in join order.
    #[must_use]
    pub fn rooms(&self) -> Vec<String> {
        self.inner
            .rooms
            .snapshot()
            .iter()
            .map(|room| room.name.clone())
            .collect()
    }

    /// Sends `room_leave` for every room.
    pub(crate) fn leave_all_rooms(&self) {
        for room in self.inner.rooms.snapshot() {
            // The leave future is not awaited; removal happens when it settles.
            drop(self.leave_room(&room.name));
        }
    }

    /// Re-sends joins for rooms that were joined before the socket dropped.
    pub(crate) fn rejoin_rooms(&self) {
        for room in self.inner.rooms.snapshot() {
            if !room.joined.load(Ordering::Acquire) {
                continue;
            }
            trace!(room = %room.name, "Re-joining room");
            if let Err(e) = self.write(&self.stamp(Envelope::room_join(&room.name))) {
                warn!(room = %room.name, error = %e, "Re-join failed");
            }
        }
    }

    /// Guard for queued room envelopes: a room forgotten by
    /// [`close`](Connection::close) before `open` sends nothing.
    fn still_registered(room: Weak<RoomInner>) -> impl Fn(&Connection) -> bool + Send + 'static {
        move |conn: &Connection| {
            room.upgrade()
                .is_some_and(|room| conn.inner.rooms.contains(&room))
        }
    }

    /// Writes or queues the join envelope for `room`.
    fn send_join(&self, room: &Arc<RoomInner>) {
        let envelope = self.stamp(Envelope::room_join(&room.name));
        let weak_room = Arc::downgrade(room);
        let still_registered = Self::still_registered(Weak::clone(&weak_room));

        self.deliver_while(envelope, still_registered, move |result| match result {
            Ok(()) => {
                if let Some(room) = weak_room.upgrade() {
                    room.joined.store(true, Ordering::Release);
                }
            }
            Err(e) => warn!(error = %e, "Join send failed"),
        });
    }
}
