//! Connection lifecycle state machine.
//!
//! A [`Connection`] owns at most one socket at a time, at most one pending
//! reconnect timer, and the keepalive timer. Every transition happens under
//! the machine lock; listeners always run after the lock is released so they
//! can call back into the connection.
//!
//! # Sockets and Generations
//!
//! Each opened socket is tagged with a generation number. Notifications from
//! a socket that has since been replaced are dropped, so a late `close` from
//! an old socket can never tear down its successor.
//!
//! # Buffering
//!
//! [`Connection::send`] while not open registers a one-shot `open` listener
//! that performs the write once the socket opens. Buffered sends flush in
//! call order and there is no bound on how many may wait.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::bus::EventBus;
use crate::error::{Error, Result};
use crate::protocol::{Envelope, Frame, Receiver};
use crate::transport::{ReadyState, Socket, SocketEvent, SocketEvents, Transport};

use super::builder::ConnectionBuilder;
use super::events::{self, Signal};
use super::options::ConnectionOptions;
use super::room::RoomRegistry;
use super::state::ConnectionState;

// ============================================================================
// Types
// ============================================================================

/// Future returned by [`Connection::send`].
///
/// Resolves to the connection once the envelope was handed to the socket.
pub type SendFuture = BoxFuture<'static, Result<Connection>>;

// ============================================================================
// Machine
// ============================================================================

/// Mutable lifecycle state, guarded by one lock.
struct Machine {
    /// Current lifecycle state.
    state: ConnectionState,
    /// Attached socket, if any.
    socket: Option<Arc<dyn Socket>>,
    /// Generation of the attached socket.
    generation: u64,
    /// Automatic reconnection configured.
    reconnect: bool,
    /// `close()` was called; cleared by `connect()` and `reconnect()`.
    user_closed: bool,
    /// The server rejected this client; automatic reconnection is off for good.
    rejected: bool,
    /// The pending close was caused by `reconnect()`.
    internal_reconnection: bool,
    /// Close the socket as soon as it reports open.
    close_on_open: bool,
    /// Delay before reconnecting.
    reconnect_interval: Duration,
    /// Keepalive period.
    ping_interval: Option<Duration>,
    /// Token attached to outgoing envelopes.
    auth_token: Option<String>,
    /// Re-send room joins after reconnecting.
    rejoin_rooms: bool,
    /// Pending reconnect timer.
    reconnect_timer: Option<JoinHandle<()>>,
    /// Sequence number of the pending reconnect timer.
    reconnect_seq: u64,
    /// Keepalive timer.
    ping_timer: Option<JoinHandle<()>>,
}

impl Machine {
    fn new(options: ConnectionOptions) -> Self {
        Self {
            state: ConnectionState::Standby,
            socket: None,
            generation: 0,
            reconnect: options.reconnect,
            user_closed: false,
            rejected: false,
            internal_reconnection: false,
            close_on_open: false,
            reconnect_interval: options.reconnect_interval,
            ping_interval: options.ping_interval,
            auth_token: options.auth_token,
            rejoin_rooms: options.rejoin_rooms,
            reconnect_timer: None,
            reconnect_seq: 0,
            ping_timer: None,
        }
    }

    /// Aborts the pending reconnect timer.
    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
            trace!("Reconnect timer cancelled");
        }
    }

    /// Aborts the keepalive timer.
    fn stop_keepalive(&mut self) {
        if let Some(timer) = self.ping_timer.take() {
            timer.abort();
            trace!("Keepalive stopped");
        }
    }

    /// Returns `true` when an unexpected close should schedule a retry.
    fn auto_reconnect(&self) -> bool {
        self.reconnect && !self.user_closed && !self.rejected
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.cancel_reconnect();
        self.stop_keepalive();
    }
}

// ============================================================================
// ConnectionInner
// ============================================================================

/// Internal shared state for a connection.
pub(crate) struct ConnectionInner {
    /// Resolved endpoint.
    url: Url,
    /// Socket factory.
    transport: Arc<dyn Transport>,
    /// Runtime for timers and deferred notifications.
    runtime: Handle,
    /// Lifecycle state.
    machine: Mutex<Machine>,
    /// Connection-level listeners.
    pub(crate) bus: EventBus<Signal>,
    /// Joined rooms.
    pub(crate) rooms: RoomRegistry,
}

// ============================================================================
// Connection
// ============================================================================

/// A resilient connection to one messaging endpoint.
///
/// Cheap to clone; all clones share the same socket, listeners and rooms.
/// Dropping the last clone cancels every timer and closes the socket.
///
/// # Example
///
/// ```no_run
/// use roomlink::Connection;
///
/// # async fn example() -> roomlink::Result<()> {
/// let conn = Connection::builder().url("ws://127.0.0.1:9000/ws").build()?;
///
/// conn.on_event("chat", |envelope| println!("{:?}", envelope.data));
/// conn.connect();
///
/// // Resolves once the socket is open.
/// conn.send("chat", "hello", None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    /// Shared inner state.
    pub(crate) inner: Arc<ConnectionInner>,
}

// ============================================================================
// Connection - Display
// ============================================================================

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machine = self.inner.machine.lock();
        f.debug_struct("Connection")
            .field("url", &self.inner.url.as_str())
            .field("state", &machine.state)
            .field("generation", &machine.generation)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructor
// ============================================================================

impl Connection {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Creates a connection in the `standby` state.
    pub(crate) fn new(
        url: Url,
        options: ConnectionOptions,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        debug!(%url, "Connection created");
        Self {
            inner: Arc::new(ConnectionInner {
                url,
                transport,
                runtime,
                machine: Mutex::new(Machine::new(options)),
                bus: EventBus::new(),
                rooms: RoomRegistry::default(),
            }),
        }
    }

    /// Rebuilds a handle from a weak reference.
    #[inline]
    pub(crate) fn upgrade(weak: &Weak<ConnectionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Returns a weak reference for timers and listeners.
    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<ConnectionInner> {
        Arc::downgrade(&self.inner)
    }
}

// ============================================================================
// Connection - Queries & Settings
// ============================================================================

impl Connection {
    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.machine.lock().state
    }

    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the resolved endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns `true` if a reconnect timer is pending.
    #[must_use]
    pub fn has_pending_reconnect(&self) -> bool {
        self.inner
            .machine
            .lock()
            .reconnect_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Sets the reconnection delay. Zero disables automatic retries.
    pub fn set_reconnection_interval(&self, interval: Duration) {
        self.inner.machine.lock().reconnect_interval = interval;
    }

    /// Enables or disables automatic reconnection.
    pub fn set_reconnect(&self, enabled: bool) {
        self.inner.machine.lock().reconnect = enabled;
    }

    /// Sets or clears the token attached to outgoing envelopes.
    pub fn set_auth_token(&self, token: Option<String>) {
        self.inner.machine.lock().auth_token = token;
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Opens the socket.
    ///
    /// Does nothing while connecting, reconnecting or open. Supersedes a
    /// pending reconnect timer and lifts a previous [`close`](Self::close).
    pub fn connect(&self) {
        {
            let mut machine = self.inner.machine.lock();
            if machine.state.is_active() {
                debug!(state = %machine.state, "Connect ignored");
                return;
            }
            machine.user_closed = false;
            machine.cancel_reconnect();
        }

        self.establish(false);
    }

    /// Closes the connection for good.
    ///
    /// Automatic reconnection stays off until the next [`connect`](Self::connect).
    /// Joined rooms are left. A socket that is still connecting is closed as
    /// soon as it opens. `disconnect` listeners run on the next scheduler tick.
    pub fn close(&self) {
        if self.is_opened() {
            self.leave_all_rooms();
        } else {
            self.inner.rooms.clear();
        }

        let socket = {
            let mut machine = self.inner.machine.lock();
            machine.user_closed = true;
            machine.internal_reconnection = false;
            machine.cancel_reconnect();
            machine.stop_keepalive();
            machine.state = ConnectionState::Closed;

            let connecting = machine
                .socket
                .as_ref()
                .is_some_and(|socket| socket.ready_state() == ReadyState::Connecting);

            if connecting {
                machine.close_on_open = true;
                None
            } else {
                machine.socket.clone()
            }
        };

        info!(url = %self.inner.url, "Connection closed by user");

        if let Some(socket) = socket {
            socket.close();
        }

        let weak = self.downgrade();
        self.inner.runtime.spawn(async move {
            if let Some(conn) = Self::upgrade(&weak) {
                conn.emit(events::DISCONNECT, &Signal::Lifecycle(ConnectionState::Closed));
            }
        });
    }

    /// Forces a reconnection.
    ///
    /// Closes the socket without triggering the automatic path and schedules
    /// exactly one attempt after the reconnection interval, even when it is
    /// zero.
    pub fn reconnect(&self) {
        let socket = {
            let mut machine = self.inner.machine.lock();
            machine.user_closed = false;
            machine.stop_keepalive();
            let socket = machine.socket.clone();
            if let Some(socket) = &socket {
                machine.state = ConnectionState::InternalReconnection;
                machine.internal_reconnection = true;
                machine.close_on_open = socket.ready_state() == ReadyState::Connecting;
            }
            socket
        };

        debug!("Manual reconnect requested");

        if let Some(socket) = socket {
            socket.close();
        }

        self.schedule_reconnect(true);
    }

    /// Opens a new socket, replacing any previous one.
    fn establish(&self, reconnecting: bool) {
        let (state, notice) = if reconnecting {
            (ConnectionState::Reconnecting, events::RECONNECTING)
        } else {
            (ConnectionState::Connecting, events::CONNECTING)
        };

        let (generation, previous) = {
            let mut machine = self.inner.machine.lock();
            machine.generation += 1;
            machine.state = state;
            machine.close_on_open = false;
            machine.internal_reconnection = false;
            (machine.generation, machine.socket.take())
        };

        if let Some(previous) = previous {
            previous.close();
        }

        debug!(url = %self.inner.url, generation, state = %state, "Opening socket");
        self.emit(notice, &Signal::Lifecycle(state));

        // A listener may have closed or restarted the connection.
        {
            let machine = self.inner.machine.lock();
            if machine.generation != generation || machine.state != state {
                debug!(generation, "Socket open superseded");
                return;
            }
        }

        let socket = self
            .inner
            .transport
            .open(&self.inner.url, self.socket_events(generation));

        // A synchronous failure inside `open` has already run `handle_close`.
        let mut machine = self.inner.machine.lock();
        if machine.generation == generation && machine.state == state {
            machine.socket = Some(socket);
        } else {
            drop(machine);
            socket.close();
        }
    }

    /// Builds the notification sink for one socket generation.
    fn socket_events(&self, generation: u64) -> SocketEvents {
        let weak = self.downgrade();
        SocketEvents::new(move |event| {
            if let Some(conn) = Self::upgrade(&weak) {
                conn.handle_socket_event(generation, event);
            }
        })
    }

    /// Entry point for socket notifications.
    pub(crate) fn handle_socket_event(&self, generation: u64, event: SocketEvent) {
        let current = self.inner.machine.lock().generation;
        if current != generation {
            trace!(generation, current, ?event, "Stale socket notification dropped");
            return;
        }

        match event {
            SocketEvent::Open => self.handle_open(generation),
            SocketEvent::Message(text) => self.handle_message(&text),
            SocketEvent::Close => self.handle_close(),
            SocketEvent::Error(message) => self.handle_error(message),
        }
    }

    /// Socket became writable.
    fn handle_open(&self, generation: u64) {
        let (socket, reconnecting, token, ping_interval, rejoin) = {
            let mut machine = self.inner.machine.lock();

            if machine.close_on_open
                || matches!(
                    machine.state,
                    ConnectionState::Closed | ConnectionState::InternalReconnection
                )
            {
                machine.close_on_open = false;
                let socket = machine.socket.clone();
                drop(machine);
                debug!(generation, "Socket opened after close or reconnect request, closing it");
                if let Some(socket) = socket {
                    socket.close();
                }
                return;
            }

            let Some(socket) = machine.socket.clone() else {
                warn!(generation, "Open notification without attached socket");
                return;
            };

            (
                socket,
                machine.state == ConnectionState::Reconnecting,
                machine.auth_token.clone(),
                machine.ping_interval,
                machine.rejoin_rooms,
            )
        };

        if let Some(token) = token
            && let Err(e) = Self::write_socket(&socket, &Envelope::auth(token))
        {
            warn!(error = %e, "Failed to send auth token");
        }

        {
            let mut machine = self.inner.machine.lock();
            if machine.generation != generation {
                return;
            }
            machine.stop_keepalive();
            if let Some(period) = ping_interval.filter(|p| !p.is_zero()) {
                machine.ping_timer = Some(self.spawn_keepalive(period));
            }
            machine.state = ConnectionState::Open;
        }

        info!(url = %self.inner.url, generation, reconnecting, "Connection open");

        if reconnecting && rejoin {
            self.rejoin_rooms();
        }

        if reconnecting {
            self.emit(events::RECONNECT, &Signal::Lifecycle(ConnectionState::Open));
        }
        self.emit(events::OPEN, &Signal::Lifecycle(ConnectionState::Open));
    }

    /// Inbound text frame.
    fn handle_message(&self, text: &str) {
        trace!(len = text.len(), "Frame received");

        match Frame::decode(text) {
            Ok(frame) => {
                self.emit(events::MESSAGE, &Signal::Envelope(frame.envelope().clone()));
                self.route(frame);
            }
            Err(e) => {
                let error = Error::protocol(format!("Malformed frame: {e}"));
                warn!(%error, "Frame dropped");
                self.emit(events::ERROR, &Signal::Error(error.to_string()));
            }
        }
    }

    /// Socket closed.
    fn handle_close(&self) {
        let retry = {
            let mut machine = self.inner.machine.lock();
            machine.stop_keepalive();
            machine.socket = None;
            machine.close_on_open = false;

            if machine.state == ConnectionState::Closed {
                false
            } else {
                let internal = std::mem::take(&mut machine.internal_reconnection);
                machine.state = ConnectionState::Close;
                !internal && machine.auto_reconnect()
            }
        };

        debug!(url = %self.inner.url, retry, "Socket closed");
        self.emit(events::CLOSE, &Signal::Lifecycle(ConnectionState::Close));

        if retry {
            self.schedule_reconnect(false);
        }
    }

    /// Socket failure. Reconnection is driven by the `close` that follows.
    fn handle_error(&self, message: String) {
        {
            let mut machine = self.inner.machine.lock();
            if !matches!(
                machine.state,
                ConnectionState::Closed | ConnectionState::InternalReconnection
            ) {
                machine.state = ConnectionState::Error;
            }
        }

        warn!(url = %self.inner.url, error = %message, "Socket error");
        self.emit(events::ERROR, &Signal::Error(message));
    }

    /// Server refused this client: stop every retry and keepalive.
    pub(crate) fn handle_rejection(&self) {
        let mut machine = self.inner.machine.lock();
        machine.rejected = true;
        machine.cancel_reconnect();
        machine.stop_keepalive();
        warn!(url = %self.inner.url, "Connection rejected by server, reconnection disabled");
    }
}

// ============================================================================
// Connection - Timers
// ============================================================================

impl Connection {
    /// Schedules a single reconnection attempt.
    ///
    /// The automatic path skips scheduling when the interval is zero; a
    /// forced schedule always retries.
    fn schedule_reconnect(&self, forced: bool) {
        let mut machine = self.inner.machine.lock();
        machine.cancel_reconnect();

        let interval = machine.reconnect_interval;
        if interval.is_zero() && !forced {
            debug!("Reconnect interval is zero, not retrying");
            return;
        }

        debug!(?interval, forced, "Reconnect scheduled");

        machine.reconnect_seq += 1;
        let seq = machine.reconnect_seq;
        let weak = self.downgrade();
        machine.reconnect_timer = Some(self.inner.runtime.spawn(async move {
            sleep(interval).await;
            if let Some(conn) = Self::upgrade(&weak) {
                conn.fire_reconnect(seq, forced);
            }
        }));
    }

    /// Reconnect timer elapsed.
    fn fire_reconnect(&self, seq: u64, forced: bool) {
        {
            let mut machine = self.inner.machine.lock();
            if machine.reconnect_seq != seq {
                return;
            }
            // Detach without aborting: this is the timer's own task.
            machine.reconnect_timer = None;
            if !forced && !machine.auto_reconnect() {
                return;
            }
        }

        self.establish(true);
    }

    /// Starts the keepalive loop for the current socket.
    fn spawn_keepalive(&self, period: Duration) -> JoinHandle<()> {
        let weak = self.downgrade();
        self.inner.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(conn) = Self::upgrade(&weak) else {
                    break;
                };
                if let Err(e) = conn.write(&Envelope::ping()) {
                    debug!(error = %e, "Keepalive ping failed");
                }
            }
        })
    }
}

// ============================================================================
// Connection - Sending
// ============================================================================

impl Connection {
    /// Sends an application event.
    ///
    /// While the connection is not open the envelope waits for the next
    /// `open` and the future stays pending until then. The envelope is
    /// queued when `send` is called, not when the future is first polled.
    ///
    /// # Errors
    ///
    /// The future resolves to:
    ///
    /// - [`Error::NotConnected`] if the socket is not writable at flush time
    /// - [`Error::ConnectionClosed`] if the connection is dropped first
    /// - [`Error::Json`] if the payload cannot be serialized
    pub fn send(
        &self,
        event: impl Into<String>,
        data: impl Into<Value>,
        receiver: Option<Receiver>,
    ) -> SendFuture {
        let envelope = self.stamp(Envelope::new(event, data).with_receiver(receiver));
        let (tx, rx) = oneshot::channel();

        self.deliver(envelope, move |result| {
            let _ = tx.send(result);
        });

        let conn = self.clone();
        async move {
            match rx.await {
                Ok(Ok(())) => Ok(conn),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::ConnectionClosed),
            }
        }
        .boxed()
    }

    /// Attaches the auth token to an outgoing envelope.
    pub(crate) fn stamp(&self, envelope: Envelope) -> Envelope {
        let token = self.inner.machine.lock().auth_token.clone();
        envelope.with_token(token)
    }

    /// Writes now if open, otherwise on the next `open`.
    ///
    /// `on_settled` runs exactly once with the write result, unless the
    /// connection is dropped before it opens.
    pub(crate) fn deliver<F>(&self, envelope: Envelope, on_settled: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.deliver_while(envelope, |_| true, on_settled);
    }

    /// Like [`deliver`](Self::deliver), but a queued envelope is discarded
    /// at `open` when `wanted` returns `false`. `on_settled` is then dropped
    /// without being called.
    pub(crate) fn deliver_while<G, F>(&self, envelope: Envelope, wanted: G, on_settled: F)
    where
        G: Fn(&Connection) -> bool + Send + 'static,
        F: FnOnce(Result<()>) + Send + 'static,
    {
        {
            let machine = self.inner.machine.lock();
            if machine.state != ConnectionState::Open {
                let weak = self.downgrade();
                trace!(event = %envelope.event, "Send queued until open");
                self.inner.bus.once(events::OPEN, move |_| {
                    let result = match Self::upgrade(&weak) {
                        Some(conn) if !wanted(&conn) => {
                            debug!(event = %envelope.event, "Queued send discarded");
                            return;
                        }
                        Some(conn) => conn.write(&envelope),
                        None => Err(Error::ConnectionClosed),
                    };
                    on_settled(result);
                });
                return;
            }
        }

        on_settled(self.write(&envelope));
    }

    /// Writes an envelope to the open socket.
    pub(crate) fn write(&self, envelope: &Envelope) -> Result<()> {
        let socket = {
            let machine = self.inner.machine.lock();
            if machine.state != ConnectionState::Open {
                return Err(Error::NotConnected);
            }
            machine.socket.clone().ok_or(Error::NotConnected)?
        };

        Self::write_socket(&socket, envelope)
    }

    /// Serializes and writes to a specific socket.
    fn write_socket(socket: &Arc<dyn Socket>, envelope: &Envelope) -> Result<()> {
        let text = envelope.to_json()?;
        trace!(event = %envelope.event, "Envelope sent");
        socket.send(text)
    }

    /// Dispatches on the connection bus.
    #[inline]
    pub(crate) fn emit(&self, name: &str, signal: &Signal) {
        self.inner.bus.dispatch(name, signal);
    }
}

// ============================================================================
// Tests
// ============================================================================
