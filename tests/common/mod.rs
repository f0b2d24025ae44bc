//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use roomlink::{Connection, Error, ReadyState, Result, Socket, SocketEvents, Transport};
use serde_json::Value;
use url::Url;

// ============================================================================
// MockSocket
// ============================================================================

/// Socket driven by the test.
///
/// `close()` reports `close` synchronously, like a transport whose close
/// handshake completes immediately. With deferred close, a close requested
/// during the handshake is only recorded, like [`roomlink::WebSocketTransport`]
/// which reads commands once the handshake is done.
pub struct MockSocket {
    events: SocketEvents,
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<String>>,
    defer_close: bool,
    close_requested: Mutex<bool>,
}

impl MockSocket {
    fn new(events: SocketEvents, defer_close: bool) -> Self {
        Self {
            events,
            state: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
            defer_close,
            close_requested: Mutex::new(false),
        }
    }

    /// Completes the handshake.
    pub fn open(&self) {
        *self.state.lock() = ReadyState::Open;
        self.events.open();
    }

    /// Delivers an inbound text frame.
    pub fn receive(&self, text: impl Into<String>) {
        self.events.message(text);
    }

    /// Delivers an inbound JSON frame.
    pub fn receive_json(&self, value: Value) {
        self.events.message(value.to_string());
    }

    /// Simulates the server dropping the connection.
    pub fn drop_connection(&self) {
        *self.state.lock() = ReadyState::Closed;
        self.events.close();
    }

    /// Simulates a transport failure: `error` then `close`.
    pub fn fail(&self, message: &str) {
        *self.state.lock() = ReadyState::Closed;
        self.events.error(message);
        self.events.close();
    }

    /// Raw frames written so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Frames written so far, parsed.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).expect("sent frame is JSON"))
            .collect()
    }

    /// Event names written so far.
    pub fn sent_events(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|frame| frame["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock() == ReadyState::Closed
    }

    /// Whether `close()` was called at any point.
    pub fn close_requested(&self) -> bool {
        *self.close_requested.lock()
    }
}

impl Socket for MockSocket {
    fn send(&self, text: String) -> Result<()> {
        if *self.state.lock() != ReadyState::Open {
            return Err(Error::NotConnected);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    fn close(&self) {
        *self.close_requested.lock() = true;
        {
            let mut state = self.state.lock();
            if *state == ReadyState::Closed {
                return;
            }
            if self.defer_close && *state == ReadyState::Connecting {
                return;
            }
            *state = ReadyState::Closed;
        }
        self.events.close();
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }
}

// ============================================================================
// MockTransport
// ============================================================================

/// Transport recording every socket it opens.
#[derive(Clone, Default)]
pub struct MockTransport {
    sockets: Arc<Mutex<Vec<Arc<MockSocket>>>>,
    defer_close: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose sockets ignore `close()` until their handshake ends.
    pub fn with_deferred_close() -> Self {
        Self {
            defer_close: true,
            ..Self::default()
        }
    }

    /// Number of sockets opened so far.
    pub fn count(&self) -> usize {
        self.sockets.lock().len()
    }

    /// Socket opened `index`-th.
    pub fn socket(&self, index: usize) -> Arc<MockSocket> {
        Arc::clone(&self.sockets.lock()[index])
    }

    /// Most recently opened socket.
    pub fn last(&self) -> Arc<MockSocket> {
        Arc::clone(self.sockets.lock().last().expect("a socket was opened"))
    }
}

impl Transport for MockTransport {
    fn open(&self, _url: &Url, events: SocketEvents) -> Arc<dyn Socket> {
        let socket = Arc::new(MockSocket::new(events, self.defer_close));
        self.sockets.lock().push(Arc::clone(&socket));
        socket
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(500);

/// Connection on a fresh mock transport with a short reconnect interval.
pub fn connection() -> (Connection, MockTransport) {
    connection_with(|builder| builder)
}

/// Like [`connection`], with extra builder settings.
pub fn connection_with(
    configure: impl FnOnce(roomlink::ConnectionBuilder) -> roomlink::ConnectionBuilder,
) -> (Connection, MockTransport) {
    connection_on(MockTransport::new(), configure)
}

/// Like [`connection_with`], on the given transport.
pub fn connection_on(
    transport: MockTransport,
    configure: impl FnOnce(roomlink::ConnectionBuilder) -> roomlink::ConnectionBuilder,
) -> (Connection, MockTransport) {
    let builder = Connection::builder()
        .url("ws://chat.test/ws")
        .reconnect_interval(RECONNECT_INTERVAL)
        .transport(transport.clone());
    let conn = configure(builder).build().expect("build connection");
    (conn, transport)
}

/// Connects and completes the handshake of the first socket.
pub fn open_connection() -> (Connection, MockTransport) {
    let (conn, transport) = connection();
    conn.connect();
    transport.last().open();
    (conn, transport)
}

/// Shared, ordered log of observed notifications.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns a `Fn()` listener appending `entry`.
    pub fn recorder(&self, entry: &'static str) -> impl Fn() + Send + Sync + 'static {
        let log = self.clone();
        move || log.push(entry)
    }
}

/// Lets spawned tasks run.
pub async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

/// Advances paused time past `duration` and lets timers fire.
pub async fn elapse(duration: Duration) {
    tokio::time::sleep(duration + Duration::from_millis(1)).await;
    settle().await;
}
