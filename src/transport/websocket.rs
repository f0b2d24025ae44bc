//! WebSocket transport and per-socket I/O loop.
//!
//! Each [`Transport::open`] spawns a tokio task that performs the client
//! handshake and then multiplexes:
//!
//! - Incoming text frames → [`SocketEvents::message`]
//! - Outgoing frames queued by [`Socket::send`]
//! - Close requests queued by [`Socket::close`]
//!
//! Failures are reported as `error` followed by `close`, the same cascade a
//! browser WebSocket produces.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{ReadyState, Socket, SocketEvents, Transport};

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the I/O loop.
enum SocketCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket.
    Close,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Default [`Transport`] backed by `tokio-tungstenite`.
///
/// `wss://` URLs require the `tls` crate feature.
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport {
    /// Runtime used to spawn I/O tasks; the ambient runtime when `None`.
    handle: Option<Handle>,
}

impl WebSocketTransport {
    /// Creates a transport spawning on the ambient tokio runtime.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport spawning on a specific runtime.
    #[inline]
    #[must_use]
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &Url, events: SocketEvents) -> Arc<dyn Socket> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));

        let socket = Arc::new(WebSocket {
            command_tx,
            state: Arc::clone(&state),
        });

        let handle = match self.handle.clone().map_or_else(Handle::try_current, Ok) {
            Ok(handle) => handle,
            Err(e) => {
                let error = Error::runtime(format!("No tokio runtime to drive the socket: {e}"));
                error!(%error, "Socket not started");
                state.store(ReadyState::Closed as u8, Ordering::Release);
                events.error(error.to_string());
                events.close();
                return socket;
            }
        };

        handle.spawn(run_socket(url.clone(), command_rx, state, events));

        socket
    }
}

// ============================================================================
// WebSocket
// ============================================================================

/// Handle to one socket's I/O loop.
struct WebSocket {
    /// Channel to the I/O loop.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Readiness shared with the I/O loop.
    state: Arc<AtomicU8>,
}

impl Socket for WebSocket {
    fn send(&self, text: String) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::NotConnected);
        }

        self.command_tx
            .send(SocketCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.command_tx.send(SocketCommand::Close);
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }
}

// ============================================================================
// I/O Loop
// ============================================================================

/// Connects, then pumps frames until either side closes.
async fn run_socket(
    url: Url,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    state: Arc<AtomicU8>,
    events: SocketEvents,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let error = Error::from(e);
            warn!(%url, %error, "WebSocket handshake failed");
            state.store(ReadyState::Closed as u8, Ordering::Release);
            events.error(error.to_string());
            events.close();
            return;
        }
    };

    debug!(%url, "WebSocket connected");
    state.store(ReadyState::Open as u8, Ordering::Release);
    events.open();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        events.message(text.as_str());
                    }

                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        let error = Error::from(e);
                        error!(%error, "Read failed");
                        events.error(error.to_string());
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong, Frame
                    _ => {}
                }
            }

            // Commands from the owning connection
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            let error = Error::from(e);
                            warn!(%error, "Failed to write frame");
                            events.error(error.to_string());
                            break;
                        }
                        trace!("Frame sent");
                    }

                    Some(SocketCommand::Close) | None => {
                        debug!("Close requested");
                        state.store(ReadyState::Closing as u8, Ordering::Release);
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    state.store(ReadyState::Closed as u8, Ordering::Release);
    events.close();

    debug!(%url, "Socket loop terminated");
}

// ============================================================================
// Tests
// ============================================================================
