//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - A loopback server that echoes room traffic

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub url: Option<String>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            url: args
                .iter()
                .position(|a| a == "--url")
                .and_then(|i| args.get(i + 1).cloned()),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug { "roomlink=trace" } else { "roomlink=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Starts a loopback server and returns its `ws://` URL.
///
/// The server answers `ping` with `pong`, acknowledges room joins with a
/// `joined` event, and echoes every other frame back with a sender attached.
pub async fn spawn_loopback() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream));
        }
    });

    Ok(format!("ws://{addr}/ws"))
}

async fn serve(stream: TcpStream) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(Message::Text(text))) = ws.next().await {
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        let reply = match frame["event"].as_str().unwrap_or_default() {
            "ping" => json!({ "event": "pong", "receiver": { "type": "system" } }),
            "auth.token" | "pong" | "room_leave" => continue,
            "room_join" => json!({
                "event": "joined",
                "data": frame["data"],
                "receiver": frame["receiver"],
            }),
            _ => {
                let mut echo = frame.clone();
                echo["sender"] = json!({
                    "type": "user",
                    "id": 1,
                    "info": "{\"name\":\"loopback\"}",
                });
                echo
            }
        };

        if ws.send(Message::text(reply.to_string())).await.is_err() {
            break;
        }
    }
}
