//! Rooms and events over a live WebSocket.
//!
//! Demonstrates:
//! - Building a connection with keepalive and an auth token
//! - Connection-level and room-level listeners
//! - Sends issued before the socket opens
//! - Leaving a room and closing the connection
//!
//! Usage:
//!   cargo run --example 001_lobby
//!   cargo run --example 001_lobby -- --debug
//!   cargo run --example 001_lobby -- --url ws://127.0.0.1:9000/ws

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use roomlink::{Connection, Result};
use serde_json::json;
use tokio::sync::mpsc;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: Lobby ===\n");

    let url = match args.url {
        Some(url) => url,
        None => common::spawn_loopback()
            .await
            .map_err(|e| roomlink::Error::connection(e.to_string()))?,
    };
    println!("[Setup] Endpoint: {url}");

    // ========================================================================
    // Connect
    // ========================================================================

    let conn = Connection::builder()
        .url(url)
        .ping_interval(Duration::from_secs(5))
        .auth_token("demo-token")
        .build()?;

    conn.on_open(|| println!("[Conn] open"));
    conn.on_close(|| println!("[Conn] close"));
    conn.on_error(|message| println!("[Conn] error: {message}"));

    // ========================================================================
    // Rooms
    // ========================================================================

    let (tx, mut rx) = mpsc::unbounded_channel();

    let lobby = conn.join_room("lobby");
    lobby.on("joined", |envelope| println!("[Lobby] joined: {}", envelope.data));
    lobby.on("chat", move |envelope| {
        let from = envelope
            .sender
            .as_ref()
            .and_then(|sender| sender.info.as_ref())
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("[Lobby] chat from {from}: {}", envelope.data);
        let _ = tx.send(());
    });

    conn.connect();

    // Queued until the socket opens.
    lobby.send("chat", json!({ "text": "hello" })).await?;
    println!("[Lobby] message sent");

    if tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.is_err() {
        println!("[Lobby] no echo received");
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    lobby.leave().await?;
    println!("[Lobby] left, rooms: {:?}", conn.rooms());

    conn.close();
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("\n=== Done ===");

    Ok(())
}
