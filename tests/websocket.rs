//! End-to-end over the default WebSocket transport.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomlink::{Connection, ConnectionState, Envelope};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts one client and replays every text frame to it with a sender set.
async fn echo_server() -> anyhow::Result<(String, mpsc::UnboundedReceiver<Value>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = accept_async(stream).await else {
            return;
        };

        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let Ok(mut frame) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let _ = seen_tx.send(frame.clone());

            frame["sender"] = json!({ "type": "user", "id": 1, "info": "{\"name\":\"echo\"}" });
            if ws.send(Message::text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    Ok((format!("ws://{addr}/ws"), seen_rx))
}

#[tokio::test]
async fn test_room_round_trip() -> anyhow::Result<()> {
    let (url, mut seen) = echo_server().await?;

    let conn = Connection::builder()
        .url(url)
        .auth_token("secret")
        .reconnect(false)
        .build()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let lobby = conn.join_room("lobby");
    lobby.on("chat", move |envelope| {
        let _ = tx.send(envelope.clone());
    });

    conn.connect();
    timeout(WAIT, lobby.send("chat", json!({ "text": "hi" }))).await??;
    assert_eq!(conn.state(), ConnectionState::Open);

    let echoed = timeout(WAIT, rx.recv()).await?.expect("room event");
    assert_eq!(echoed.data, json!({ "text": "hi" }));
    assert_eq!(
        echoed.sender.and_then(|sender| sender.info),
        Some(json!({ "name": "echo" }))
    );

    let mut events = Vec::new();
    for _ in 0..3 {
        let frame = timeout(WAIT, seen.recv()).await?.expect("frame seen by server");
        events.push(frame["event"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(events, vec!["auth.token", "room_join", "chat"]);

    timeout(WAIT, lobby.leave()).await??;
    assert!(conn.rooms().is_empty());

    conn.close();
    assert_eq!(conn.state(), ConnectionState::Closed);

    Ok(())
}
