//! Inbound frame routing on the connection.

mod common;

use std::sync::Arc;

use common::{Log, RECONNECT_INTERVAL, elapse, open_connection};
use parking_lot::Mutex;
use roomlink::{ConnectionState, Envelope};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn test_ping_answered_with_pong() {
    let (_conn, transport) = open_connection();

    transport.last().receive_json(json!({ "event": "ping" }));

    let sent = transport.last().sent_json();
    assert_eq!(transport.last().sent_events(), vec!["pong"]);
    assert_eq!(sent[0]["receiver"]["type"], "system");
}

#[tokio::test(start_paused = true)]
async fn test_control_frames_not_dispatched_as_events() {
    let (conn, transport) = open_connection();
    let messages = Log::default();
    let events = Log::default();
    let messages_clone = messages.clone();
    let events_clone = events.clone();
    conn.on_message(move |envelope| messages_clone.push(envelope.event.clone()));
    conn.on_any_event(move |envelope| events_clone.push(envelope.event.clone()));

    transport.last().receive_json(json!({ "event": "ping" }));
    transport.last().receive_json(json!({ "event": "pong" }));
    transport.last().receive_json(json!({ "event": "auth.token", "data": { "ok": true } }));

    assert_eq!(messages.entries(), vec!["ping", "pong", "auth.token"]);
    assert!(events.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_event_dispatch_order() {
    let (conn, transport) = open_connection();
    let log = Log::default();

    let l = log.clone();
    conn.on_message(move |_| l.push("message"));
    let l = log.clone();
    conn.on_any_event(move |envelope| l.push(format!("event:{}", envelope.event)));
    let l = log.clone();
    conn.on_event("chat", move |_| l.push("event.chat"));
    let l = log.clone();
    conn.on_event("other", move |_| l.push("event.other"));

    transport
        .last()
        .receive_json(json!({ "event": "chat", "data": { "text": "hi" } }));

    assert_eq!(log.entries(), vec!["message", "event:chat", "event.chat"]);
}

#[tokio::test(start_paused = true)]
async fn test_message_alias_for_data() {
    let (conn, transport) = open_connection();
    let seen: Arc<Mutex<Option<Envelope>>> = Arc::default();
    let seen_clone = Arc::clone(&seen);
    conn.on_event("chat", move |envelope| *seen_clone.lock() = Some(envelope.clone()));

    transport.last().receive_json(json!({ "event": "chat", "message": "hello" }));

    let envelope = seen.lock().clone().expect("event delivered");
    assert_eq!(envelope.data, "hello");
}

#[tokio::test(start_paused = true)]
async fn test_nested_json_decoded_before_listeners() {
    let (conn, transport) = open_connection();
    let seen: Arc<Mutex<Option<Envelope>>> = Arc::default();
    let seen_clone = Arc::clone(&seen);
    conn.on_event("chat", move |envelope| *seen_clone.lock() = Some(envelope.clone()));

    transport.last().receive_json(json!({
        "event": "chat",
        "sender": { "type": "user", "id": 7, "info": "{\"name\":\"ann\"}" },
        "meta": { "user_info": "{\"role\":\"admin\"}", "trace": "{\"keep\":1}" }
    }));

    let envelope = seen.lock().clone().expect("event delivered");
    let sender = envelope.sender.expect("sender");
    assert_eq!(sender.kind, "user");
    assert_eq!(sender.id, 7);
    assert_eq!(sender.info, Some(json!({ "name": "ann" })));

    let meta = envelope.meta.expect("meta");
    assert_eq!(meta["user_info"], json!({ "role": "admin" }));
    assert_eq!(meta["trace"], "{\"keep\":1}");
}

#[tokio::test(start_paused = true)]
async fn test_nested_non_json_kept_raw() {
    let (conn, transport) = open_connection();
    let seen: Arc<Mutex<Option<Envelope>>> = Arc::default();
    let seen_clone = Arc::clone(&seen);
    conn.on_any_event(move |envelope| *seen_clone.lock() = Some(envelope.clone()));

    transport.last().receive_json(json!({
        "event": "chat",
        "sender": { "type": "user", "id": "u1", "info": "not json" }
    }));

    let envelope = seen.lock().clone().expect("event delivered");
    assert_eq!(envelope.sender.and_then(|s| s.info), Some(json!("not json")));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_reports_error() {
    let (conn, transport) = open_connection();
    let errors = Log::default();
    let events = Log::default();
    let errors_clone = errors.clone();
    let events_clone = events.clone();
    conn.on_error(move |message| errors_clone.push(message));
    conn.on_any_event(move |envelope| events_clone.push(envelope.event.clone()));

    transport.last().receive("not json at all");

    let errors = errors.entries();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Protocol error: Malformed frame"));
    assert!(events.entries().is_empty());
    assert_eq!(conn.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_numeric_receiver_id_delivered() {
    let (conn, transport) = open_connection();
    let errors = Log::default();
    let seen: Arc<Mutex<Option<Envelope>>> = Arc::default();
    let errors_clone = errors.clone();
    let seen_clone = Arc::clone(&seen);
    conn.on_error(move |message| errors_clone.push(message));
    conn.on_event("dm", move |envelope| *seen_clone.lock() = Some(envelope.clone()));

    transport.last().receive_json(json!({
        "event": "dm",
        "data": "hi",
        "receiver": { "type": "user", "id": 42 }
    }));

    assert!(errors.entries().is_empty());
    let envelope = seen.lock().clone().expect("event delivered");
    let receiver = envelope.receiver.expect("receiver");
    assert_eq!(receiver.kind.as_str(), "user");
    assert_eq!(receiver.id.as_deref(), Some("42"));
}

#[tokio::test(start_paused = true)]
async fn test_event_without_name_dropped() {
    let (conn, transport) = open_connection();
    let events = Log::default();
    let events_clone = events.clone();
    conn.on_any_event(move |envelope| events_clone.push(envelope.event.clone()));

    transport.last().receive_json(json!({ "data": 1 }));

    assert!(events.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_once_event_fires_once() {
    let (conn, transport) = open_connection();
    let log = Log::default();
    let l = log.clone();
    conn.once_event("chat", move |envelope| l.push(envelope.data.to_string()));

    transport.last().receive_json(json!({ "event": "chat", "data": 1 }));
    transport.last().receive_json(json!({ "event": "chat", "data": 2 }));

    assert_eq!(log.entries(), vec!["1"]);
}

#[tokio::test(start_paused = true)]
async fn test_rejection_stops_reconnecting() {
    let (conn, transport) = open_connection();
    let rejected = Log::default();
    let events = Log::default();
    let r = rejected.clone();
    let e = events.clone();
    conn.on_event("conn.rejected", move |envelope| r.push(envelope.data.to_string()));
    conn.on_any_event(move |envelope| e.push(envelope.event.clone()));

    transport
        .last()
        .receive_json(json!({ "event": "conn.rejected", "data": "banned" }));

    assert_eq!(rejected.entries(), vec!["\"banned\""]);
    assert!(events.entries().is_empty());

    transport.last().drop_connection();
    assert_eq!(conn.state(), ConnectionState::Close);
    assert!(!conn.has_pending_reconnect());

    elapse(RECONNECT_INTERVAL * 4).await;
    assert_eq!(transport.count(), 1);

    // Explicit reconnects remain possible.
    conn.reconnect();
    elapse(RECONNECT_INTERVAL).await;
    assert_eq!(transport.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_listener_may_send_reentrantly() {
    let (conn, transport) = open_connection();
    let responder = conn.clone();
    conn.on_event("question", move |_| {
        drop(responder.send("answer", 42, None));
    });

    transport.last().receive_json(json!({ "event": "question" }));

    assert_eq!(transport.last().sent_events(), vec!["answer"]);
}
