//! Integration tests for WebSocket connection lifecycle, join/presence
//! fan-out, and disconnect cleanup.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the server on a random port and return its address.
async fn start_test_server() -> SocketAddr {
    let state = huddle_server::state::AppState::new();
    let app = huddle_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Read the next JSON text frame, skipping transport-level frames.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended unexpectedly")
            .expect("websocket error");

        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("server sent invalid JSON");
        }
    }
}

/// Read frames until a message of the given type arrives, discarding
/// directory updates triggered by other clients' activity.
async fn recv_until(ws: &mut WsClient, ty: &str) -> Value {
    for _ in 0..10 {
        let value = recv_json(ws).await;
        if value["type"] == ty {
            return value;
        }
    }
    panic!("no {} message within 10 frames", ty);
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("failed to send");
}

/// Assert that no text frame arrives within the window.
async fn assert_silent(ws: &mut WsClient, window: Duration) {
    let result = tokio::time::timeout(window, ws.next()).await;
    assert!(result.is_err(), "expected silence, got {:?}", result);
}

/// Connect a client and consume the hello + initial directory snapshot.
/// Returns the stream and the endpoint id the server assigned.
async fn connect(addr: SocketAddr) -> (WsClient, String) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("failed to connect");

    let hello = recv_json(&mut ws).await;
    assert_eq!(hello["type"], "hello");
    let endpoint_id = hello["endpointId"].as_str().unwrap().to_string();

    let snapshot = recv_json(&mut ws).await;
    assert_eq!(snapshot["type"], "active-rooms");

    (ws, endpoint_id)
}

fn join_message(room: &str, name: &str, role: &str) -> Value {
    json!({
        "type": "join",
        "roomId": room,
        "user": {"name": name, "avatar": "🦊", "role": role}
    })
}

#[tokio::test]
async fn test_hello_and_empty_directory_on_connect() {
    let addr = start_test_server().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("failed to connect");

    let hello = recv_json(&mut ws).await;
    assert_eq!(hello["type"], "hello");
    assert!(!hello["endpointId"].as_str().unwrap().is_empty());

    let snapshot = recv_json(&mut ws).await;
    assert_eq!(snapshot["type"], "active-rooms");
    assert_eq!(snapshot["rooms"], json!([]));

    // No further traffic until the client does something
    assert_silent(&mut ws, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_join_publishes_roster_and_directory() {
    let addr = start_test_server().await;
    let (mut ws, endpoint_id) = connect(addr).await;

    send_json(&mut ws, join_message("r1", "Ann", "user")).await;

    let roster = recv_json(&mut ws).await;
    assert_eq!(roster["type"], "participants");
    let participants = roster["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["id"], endpoint_id.as_str());
    assert_eq!(participants[0]["name"], "Ann");
    assert_eq!(participants[0]["avatar"], "🦊");
    assert_eq!(participants[0]["role"], "user");

    let directory = recv_json(&mut ws).await;
    assert_eq!(directory["type"], "active-rooms");
    assert_eq!(directory["rooms"][0]["id"], "r1");
    assert_eq!(directory["rooms"][0]["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_roster_order_is_join_order() {
    let addr = start_test_server().await;
    let (mut ws_a, id_a) = connect(addr).await;
    let (mut ws_b, id_b) = connect(addr).await;

    send_json(&mut ws_a, join_message("r1", "Ann", "admin")).await;
    let _ = recv_until(&mut ws_a, "participants").await;
    let _ = recv_json(&mut ws_a).await; // paired active-rooms

    send_json(&mut ws_b, join_message("r1", "Bob", "user")).await;

    // Both members see the same roster, in join order. The room-scoped
    // roster always precedes its paired directory update.
    for ws in [&mut ws_a, &mut ws_b] {
        let roster = recv_until(ws, "participants").await;
        let participants = roster["participants"].as_array().unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0]["id"], id_a.as_str());
        assert_eq!(participants[1]["id"], id_b.as_str());

        let directory = recv_json(ws).await;
        assert_eq!(directory["type"], "active-rooms");
        assert_eq!(directory["rooms"][0]["users"].as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_rejoin_same_endpoint_is_idempotent_upsert() {
    let addr = start_test_server().await;
    let (mut ws, endpoint_id) = connect(addr).await;

    send_json(&mut ws, join_message("r1", "Ann", "user")).await;
    let _ = recv_json(&mut ws).await;
    let _ = recv_json(&mut ws).await;

    // Same room, updated identity: list stays length 1 with the latest fields
    send_json(&mut ws, join_message("r1", "Anna", "admin")).await;

    let roster = recv_json(&mut ws).await;
    assert_eq!(roster["type"], "participants");
    let participants = roster["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["id"], endpoint_id.as_str());
    assert_eq!(participants[0]["name"], "Anna");
    assert_eq!(participants[0]["role"], "admin");
}

#[tokio::test]
async fn test_switching_rooms_vacates_the_previous_room() {
    let addr = start_test_server().await;
    let (mut ws, endpoint_id) = connect(addr).await;

    send_json(&mut ws, join_message("r1", "Ann", "user")).await;
    let _ = recv_json(&mut ws).await;
    let _ = recv_json(&mut ws).await;

    send_json(&mut ws, join_message("r2", "Ann", "user")).await;

    // Departure from r1 first: r1 empties, so only the directory reaches us
    let directory = recv_json(&mut ws).await;
    assert_eq!(directory["type"], "active-rooms");
    assert_eq!(directory["rooms"], json!([]));

    // Then the join into r2
    let roster = recv_json(&mut ws).await;
    assert_eq!(roster["type"], "participants");
    assert_eq!(roster["participants"][0]["id"], endpoint_id.as_str());

    let directory = recv_json(&mut ws).await;
    assert_eq!(directory["rooms"][0]["id"], "r2");

    let rooms: Value = reqwest::get(format!("http://{}/api/rooms", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms.as_array().unwrap().len(), 1);
    assert_eq!(rooms[0]["id"], "r2");
}

#[tokio::test]
async fn test_disconnect_removes_participant_and_empty_room() {
    let addr = start_test_server().await;
    let (mut ws_a, id_a) = connect(addr).await;
    let (mut ws_b, _id_b) = connect(addr).await;

    send_json(&mut ws_a, join_message("r1", "Ann", "admin")).await;
    let _ = recv_until(&mut ws_a, "participants").await;
    let _ = recv_json(&mut ws_a).await;

    send_json(&mut ws_b, join_message("r1", "Bob", "user")).await;
    let _ = recv_until(&mut ws_a, "participants").await;
    let _ = recv_json(&mut ws_a).await;
    let _ = recv_until(&mut ws_b, "participants").await;
    let _ = recv_json(&mut ws_b).await;

    // B disconnects; A sees the shrunken roster, and the room stays listed
    // while A remains
    ws_b.close(None).await.unwrap();

    let roster = recv_until(&mut ws_a, "participants").await;
    let participants = roster["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["id"], id_a.as_str());

    let directory = recv_json(&mut ws_a).await;
    assert_eq!(directory["type"], "active-rooms");
    assert_eq!(directory["rooms"][0]["id"], "r1");

    // Once A leaves too, the room is gone entirely
    ws_a.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let rooms: Value = reqwest::get(format!("http://{}/api/rooms", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms, json!([]));
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let addr = start_test_server().await;
    let (mut ws, _) = connect(addr).await;

    ws.send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("expected pong within timeout");

    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "pong data should match ping");
        }
        other => panic!("expected Pong message, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_message_gets_error_and_connection_survives() {
    let addr = start_test_server().await;
    let (mut ws, _) = connect(addr).await;

    ws.send(Message::Text("not json at all".into()))
        .await
        .expect("failed to send");

    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");

    // A bad frame only affects this endpoint, and not fatally: the
    // connection still works afterwards
    send_json(&mut ws, join_message("r1", "Ann", "user")).await;
    let roster = recv_json(&mut ws).await;
    assert_eq!(roster["type"], "participants");
}

#[tokio::test]
async fn test_fresh_connection_sees_existing_rooms_in_snapshot() {
    let addr = start_test_server().await;
    let (mut ws_a, _) = connect(addr).await;

    send_json(&mut ws_a, join_message("r1", "Ann", "user")).await;
    let _ = recv_json(&mut ws_a).await;
    let _ = recv_json(&mut ws_a).await;

    // A later client's initial snapshot includes the occupied room
    let (mut ws_b, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("failed to connect");

    let hello = recv_json(&mut ws_b).await;
    assert_eq!(hello["type"], "hello");

    let snapshot = recv_json(&mut ws_b).await;
    assert_eq!(snapshot["type"], "active-rooms");
    assert_eq!(snapshot["rooms"][0]["id"], "r1");
    assert_eq!(snapshot["rooms"][0]["users"][0]["name"], "Ann");
}
