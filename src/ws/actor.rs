use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::rooms::presence;
use crate::state::AppState;
use crate::ws::broadcast::send_direct;
use crate::ws::protocol::{self, EndpointSession, ServerMessage};

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Catches connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for one endpoint.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: decodes incoming messages, dispatches to protocol handlers
///
/// The mpsc sender is what the connection registry hands out; any part of the
/// system can push messages to this client by cloning it.
pub async fn run_connection(socket: WebSocket, state: AppState, endpoint_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register this connection so it is addressable by endpoint id
    state.connections.insert(endpoint_id.clone(), tx.clone());

    // The client learns its own address from the hello, then gets the current
    // directory so room lists render before any membership change happens.
    send_direct(
        &tx,
        &ServerMessage::Hello {
            endpoint_id: endpoint_id.clone(),
        },
    );
    send_direct(
        &tx,
        &ServerMessage::ActiveRooms {
            rooms: state.rooms.snapshot_directory(),
        },
    );

    tracing::info!(endpoint_id = %endpoint_id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // The endpoint's join state lives with the reader, so every event for
    // this connection runs to completion before the next is processed.
    let mut session = EndpointSession::default();

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(
                        text.as_str(),
                        &tx,
                        &state,
                        &endpoint_id,
                        &mut session,
                    );
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        endpoint_id = %endpoint_id,
                        "Received binary frame (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        endpoint_id = %endpoint_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    endpoint_id = %endpoint_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(endpoint_id = %endpoint_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // The endpoint must stop being addressable before its membership is
    // removed, so the departure publishes never target the dead connection.
    state.connections.remove(&endpoint_id);

    if let Some(room_id) = session.room_id.take() {
        state.rooms.remove_participant(&room_id, &endpoint_id, |update| {
            presence::publish_membership(&state.connections, update);
        });
        tracing::info!(
            endpoint_id = %endpoint_id,
            room_id = %room_id,
            "Participant removed on disconnect"
        );
    }

    tracing::info!(endpoint_id = %endpoint_id, "WebSocket actor stopped");
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
