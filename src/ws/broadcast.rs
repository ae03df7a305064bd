use axum::extract::ws::Message;

use super::protocol::ServerMessage;
use super::{ConnectionRegistry, ConnectionSender};

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        }
    }
}

/// Push a message directly down a connection's channel.
pub fn send_direct(tx: &ConnectionSender, message: &ServerMessage) {
    if let Some(msg) = encode(message) {
        let _ = tx.send(msg);
    }
}

/// Send a message to a single endpoint. A destination that is no longer
/// connected is an expected race: the message is dropped silently and no
/// error is surfaced to the sender.
pub fn send_to_endpoint(registry: &ConnectionRegistry, endpoint_id: &str, message: &ServerMessage) {
    let Some(msg) = encode(message) else { return };

    match registry.get(endpoint_id) {
        Some(sender) => {
            let _ = sender.send(msg);
        }
        None => {
            tracing::debug!(
                endpoint_id = %endpoint_id,
                "Dropping message for disconnected endpoint"
            );
        }
    }
}

/// Broadcast a message to every connected endpoint, joined to a room or not.
pub fn broadcast_to_all(registry: &ConnectionRegistry, message: &ServerMessage) {
    let Some(msg) = encode(message) else { return };

    for entry in registry.iter() {
        let _ = entry.value().send(msg.clone());
    }
}
