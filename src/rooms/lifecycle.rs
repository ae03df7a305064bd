//! Room dissolution.

use crate::state::AppState;
use crate::ws::broadcast::send_to_endpoint;
use crate::ws::protocol::ServerMessage;

use super::presence;

/// Dissolve a room: notify every occupant, drop the registry entry, then
/// republish the directory. Closing an unknown room has no observable effect.
///
/// The closure signal is unilateral; there is no handshake and occupants keep
/// their connections. Their later departures become registry no-ops.
///
/// Conceptually this is an admin operation, but the caller's role is not
/// verified (preserved trust-all behavior, see DESIGN.md).
pub fn close_room(state: &AppState, room_id: &str) {
    // Notifications and the directory republish run under the registry lock
    // so a racing membership change cannot interleave its fan-out.
    let closed = state.rooms.close_room(room_id, |closed| {
        for p in &closed.occupants {
            send_to_endpoint(&state.connections, &p.id, &ServerMessage::RoomClosed);
        }
        presence::publish_directory(&state.connections, &closed.directory);
    });

    match closed {
        Some(closed) => {
            tracing::info!(
                room_id = %room_id,
                occupants = closed.occupants.len(),
                "Room closed by request"
            );
        }
        None => {
            tracing::debug!(room_id = %room_id, "Close requested for unknown room");
        }
    }
}
