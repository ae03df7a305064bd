//! Derived presence views published after every membership mutation.
//!
//! The broadcaster keeps no state of its own; both views come from snapshots
//! taken under the registry lock, and the fan-out itself runs inside the
//! mutation's `publish` closure, still under that lock. That is what keeps
//! racing mutations from reaching observers in the wrong order: the channel
//! pushes for mutation N all happen before any push for mutation N+1.

use axum::{extract::State, Json};

use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_all, send_to_endpoint};
use crate::ws::protocol::ServerMessage;
use crate::ws::ConnectionRegistry;

use super::registry::MembershipUpdate;
use super::RoomSummary;

/// Publish both views for a membership mutation: the mutated room's roster
/// to each of its occupants first, then the directory to every connection.
pub fn publish_membership(connections: &ConnectionRegistry, update: &MembershipUpdate) {
    let roster = ServerMessage::Participants {
        participants: update.participants.clone(),
    };
    for p in &update.participants {
        send_to_endpoint(connections, &p.id, &roster);
    }
    publish_directory(connections, &update.directory);
}

/// Push the room directory to every connected endpoint, joined or not, so
/// prospective joiners and admins see live occupancy.
pub fn publish_directory(connections: &ConnectionRegistry, directory: &[RoomSummary]) {
    broadcast_to_all(
        connections,
        &ServerMessage::ActiveRooms {
            rooms: directory.to_vec(),
        },
    );
}

/// GET /api/rooms: directory snapshot for pollers and dashboards.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.rooms.snapshot_directory())
}
