//! JSON wire protocol and message dispatch.
//!
//! Every message is an internally-tagged variant (`"type"` field, kebab-case
//! event names, camelCase payload fields). Negotiation payloads stay opaque
//! `serde_json::Value`s: the relay validates message shape without ever
//! inspecting their contents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rooms::{lifecycle, presence, Participant, Role, RoomSummary};
use crate::signaling::{self, MediaKind, SignalKind};
use crate::state::AppState;
use crate::ws::broadcast::send_direct;
use crate::ws::ConnectionSender;

/// Identity fields a client submits at join time. The server binds them to
/// the transport-assigned endpoint id; clients cannot pick their own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub avatar: String,
    pub role: Role,
}

/// Messages a client may send. Decode-only; the server never emits these.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        room_id: String,
        user: UserProfile,
    },
    ChatMessage {
        room_id: String,
        user: UserProfile,
        text: String,
    },
    RequestScreenShare {
        room_id: String,
        from: String,
        to: String,
    },
    RequestVideo {
        room_id: String,
        from: String,
        to: String,
    },
    ScreenShareSignal {
        to: String,
        data: Value,
    },
    VideoSignal {
        to: String,
        data: Value,
    },
    AudioSignal {
        to: String,
        data: Value,
    },
    AdminAudioSignal {
        to: String,
        data: Value,
    },
    ScreenShareStopped {
        admin_id: String,
    },
    VideoStopped {
        admin_id: String,
    },
    AdminCloseRoom {
        room_id: String,
    },
}

/// Messages the server sends. Encode-only; clients never echo them back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First message on every connection: tells the client its own address.
    Hello {
        endpoint_id: String,
    },
    Participants {
        participants: Vec<Participant>,
    },
    ActiveRooms {
        rooms: Vec<RoomSummary>,
    },
    ChatMessage {
        room_id: String,
        user: UserProfile,
        text: String,
    },
    RequestScreenShare {
        from: String,
    },
    RequestVideo {
        from: String,
    },
    ScreenShareSignal {
        from: String,
        data: Value,
    },
    VideoSignal {
        from: String,
        data: Value,
    },
    AudioSignal {
        from: String,
        data: Value,
    },
    AdminAudioSignal {
        from: String,
        data: Value,
    },
    ScreenShareStopped,
    VideoStopped,
    RoomClosed,
    Error {
        message: String,
    },
}

/// Per-connection join state, owned by the connection actor.
///
/// `None` is the connected-unjoined state; once joined, the room id is
/// recorded here so disconnect cleanup knows what to vacate.
#[derive(Debug, Default)]
pub struct EndpointSession {
    pub room_id: Option<String>,
}

/// Handle one incoming text frame: decode and dispatch.
///
/// An undecodable frame gets a warn log and an error message back to the
/// offending client only; it never affects other endpoints.
pub fn handle_text_message(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    endpoint_id: &str,
    session: &mut EndpointSession,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                endpoint_id = %endpoint_id,
                error = %e,
                "Failed to decode client message"
            );
            send_direct(
                tx,
                &ServerMessage::Error {
                    message: "Malformed message".to_string(),
                },
            );
            return;
        }
    };

    dispatch(message, state, endpoint_id, session);
}

fn dispatch(
    message: ClientMessage,
    state: &AppState,
    endpoint_id: &str,
    session: &mut EndpointSession,
) {
    match message {
        ClientMessage::Join { room_id, user } => {
            handle_join(state, endpoint_id, session, room_id, user);
        }
        ClientMessage::ChatMessage {
            room_id,
            user,
            text,
        } => {
            signaling::broadcast_chat(state, room_id, user, text);
        }
        // The requester's identity comes from the transport, not from the
        // client-supplied `from` field.
        ClientMessage::RequestScreenShare { to, .. } => {
            signaling::request_media(&state.connections, MediaKind::Screen, endpoint_id, &to);
        }
        ClientMessage::RequestVideo { to, .. } => {
            signaling::request_media(&state.connections, MediaKind::Video, endpoint_id, &to);
        }
        ClientMessage::ScreenShareSignal { to, data } => {
            signaling::relay_signal(&state.connections, SignalKind::Screen, endpoint_id, &to, data);
        }
        ClientMessage::VideoSignal { to, data } => {
            signaling::relay_signal(&state.connections, SignalKind::Video, endpoint_id, &to, data);
        }
        ClientMessage::AudioSignal { to, data } => {
            signaling::relay_signal(&state.connections, SignalKind::Audio, endpoint_id, &to, data);
        }
        ClientMessage::AdminAudioSignal { to, data } => {
            signaling::relay_signal(
                &state.connections,
                SignalKind::AdminAudio,
                endpoint_id,
                &to,
                data,
            );
        }
        ClientMessage::ScreenShareStopped { admin_id } => {
            signaling::notify_stopped(&state.connections, MediaKind::Screen, &admin_id);
        }
        ClientMessage::VideoStopped { admin_id } => {
            signaling::notify_stopped(&state.connections, MediaKind::Video, &admin_id);
        }
        ClientMessage::AdminCloseRoom { room_id } => {
            lifecycle::close_room(state, &room_id);
        }
    }
}

/// Upsert the sender into a room and publish both presence views.
///
/// Re-joining the same room is an idempotent update (name/avatar/role may
/// change). Joining a different room vacates the previous one first, with
/// its own pair of publishes.
fn handle_join(
    state: &AppState,
    endpoint_id: &str,
    session: &mut EndpointSession,
    room_id: String,
    user: UserProfile,
) {
    if let Some(previous) = session.room_id.take() {
        if previous != room_id {
            state.rooms.remove_participant(&previous, endpoint_id, |update| {
                presence::publish_membership(&state.connections, update);
            });
        }
    }

    let participant = Participant {
        id: endpoint_id.to_string(),
        name: user.name,
        avatar: user.avatar,
        role: user.role,
    };

    tracing::info!(
        endpoint_id = %endpoint_id,
        room_id = %room_id,
        role = ?participant.role,
        "Participant joined"
    );

    state.rooms.upsert_participant(&room_id, participant, |update| {
        presence::publish_membership(&state.connections, update);
    });
    session.room_id = Some(room_id);
}
