//! Stateless forwarding of peer-negotiation traffic.
//!
//! The relay only addresses envelopes; it never looks inside `data`. A
//! message for an endpoint that is no longer connected is dropped silently:
//! there is no delivery guarantee, no retry, and no error back to the sender.
//! Stale handshakes are torn down client-side by stop/disconnect signals,
//! not by any timer here.

use serde_json::Value;

use crate::state::AppState;
use crate::ws::broadcast::send_to_endpoint;
use crate::ws::protocol::{ServerMessage, UserProfile};
use crate::ws::ConnectionRegistry;

/// Independent negotiation channels multiplexed over one transport. Each
/// (sender, destination, kind) tuple is best-effort on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Screen,
    Video,
    /// Bidirectional per (user, admin) pair.
    Audio,
    /// Admin microphone fan-out, one negotiation per (admin, user) pair.
    AdminAudio,
}

impl SignalKind {
    fn label(self) -> &'static str {
        match self {
            SignalKind::Screen => "screen",
            SignalKind::Video => "video",
            SignalKind::Audio => "audio",
            SignalKind::AdminAudio => "admin-audio",
        }
    }
}

/// Media an admin requests from a participant via a consent prompt. Audio
/// starts automatically on join, so it has no request or stopped message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Screen,
    Video,
}

/// Forward an opaque negotiation payload to its destination, stamped with
/// the sender's endpoint id.
pub fn relay_signal(
    connections: &ConnectionRegistry,
    kind: SignalKind,
    sender: &str,
    to: &str,
    data: Value,
) {
    tracing::debug!(
        kind = kind.label(),
        from = %sender,
        to = %to,
        "Relaying negotiation payload"
    );

    let from = sender.to_string();
    let message = match kind {
        SignalKind::Screen => ServerMessage::ScreenShareSignal { from, data },
        SignalKind::Video => ServerMessage::VideoSignal { from, data },
        SignalKind::Audio => ServerMessage::AudioSignal { from, data },
        SignalKind::AdminAudio => ServerMessage::AdminAudioSignal { from, data },
    };
    send_to_endpoint(connections, to, &message);
}

/// Ask `to` for consent to share the given media. The prompt carries only
/// the requester's id.
pub fn request_media(connections: &ConnectionRegistry, kind: MediaKind, sender: &str, to: &str) {
    let from = sender.to_string();
    let message = match kind {
        MediaKind::Screen => ServerMessage::RequestScreenShare { from },
        MediaKind::Video => ServerMessage::RequestVideo { from },
    };
    send_to_endpoint(connections, to, &message);
}

/// Tell the requesting admin that the shared stream ended. Sent by the
/// sharing side when it stops; never auto-fired on abrupt disconnect.
pub fn notify_stopped(connections: &ConnectionRegistry, kind: MediaKind, admin_id: &str) {
    let message = match kind {
        MediaKind::Screen => ServerMessage::ScreenShareStopped,
        MediaKind::Video => ServerMessage::VideoStopped,
    };
    send_to_endpoint(connections, admin_id, &message);
}

/// Chat is the broadcast-shaped relay: delivered to every endpoint currently
/// in the stated room, including the sender. The sends run under the registry
/// lock so delivery cannot straddle a racing membership change.
pub fn broadcast_chat(state: &AppState, room_id: String, user: UserProfile, text: String) {
    let message = ServerMessage::ChatMessage {
        room_id: room_id.clone(),
        user,
        text,
    };
    state.rooms.for_each_participant(&room_id, |p| {
        send_to_endpoint(&state.connections, &p.id, &message);
    });
}
