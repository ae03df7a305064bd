pub mod lifecycle;
pub mod presence;
pub mod registry;

use serde::{Deserialize, Serialize};

/// Self-declared role submitted at join time. It drives client-side
/// affordances; the relay does not re-validate it against any credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Presence record bound to an endpoint within a room.
///
/// Identity for upsert/removal is `id` (the transport connection id),
/// never `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Opaque avatar token chosen by the client
    pub avatar: String,
    pub role: Role,
}

/// One entry of the global room directory: a room id and its current roster.
/// Derived on demand from the registry, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub users: Vec<Participant>,
}
