//! Authoritative room membership table.
//!
//! A room exists iff it has at least one participant; the entry is dropped
//! in the same mutation that empties it. All operations serialize on one
//! mutex, and the snapshots published for a mutation are taken under that
//! same lock, so no client ever observes an interleaved intermediate state.
//!
//! Mutation methods take a `publish` closure that runs while the lock is
//! still held. Sends are non-blocking channel pushes, so holding the lock
//! across them is cheap, and it is what makes fan-outs leave the registry
//! in mutation order: two racing mutations cannot publish in the reverse
//! of the order they were applied. The closure must not call back into
//! the registry.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Participant, RoomSummary};

type RoomTable = BTreeMap<String, Vec<Participant>>;

/// Snapshots taken atomically with a membership mutation.
#[derive(Debug, Clone)]
pub struct MembershipUpdate {
    /// The mutated room's roster, in join order. Empty if the room is gone.
    pub participants: Vec<Participant>,
    /// The global directory as of after the mutation.
    pub directory: Vec<RoomSummary>,
}

/// Result of deleting a room outright.
#[derive(Debug, Clone)]
pub struct ClosedRoom {
    /// Occupants at the moment of closure, for the closure notification.
    pub occupants: Vec<Participant>,
    /// The global directory as of after the delete.
    pub directory: Vec<RoomSummary>,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<RoomTable>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RoomTable> {
        self.rooms.lock().expect("room registry mutex poisoned")
    }

    /// Insert or update a participant, creating the room lazily.
    ///
    /// A record with the same endpoint id is replaced in place, keeping its
    /// position in the join order. Always succeeds. `publish` runs under the
    /// registry lock with the post-mutation snapshots.
    pub fn upsert_participant(
        &self,
        room_id: &str,
        participant: Participant,
        publish: impl FnOnce(&MembershipUpdate),
    ) -> MembershipUpdate {
        let mut rooms = self.lock();
        let roster = rooms.entry(room_id.to_string()).or_default();

        match roster.iter_mut().find(|p| p.id == participant.id) {
            Some(existing) => *existing = participant,
            None => roster.push(participant),
        }

        let update = MembershipUpdate {
            participants: roster.clone(),
            directory: directory_of(&rooms),
        };
        publish(&update);
        update
    }

    /// Remove a participant, deleting the room once its roster empties.
    ///
    /// Unknown room or participant is a no-op, not an error; disconnects may
    /// race with room closure. `publish` runs under the registry lock with
    /// the post-mutation snapshots.
    pub fn remove_participant(
        &self,
        room_id: &str,
        endpoint_id: &str,
        publish: impl FnOnce(&MembershipUpdate),
    ) -> MembershipUpdate {
        let mut rooms = self.lock();

        if let Some(roster) = rooms.get_mut(room_id) {
            roster.retain(|p| p.id != endpoint_id);
            if roster.is_empty() {
                rooms.remove(room_id);
            }
        }

        let update = MembershipUpdate {
            participants: rooms.get(room_id).cloned().unwrap_or_default(),
            directory: directory_of(&rooms),
        };
        publish(&update);
        update
    }

    /// Visit each current member of a room under the lock. An unknown room
    /// visits nothing, never an error.
    pub fn for_each_participant(&self, room_id: &str, mut f: impl FnMut(&Participant)) {
        if let Some(roster) = self.lock().get(room_id) {
            for p in roster {
                f(p);
            }
        }
    }

    /// Delete a room unconditionally. Returns `None` if it did not exist, in
    /// which case `publish` is never called and the caller skips the
    /// downstream notification.
    pub fn close_room(
        &self,
        room_id: &str,
        publish: impl FnOnce(&ClosedRoom),
    ) -> Option<ClosedRoom> {
        let mut rooms = self.lock();
        let occupants = rooms.remove(room_id)?;
        let closed = ClosedRoom {
            occupants,
            directory: directory_of(&rooms),
        };
        publish(&closed);
        Some(closed)
    }

    /// Atomic snapshot of every currently-existing room and its roster.
    pub fn snapshot_directory(&self) -> Vec<RoomSummary> {
        directory_of(&self.lock())
    }
}

fn directory_of(rooms: &RoomTable) -> Vec<RoomSummary> {
    rooms
        .iter()
        .map(|(id, users)| RoomSummary {
            id: id.clone(),
            users: users.clone(),
        })
        .collect()
}
