//! Presence bookkeeping: which viewer sessions watch which match.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{
    dao::models::MatchId,
    state::session::{SessionId, ViewerHandle},
};

/// Outcome of [`ConnectionRegistry::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Viewer count of the joined match, the new session included.
    pub viewers: usize,
    /// Match the session was moved away from and its remaining viewer count.
    pub left: Option<(MatchId, usize)>,
}

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<MatchId, HashMap<SessionId, ViewerHandle>>,
    subscriptions: HashMap<SessionId, MatchId>,
}

impl RegistryInner {
    /// Drop the session from its current room, deleting the room once empty.
    fn detach(&mut self, session_id: &SessionId) -> Option<(MatchId, usize)> {
        let match_id = self.subscriptions.remove(session_id)?;
        let remaining = match self.rooms.get_mut(&match_id) {
            Some(room) => {
                room.remove(session_id);
                room.len()
            }
            None => 0,
        };
        if remaining == 0 {
            self.rooms.remove(&match_id);
        }
        Some((match_id, remaining))
    }
}

/// Registry of live viewer sessions grouped by match.
///
/// Both maps live behind one lock so a session is never visible in two rooms
/// and a room is never kept around empty.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the session in the room of `match_id`, leaving any previous room first.
    pub fn subscribe(&self, match_id: &str, handle: ViewerHandle) -> Subscription {
        let mut inner = self.inner.write();
        let session_id = handle.session_id;
        let left = inner
            .detach(&session_id)
            .filter(|(previous, _)| previous != match_id);

        let room = inner.rooms.entry(match_id.to_owned()).or_default();
        room.insert(session_id, handle);
        let viewers = room.len();
        inner.subscriptions.insert(session_id, match_id.to_owned());

        Subscription { viewers, left }
    }

    /// Remove the session from `match_id`, returning the remaining viewer count.
    ///
    /// Unknown sessions and unknown matches are a no-op.
    pub fn unsubscribe(&self, match_id: &str, session_id: &SessionId) -> usize {
        let mut inner = self.inner.write();
        let subscribed_here = inner
            .subscriptions
            .get(session_id)
            .is_some_and(|current| current == match_id);
        if !subscribed_here {
            return inner.rooms.get(match_id).map(HashMap::len).unwrap_or_default();
        }
        inner
            .detach(session_id)
            .map(|(_, remaining)| remaining)
            .unwrap_or_default()
    }

    /// Snapshot of the handles watching `match_id`.
    pub fn sessions_for(&self, match_id: &str) -> Vec<ViewerHandle> {
        self.inner
            .read()
            .rooms
            .get(match_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sessions watching `match_id`.
    pub fn count_for(&self, match_id: &str) -> usize {
        self.inner
            .read()
            .rooms
            .get(match_id)
            .map(HashMap::len)
            .unwrap_or_default()
    }

    /// Match the session is currently subscribed to.
    pub fn match_of(&self, session_id: &SessionId) -> Option<MatchId> {
        self.inner.read().subscriptions.get(session_id).cloned()
    }

    /// Number of matches with at least one viewer.
    pub fn watched_matches(&self) -> usize {
        self.inner.read().rooms.len()
    }

    /// Number of subscribed sessions across all matches.
    pub fn total_viewers(&self) -> usize {
        self.inner.read().subscriptions.len()
    }
}
