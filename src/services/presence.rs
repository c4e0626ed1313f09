//! Viewer presence events.

use tracing::debug;

use crate::{
    dto::ws::ViewerOutboundMessage,
    state::{SessionId, SharedState},
};

/// Event announcing a new viewer, built from the registry count after the join.
pub fn joined(viewers: usize) -> ViewerOutboundMessage {
    ViewerOutboundMessage::UserJoined { viewers }
}

/// Event announcing a departure; nothing is sent to an empty room.
pub fn left(viewers: usize) -> Option<ViewerOutboundMessage> {
    (viewers > 0).then_some(ViewerOutboundMessage::UserLeft { viewers })
}

/// Tell the viewers of `match_id` that someone joined, leaving the joiner out.
pub fn announce_join(state: &SharedState, match_id: &str, joiner: SessionId, viewers: usize) {
    let delivered = state
        .live()
        .broadcast(match_id, &joined(viewers), Some(joiner));
    debug!(match_id, viewers, delivered, "announced viewer join");
}

/// Tell the remaining viewers of `match_id` that someone left.
pub fn announce_leave(state: &SharedState, match_id: &str, remaining: usize) {
    if let Some(event) = left(remaining) {
        let delivered = state.live().broadcast(match_id, &event, None);
        debug!(match_id, viewers = remaining, delivered, "announced viewer leave");
    }
}
