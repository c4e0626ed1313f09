//! Live rooms and their update gates.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tracing::{debug, warn};

use crate::{
    dao::models::MatchId,
    state::{registry::ConnectionRegistry, session::SessionId},
};

/// Fan-out hub for live match rooms.
///
/// Owns the presence registry and one update gate per watched match. Holding a
/// gate orders store writes and the broadcasts that follow them for that match.
#[derive(Default)]
pub struct LiveHub {
    registry: ConnectionRegistry,
    gates: DashMap<MatchId, Arc<Mutex<()>>>,
}

impl LiveHub {
    /// Hub with no rooms and no gates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Presence registry backing the rooms.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Wait for exclusive use of the update gate of `match_id`.
    pub async fn lock_match(&self, match_id: &str) -> OwnedMutexGuard<()> {
        let gate = self
            .gates
            .entry(match_id.to_owned())
            .or_default()
            .value()
            .clone();
        gate.lock_owned().await
    }

    /// Forget the gate of a match nobody watches or waits on anymore.
    pub fn prune_gate(&self, match_id: &str) {
        self.gates.remove_if(match_id, |_, gate| {
            Arc::strong_count(gate) == 1 && self.registry.count_for(match_id) == 0
        });
    }

    /// Number of gates currently allocated.
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    /// Send one message to a single connection, ignoring a closed writer.
    pub fn send_to<T>(&self, tx: &mpsc::UnboundedSender<Message>, value: &T)
    where
        T: Serialize + ?Sized,
    {
        if let Some(text) = encode(value) {
            let _ = tx.send(Message::Text(text));
        }
    }

    /// Deliver `value` to every viewer of `match_id` except `exclude`.
    ///
    /// The payload is serialized once. Delivery is best-effort: a closed
    /// writer is skipped and its session is cleaned up by its own socket task.
    pub fn broadcast<T>(&self, match_id: &str, value: &T, exclude: Option<SessionId>) -> usize
    where
        T: Serialize + ?Sized,
    {
        let Some(text) = encode(value) else {
            return 0;
        };

        let mut delivered = 0;
        for handle in self.registry.sessions_for(match_id) {
            if Some(handle.session_id) == exclude {
                continue;
            }
            if handle.tx.send(Message::Text(text.clone())).is_ok() {
                delivered += 1;
            } else {
                debug!(session = %handle.session_id, match_id, "skipping closed viewer");
            }
        }
        delivered
    }
}

fn encode<T>(value: &T) -> Option<Utf8Bytes>
where
    T: Serialize + ?Sized,
{
    match serde_json::to_string(value) {
        Ok(payload) => Some(payload.into()),
        Err(err) => {
            warn!(error = %err, "failed to serialize viewer message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{dto::ws::ViewerOutboundMessage, state::session::ViewerHandle};

    fn join(hub: &LiveHub, match_id: &str) -> (SessionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();
        hub.registry().subscribe(
            match_id,
            ViewerHandle {
                session_id,
                viewer_id: None,
                tx,
            },
        );
        (session_id, rx)
    }

    #[test]
    fn broadcast_skips_the_excluded_session_and_other_rooms() {
        let hub = LiveHub::new();
        let (a, mut rx_a) = join(&hub, "m1");
        let (_b, mut rx_b) = join(&hub, "m1");
        let (_c, mut rx_c) = join(&hub, "m2");

        let event = ViewerOutboundMessage::UserJoined { viewers: 2 };
        let delivered = hub.broadcast("m1", &event, Some(a));
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
        match rx_b.try_recv() {
            Ok(Message::Text(text)) => {
                assert_eq!(text.as_str(), r#"{"type":"user_joined","viewers":2}"#)
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn closed_viewers_do_not_stop_the_fan_out() {
        let hub = LiveHub::new();
        let (_a, rx_a) = join(&hub, "m1");
        let (_b, mut rx_b) = join(&hub, "m1");
        drop(rx_a);

        let delivered = hub.broadcast("m1", &ViewerOutboundMessage::UserLeft { viewers: 1 }, None);
        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn gates_are_pruned_once_unused() {
        let hub = LiveHub::new();
        let guard = hub.lock_match("m1").await;
        hub.prune_gate("m1");
        assert_eq!(hub.gate_count(), 1);

        drop(guard);
        hub.prune_gate("m1");
        assert_eq!(hub.gate_count(), 0);
    }
}
