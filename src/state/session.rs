//! Viewer connection sessions.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dao::models::MatchId;

/// Identifier assigned to every viewer connection when it is accepted.
pub type SessionId = Uuid;

#[derive(Clone, Debug)]
/// Handle used to push messages to a connected viewer.
pub struct ViewerHandle {
    /// Session the handle belongs to.
    pub session_id: SessionId,
    /// Advisory identity supplied with `join_match`, never authenticated.
    pub viewer_id: Option<String>,
    /// Writer queue of the connection.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Where a viewer connection is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepted, waiting for `join_match`.
    ConnectedUnsubscribed,
    /// Receiving broadcasts for one match.
    Subscribed {
        /// Match being watched.
        match_id: MatchId,
    },
    /// Torn down; no further messages are handled.
    Closed,
}

/// Per-connection state owned by the socket task.
#[derive(Debug)]
pub struct ViewerSession {
    id: SessionId,
    tx: mpsc::UnboundedSender<Message>,
    viewer_id: Option<String>,
    phase: SessionPhase,
}

impl ViewerSession {
    /// Start a session for a freshly accepted connection.
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
            viewer_id: None,
            phase: SessionPhase::ConnectedUnsubscribed,
        }
    }

    /// Identifier of the connection.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Match the session currently receives broadcasts for.
    pub fn current_match(&self) -> Option<&MatchId> {
        match &self.phase {
            SessionPhase::Subscribed { match_id } => Some(match_id),
            _ => None,
        }
    }

    /// Build the registry handle for this session, recording the advisory viewer id.
    pub fn handle(&mut self, viewer_id: Option<String>) -> ViewerHandle {
        if viewer_id.is_some() {
            self.viewer_id = viewer_id;
        }
        ViewerHandle {
            session_id: self.id,
            viewer_id: self.viewer_id.clone(),
            tx: self.tx.clone(),
        }
    }

    pub(crate) fn mark_subscribed(&mut self, match_id: MatchId) {
        self.phase = SessionPhase::Subscribed { match_id };
    }

    /// Close the session, returning the match it was subscribed to, if any.
    pub(crate) fn close(&mut self) -> Option<MatchId> {
        match std::mem::replace(&mut self.phase, SessionPhase::Closed) {
            SessionPhase::Subscribed { match_id } => Some(match_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_walks_through_its_phases() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = ViewerSession::new(tx);
        assert_eq!(session.phase(), &SessionPhase::ConnectedUnsubscribed);
        assert!(session.current_match().is_none());

        let handle = session.handle(Some("u1".into()));
        assert_eq!(handle.session_id, session.id());
        assert_eq!(handle.viewer_id.as_deref(), Some("u1"));

        session.mark_subscribed("m1".into());
        assert_eq!(session.current_match().map(String::as_str), Some("m1"));

        assert_eq!(session.close().as_deref(), Some("m1"));
        assert_eq!(session.phase(), &SessionPhase::Closed);
        assert!(session.close().is_none());
    }

    #[test]
    fn anonymous_rejoin_keeps_previous_viewer_id() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = ViewerSession::new(tx);
        session.handle(Some("u1".into()));
        assert_eq!(session.handle(None).viewer_id.as_deref(), Some("u1"));
    }
}
