//! Broadcast core: applies viewer messages to the match store and fans the results out.
//!
//! Every mutation of a match and the broadcast that reports it run while holding that
//! match's update gate, so viewers receive updates in commit order.

use std::{future::Future, time::SystemTime};

use tracing::{debug, info};

use crate::{
    dao::models::{CommentaryEntity, MatchEntity, PollEntity, ScoreChange},
    dto::ws::{
        CommentaryPayload, JoinMatchPayload, PollVotePayload, ScoreDelta, ViewerInboundMessage,
        ViewerOutboundMessage,
    },
    error::ViewerError,
    services::{call_store, presence},
    state::{SharedState, ViewerSession},
};

/// Decode a text frame and handle it for `session`.
pub async fn handle_text(
    state: &SharedState,
    session: &mut ViewerSession,
    text: &str,
) -> Result<(), ViewerError> {
    let limit = state.config().max_message_bytes();
    let message = ViewerInboundMessage::from_json_str(text, limit)?;
    handle_message(state, session, message).await
}

/// Dispatch one decoded viewer message.
///
/// Updates are only accepted once the session has joined a match.
pub async fn handle_message(
    state: &SharedState,
    session: &mut ViewerSession,
    message: ViewerInboundMessage,
) -> Result<(), ViewerError> {
    let kind = message.kind();
    if let ViewerInboundMessage::JoinMatch(payload) = message {
        return handle_join(state, session, payload).await;
    }

    let match_id = session
        .current_match()
        .cloned()
        .ok_or(ViewerError::InvalidState { kind })?;

    match message {
        ViewerInboundMessage::ScoreUpdate(payload) => {
            apply_score_delta(state, &match_id, payload.updates).await
        }
        ViewerInboundMessage::Commentary(payload) => {
            add_commentary(state, &match_id, payload).await
        }
        ViewerInboundMessage::PollVote(payload) => record_vote(state, &match_id, payload).await,
        ViewerInboundMessage::JoinMatch(_) => Ok(()),
    }
}

/// Subscribe the session to a match, send it the snapshot and announce it to the others.
///
/// The snapshot is fetched first: when it cannot be loaded nothing changes.
async fn handle_join(
    state: &SharedState,
    session: &mut ViewerSession,
    payload: JoinMatchPayload,
) -> Result<(), ViewerError> {
    let match_id = payload.match_id.trim().to_owned();

    let previous = run_gated(state, &match_id, async {
        let lookup = match_id.clone();
        let entity = call_store(state, move |store| store.get_match(lookup))
            .await?
            .ok_or_else(|| ViewerError::NotFound(format!("match `{match_id}`")))?;

        let handle = session.handle(payload.user_id);
        let tx = handle.tx.clone();
        let subscription = state.live().registry().subscribe(&match_id, handle);
        session.mark_subscribed(match_id.clone());

        state.live().send_to(
            &tx,
            &ViewerOutboundMessage::MatchState {
                data: entity.into(),
            },
        );
        presence::announce_join(state, &match_id, session.id(), subscription.viewers);
        info!(
            session_id = %session.id(),
            match_id = %match_id,
            viewers = subscription.viewers,
            "viewer joined match"
        );
        Ok::<_, ViewerError>(subscription.left)
    })
    .await?;

    if let Some((previous_id, _)) = previous {
        // Joins on the previous match may have landed since the move; count under its gate.
        run_gated(state, &previous_id, async {
            let remaining = state.live().registry().count_for(&previous_id);
            presence::announce_leave(state, &previous_id, remaining);
        })
        .await;
        debug!(session_id = %session.id(), match_id = %previous_id, "viewer moved away");
    }
    Ok(())
}

/// Remove a closing session from its room and announce the departure.
pub async fn handle_disconnect(state: &SharedState, session: &mut ViewerSession) {
    let session_id = session.id();
    let Some(match_id) = session.close() else {
        return;
    };

    run_gated(state, &match_id, async {
        let remaining = state
            .live()
            .registry()
            .unsubscribe(&match_id, &session_id);
        presence::announce_leave(state, &match_id, remaining);
        info!(
            session_id = %session_id,
            match_id = %match_id,
            viewers = remaining,
            "viewer left match"
        );
    })
    .await;
}

async fn apply_score_delta(
    state: &SharedState,
    match_id: &str,
    delta: ScoreDelta,
) -> Result<(), ViewerError> {
    let change = ScoreChange::from(delta);

    run_gated(state, match_id, async {
        let lookup = match_id.to_owned();
        let current = call_store(state, move |store| store.get_match(lookup))
            .await?
            .ok_or_else(|| ViewerError::NotFound(format!("match `{match_id}`")))?;
        if current.sport != change.sport {
            return Err(ViewerError::InvalidInput(format!(
                "{} score sent to {} match `{match_id}`",
                change.sport.as_str(),
                current.sport.as_str()
            )));
        }

        let target = match_id.to_owned();
        let updated = call_store(state, move |store| store.apply_score_change(target, change))
            .await?;
        broadcast_match(state, updated);
        Ok::<_, ViewerError>(())
    })
    .await
}

async fn add_commentary(
    state: &SharedState,
    match_id: &str,
    payload: CommentaryPayload,
) -> Result<(), ViewerError> {
    let entry = CommentaryEntity {
        timestamp: SystemTime::now(),
        ball: payload.ball,
        text: payload.text,
    };

    run_gated(state, match_id, async {
        let target = match_id.to_owned();
        let stored = entry.clone();
        call_store(state, move |store| store.append_commentary(target, stored)).await?;
        broadcast_commentary(state, match_id, entry);
        Ok::<_, ViewerError>(())
    })
    .await
}

async fn record_vote(
    state: &SharedState,
    match_id: &str,
    payload: PollVotePayload,
) -> Result<(), ViewerError> {
    run_gated(state, match_id, async {
        let target = match_id.to_owned();
        let polls = call_store(state, move |store| {
            store.increment_poll_option_vote(target, payload.poll_id, payload.option_id)
        })
        .await?;
        broadcast_polls(state, match_id, polls);
        Ok::<_, ViewerError>(())
    })
    .await
}

/// Run `work` while holding the update gate of `match_id`.
pub async fn run_gated<T, Fut>(state: &SharedState, match_id: &str, work: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let gate = state.live().lock_match(match_id).await;
    let outcome = work.await;
    drop(gate);
    state.live().prune_gate(match_id);
    outcome
}

/// Send the full match snapshot to all of its viewers.
pub fn broadcast_match(state: &SharedState, entity: MatchEntity) {
    let match_id = entity.id.clone();
    let delivered = state.live().broadcast(
        &match_id,
        &ViewerOutboundMessage::ScoreUpdate {
            data: entity.into(),
        },
        None,
    );
    debug!(match_id = %match_id, delivered, "broadcast score update");
}

/// Send a freshly recorded commentary line to all viewers of `match_id`.
pub fn broadcast_commentary(state: &SharedState, match_id: &str, entry: CommentaryEntity) {
    let delivered = state.live().broadcast(
        match_id,
        &ViewerOutboundMessage::NewCommentary {
            commentary: entry.text,
            ball: entry.ball,
        },
        None,
    );
    debug!(match_id, delivered, "broadcast commentary");
}

/// Send the current poll list to all viewers of `match_id`.
pub fn broadcast_polls(state: &SharedState, match_id: &str, polls: Vec<PollEntity>) {
    let delivered = state.live().broadcast(
        match_id,
        &ViewerOutboundMessage::PollUpdate {
            polls: polls.into_iter().map(Into::into).collect(),
        },
        None,
    );
    debug!(match_id, delivered, "broadcast poll update");
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, SystemTime},
    };

    use axum::extract::ws::Message;
    use futures::future::{BoxFuture, join_all};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            match_store::{InMemoryMatchStore, MatchStore},
            models::{
                MatchFilter, MatchId, MatchStatus, PollOptionEntity, Sport, TeamScoreEntity,
            },
            storage::StorageResult,
        },
        error::ServiceError,
        state::AppState,
    };

    fn cricket_match(id: &str) -> MatchEntity {
        let mut entity = MatchEntity::scheduled(
            id.into(),
            "India vs Australia".into(),
            Sport::Cricket,
            TeamScoreEntity::named("India".into(), None),
            TeamScoreEntity::named("Australia".into(), None),
        );
        entity.status = MatchStatus::Live;
        entity
    }

    fn with_poll(mut entity: MatchEntity, votes: [u64; 2]) -> MatchEntity {
        entity.polls.push(PollEntity {
            id: "p1".into(),
            question: "Who wins?".into(),
            options: vec![
                PollOptionEntity {
                    id: "o1".into(),
                    label: "India".into(),
                    votes: votes[0],
                },
                PollOptionEntity {
                    id: "o2".into(),
                    label: "Australia".into(),
                    votes: votes[1],
                },
            ],
            created_at: SystemTime::now(),
        });
        entity
    }

    async fn state_with(matches: Vec<MatchEntity>) -> (SharedState, InMemoryMatchStore) {
        let store = InMemoryMatchStore::new();
        for entity in matches {
            store.create_match(entity).await.unwrap();
        }
        let state = AppState::new(AppConfig::default());
        state.set_match_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn viewer() -> (ViewerSession, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ViewerSession::new(tx), rx)
    }

    fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        match rx.try_recv() {
            Ok(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    fn assert_silent(rx: &mut mpsc::UnboundedReceiver<Message>) {
        assert!(rx.try_recv().is_err(), "unexpected frame delivered");
    }

    async fn send(
        state: &SharedState,
        session: &mut ViewerSession,
        raw: Value,
    ) -> Result<(), ViewerError> {
        handle_text(state, session, &raw.to_string()).await
    }

    async fn join(state: &SharedState, session: &mut ViewerSession, match_id: &str) {
        send(state, session, json!({"type": "join_match", "matchId": match_id}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn join_commentary_and_leave_flow() {
        let (state, _store) = state_with(vec![cricket_match("m1")]).await;
        let (mut s1, mut rx1) = viewer();
        let (mut s2, mut rx2) = viewer();

        join(&state, &mut s1, "m1").await;
        let snapshot = next(&mut rx1);
        assert_eq!(snapshot["type"], "match_state");
        assert_eq!(snapshot["data"]["id"], "m1");
        assert_silent(&mut rx1);

        join(&state, &mut s2, "m1").await;
        assert_eq!(next(&mut rx2)["type"], "match_state");
        assert_silent(&mut rx2);
        assert_eq!(next(&mut rx1), json!({"type": "user_joined", "viewers": 2}));

        send(
            &state,
            &mut s1,
            json!({"type": "commentary", "text": "Six runs!", "ball": "12.3"}),
        )
        .await
        .unwrap();
        let expected =
            json!({"type": "new_commentary", "commentary": "Six runs!", "ball": "12.3"});
        assert_eq!(next(&mut rx1), expected);
        assert_eq!(next(&mut rx2), expected);

        handle_disconnect(&state, &mut s2).await;
        assert_eq!(next(&mut rx1), json!({"type": "user_left", "viewers": 1}));
        assert_silent(&mut rx2);
        assert_eq!(state.live().registry().count_for("m1"), 1);
    }

    #[tokio::test]
    async fn poll_vote_reaches_every_viewer_including_the_voter() {
        let (state, _store) = state_with(vec![with_poll(cricket_match("m1"), [5, 3])]).await;
        let (mut voter, mut rx_voter) = viewer();
        let (mut other, mut rx_other) = viewer();
        join(&state, &mut voter, "m1").await;
        join(&state, &mut other, "m1").await;
        next(&mut rx_voter);
        next(&mut rx_voter);
        next(&mut rx_other);

        send(
            &state,
            &mut voter,
            json!({"type": "poll_vote", "pollId": "p1", "optionId": "o1"}),
        )
        .await
        .unwrap();

        for rx in [&mut rx_voter, &mut rx_other] {
            let update = next(rx);
            assert_eq!(update["type"], "poll_update");
            let votes: Vec<u64> = update["polls"][0]["options"]
                .as_array()
                .unwrap()
                .iter()
                .map(|option| option["votes"].as_u64().unwrap())
                .collect();
            assert_eq!(votes, vec![6, 3]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_are_all_counted() {
        const VOTERS: usize = 32;
        let (state, store) = state_with(vec![with_poll(cricket_match("m1"), [5, 3])]).await;

        let mut sessions = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..VOTERS {
            let (mut session, rx) = viewer();
            join(&state, &mut session, "m1").await;
            sessions.push(session);
            receivers.push(rx);
        }

        let tasks = sessions.into_iter().map(|mut session| {
            let state = state.clone();
            tokio::spawn(async move {
                let vote = ViewerInboundMessage::from_json_str(
                    r#"{"type":"poll_vote","pollId":"p1","optionId":"o1"}"#,
                    1024,
                )
                .unwrap();
                handle_message(&state, &mut session, vote).await
            })
        });
        for outcome in join_all(tasks).await {
            outcome.unwrap().unwrap();
        }

        let stored = store.get_match("m1".into()).await.unwrap().unwrap();
        assert_eq!(stored.polls[0].options[0].votes, 5 + VOTERS as u64);
        assert_eq!(stored.polls[0].options[1].votes, 3);
    }

    #[tokio::test]
    async fn updates_before_join_are_rejected() {
        let (state, store) = state_with(vec![with_poll(cricket_match("m1"), [0, 0])]).await;
        let (mut session, mut rx) = viewer();

        let outcome = send(
            &state,
            &mut session,
            json!({"type": "poll_vote", "pollId": "p1", "optionId": "o1"}),
        )
        .await;
        assert!(matches!(
            outcome,
            Err(ViewerError::InvalidState { kind: "poll_vote" })
        ));
        assert_silent(&mut rx);
        let stored = store.get_match("m1".into()).await.unwrap().unwrap();
        assert_eq!(stored.polls[0].options[0].votes, 0);
    }

    #[tokio::test]
    async fn malformed_messages_keep_the_session_usable() {
        let (state, _store) = state_with(vec![cricket_match("m1")]).await;
        let (mut session, mut rx) = viewer();

        let outcome = handle_text(&state, &mut session, r#"{"type":"dance"}"#).await;
        assert!(matches!(outcome, Err(ViewerError::MalformedMessage(_))));
        assert_silent(&mut rx);

        join(&state, &mut session, "m1").await;
        assert_eq!(next(&mut rx)["type"], "match_state");
    }

    #[tokio::test]
    async fn store_failure_broadcasts_nothing() {
        let (state, store) = state_with(vec![cricket_match("m1")]).await;
        let (mut s1, mut rx1) = viewer();
        let (mut s2, mut rx2) = viewer();
        join(&state, &mut s1, "m1").await;
        join(&state, &mut s2, "m1").await;
        while rx1.try_recv().is_ok() {}
        while rx2.try_recv().is_ok() {}

        store.set_unavailable(true);
        let outcome = send(
            &state,
            &mut s1,
            json!({"type": "commentary", "text": "Wicket!", "ball": "3.4"}),
        )
        .await;
        assert!(matches!(outcome, Err(ViewerError::StoreUnavailable(_))));
        assert_silent(&mut rx1);
        assert_silent(&mut rx2);

        store.set_unavailable(false);
        send(
            &state,
            &mut s1,
            json!({"type": "commentary", "text": "Wicket!", "ball": "3.4"}),
        )
        .await
        .unwrap();
        assert_eq!(next(&mut rx2)["type"], "new_commentary");
    }

    #[tokio::test]
    async fn joining_an_unknown_match_changes_nothing() {
        let (state, _store) = state_with(vec![]).await;
        let (mut session, mut rx) = viewer();

        let outcome = send(
            &state,
            &mut session,
            json!({"type": "join_match", "matchId": "nope"}),
        )
        .await;
        assert!(matches!(outcome, Err(ViewerError::NotFound(_))));
        assert!(session.current_match().is_none());
        assert_eq!(state.live().registry().total_viewers(), 0);
        assert_eq!(state.live().gate_count(), 0);
        assert_silent(&mut rx);
    }

    #[tokio::test]
    async fn score_update_sends_the_snapshot_to_everyone() {
        let (state, _store) = state_with(vec![cricket_match("m1")]).await;
        let (mut s1, mut rx1) = viewer();
        let (mut s2, mut rx2) = viewer();
        join(&state, &mut s1, "m1").await;
        join(&state, &mut s2, "m1").await;
        while rx1.try_recv().is_ok() {}
        while rx2.try_recv().is_ok() {}

        send(
            &state,
            &mut s2,
            json!({
                "type": "score_update",
                "updates": {"sport": "cricket", "team1Runs": 187, "team1Wickets": 4, "overs": 32.1}
            }),
        )
        .await
        .unwrap();

        for rx in [&mut rx1, &mut rx2] {
            let update = next(rx);
            assert_eq!(update["type"], "score_update");
            assert_eq!(update["data"]["team1"]["score"], 187);
            assert_eq!(update["data"]["team1"]["wickets"], 4);
            assert_eq!(update["data"]["team2"]["score"], 0);
        }
    }

    #[tokio::test]
    async fn score_update_for_another_sport_is_rejected() {
        let (state, store) = state_with(vec![cricket_match("m1")]).await;
        let (mut session, mut rx) = viewer();
        join(&state, &mut session, "m1").await;
        next(&mut rx);

        let outcome = send(
            &state,
            &mut session,
            json!({"type": "score_update", "updates": {"sport": "football", "homeGoals": 3}}),
        )
        .await;
        assert!(matches!(outcome, Err(ViewerError::InvalidInput(_))));
        assert_silent(&mut rx);
        let stored = store.get_match("m1".into()).await.unwrap().unwrap();
        assert_eq!(stored.team1.score, 0);
    }

    #[tokio::test]
    async fn moving_to_another_match_announces_the_departure() {
        let (state, _store) = state_with(vec![cricket_match("m1"), cricket_match("m2")]).await;
        let (mut mover, mut rx_mover) = viewer();
        let (mut stayer, mut rx_stayer) = viewer();
        join(&state, &mut stayer, "m1").await;
        join(&state, &mut mover, "m1").await;
        while rx_stayer.try_recv().is_ok() {}
        while rx_mover.try_recv().is_ok() {}

        join(&state, &mut mover, "m2").await;
        assert_eq!(next(&mut rx_mover)["data"]["id"], "m2");
        assert_silent(&mut rx_mover);
        assert_eq!(next(&mut rx_stayer), json!({"type": "user_left", "viewers": 1}));

        let registry = state.live().registry();
        assert_eq!(registry.count_for("m1"), 1);
        assert_eq!(registry.count_for("m2"), 1);
        assert_eq!(registry.match_of(&mover.id()).as_deref(), Some("m2"));
    }

    #[tokio::test]
    async fn departure_count_reflects_joins_queued_before_the_move() {
        let (state, _store) = state_with(vec![cricket_match("m1"), cricket_match("m2")]).await;
        let (mut mover, mut rx_mover) = viewer();
        let (mut stayer, mut rx_stayer) = viewer();
        join(&state, &mut stayer, "m1").await;
        join(&state, &mut mover, "m1").await;
        while rx_stayer.try_recv().is_ok() {}
        while rx_mover.try_recv().is_ok() {}

        let gate = state.live().lock_match("m1").await;

        let (mut newcomer, _rx_newcomer) = viewer();
        let joining = {
            let state = state.clone();
            tokio::spawn(async move { join(&state, &mut newcomer, "m1").await })
        };
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        let mover_id = mover.id();
        let moving = {
            let state = state.clone();
            tokio::spawn(async move { join(&state, &mut mover, "m2").await })
        };
        while state.live().registry().match_of(&mover_id).as_deref() != Some("m2") {
            tokio::task::yield_now().await;
        }

        drop(gate);
        joining.await.unwrap();
        moving.await.unwrap();

        assert_eq!(next(&mut rx_stayer), json!({"type": "user_joined", "viewers": 2}));
        assert_eq!(next(&mut rx_stayer), json!({"type": "user_left", "viewers": 2}));
        assert_silent(&mut rx_stayer);
        assert_eq!(state.live().registry().count_for("m1"), 2);
    }

    #[tokio::test]
    async fn last_viewer_leaving_broadcasts_nothing() {
        let (state, _store) = state_with(vec![cricket_match("m1")]).await;
        let (mut session, mut rx) = viewer();
        join(&state, &mut session, "m1").await;
        next(&mut rx);

        handle_disconnect(&state, &mut session).await;
        assert_silent(&mut rx);
        assert_eq!(state.live().registry().watched_matches(), 0);
        assert_eq!(state.live().gate_count(), 0);

        // A second teardown of the same session is harmless.
        handle_disconnect(&state, &mut session).await;
    }

    struct StalledStore;

    fn stall<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
        Box::pin(futures::future::pending())
    }

    impl MatchStore for StalledStore {
        fn get_match(&self, _: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            stall()
        }

        fn apply_score_change(
            &self,
            _: MatchId,
            _: ScoreChange,
        ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
            stall()
        }

        fn append_commentary(
            &self,
            _: MatchId,
            _: CommentaryEntity,
        ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
            stall()
        }

        fn increment_poll_option_vote(
            &self,
            _: MatchId,
            _: String,
            _: String,
        ) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>> {
            stall()
        }

        fn create_match(&self, _: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            stall()
        }

        fn list_matches(
            &self,
            _: MatchFilter,
        ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
            stall()
        }

        fn advance_status(
            &self,
            _: MatchId,
            _: MatchStatus,
        ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            stall()
        }

        fn add_poll(
            &self,
            _: MatchId,
            _: PollEntity,
        ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
            stall()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            stall()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            stall()
        }
    }

    #[tokio::test]
    async fn stalled_store_calls_time_out() {
        let config = AppConfig::default().with_store_timeout(Duration::from_millis(20));
        let state = AppState::new(config);
        state.set_match_store(Arc::new(StalledStore)).await;
        let (mut session, mut rx) = viewer();

        let outcome = send(
            &state,
            &mut session,
            json!({"type": "join_match", "matchId": "m1"}),
        )
        .await;
        assert!(matches!(
            outcome,
            Err(ViewerError::StoreUnavailable(ServiceError::Timeout))
        ));
        assert!(session.current_match().is_none());
        assert_silent(&mut rx);
    }
}
