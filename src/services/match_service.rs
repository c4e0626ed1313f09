//! Match management used by the REST routes.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{
        CommentaryEntity, MatchFilter, MatchId, MatchStatus, PollEntity, PollOptionEntity, Sport,
    },
    dto::matches::{
        AddCommentaryRequest, CreateMatchRequest, CreatePollRequest, MatchSnapshot,
        ViewerCountResponse,
    },
    error::ServiceError,
    services::{call_store, live_service},
    state::SharedState,
};

/// Every match, optionally restricted to one sport, most recent start first.
pub async fn list_matches(
    state: &SharedState,
    sport: Option<Sport>,
) -> Result<Vec<MatchSnapshot>, ServiceError> {
    let filter = MatchFilter {
        status: None,
        sport,
    };
    list_filtered(state, filter).await
}

/// Matches currently being played.
pub async fn list_live_matches(state: &SharedState) -> Result<Vec<MatchSnapshot>, ServiceError> {
    list_filtered(state, MatchFilter::live()).await
}

async fn list_filtered(
    state: &SharedState,
    filter: MatchFilter,
) -> Result<Vec<MatchSnapshot>, ServiceError> {
    let matches = call_store(state, move |store| store.list_matches(filter)).await?;
    Ok(matches.into_iter().map(Into::into).collect())
}

/// Full snapshot of one match.
pub async fn get_match(state: &SharedState, id: MatchId) -> Result<MatchSnapshot, ServiceError> {
    let lookup = id.clone();
    call_store(state, move |store| store.get_match(lookup))
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}`")))
}

/// Number of viewers connected to a match right now.
pub fn viewer_count(state: &SharedState, id: MatchId) -> ViewerCountResponse {
    let viewers = state.live().registry().count_for(&id);
    ViewerCountResponse {
        match_id: id,
        viewers,
    }
}

/// Schedule a new match with zeroed scores.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<MatchSnapshot, ServiceError> {
    let entity = request.into_entity(Uuid::new_v4().simple().to_string());
    let stored = entity.clone();
    call_store(state, move |store| store.create_match(stored)).await?;
    info!(match_id = %entity.id, sport = entity.sport.as_str(), "match created");
    Ok(entity.into())
}

/// Move a match forward in its lifecycle and push the new snapshot to its viewers.
pub async fn change_status(
    state: &SharedState,
    id: MatchId,
    status: MatchStatus,
) -> Result<MatchSnapshot, ServiceError> {
    if status.predecessor().is_none() {
        return Err(ServiceError::InvalidState(format!(
            "a match cannot go back to `{}`",
            status.as_str()
        )));
    }

    live_service::run_gated(state, &id, async {
        let target = id.clone();
        let updated = call_store(state, move |store| store.advance_status(target, status))
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState(format!(
                    "match `{id}` cannot move to `{}` from its current status",
                    status.as_str()
                ))
            })?;
        info!(match_id = %id, status = status.as_str(), "match status changed");
        live_service::broadcast_match(state, updated.clone());
        Ok::<MatchSnapshot, ServiceError>(updated.into())
    })
    .await
}

/// Attach a poll with zeroed counters and push the poll list to viewers.
pub async fn create_poll(
    state: &SharedState,
    id: MatchId,
    request: CreatePollRequest,
) -> Result<MatchSnapshot, ServiceError> {
    let poll = PollEntity {
        id: Uuid::new_v4().simple().to_string(),
        question: request.question.trim().to_owned(),
        options: request
            .options
            .into_iter()
            .map(|label| PollOptionEntity {
                id: Uuid::new_v4().simple().to_string(),
                label: label.trim().to_owned(),
                votes: 0,
            })
            .collect(),
        created_at: SystemTime::now(),
    };

    live_service::run_gated(state, &id, async {
        let target = id.clone();
        let updated = call_store(state, move |store| store.add_poll(target, poll)).await?;
        live_service::broadcast_polls(state, &id, updated.polls.clone());
        Ok::<MatchSnapshot, ServiceError>(updated.into())
    })
    .await
}

/// Append a commentary line on behalf of an administrator and push it to viewers.
pub async fn add_commentary(
    state: &SharedState,
    id: MatchId,
    request: AddCommentaryRequest,
) -> Result<MatchSnapshot, ServiceError> {
    let entry = CommentaryEntity {
        timestamp: SystemTime::now(),
        ball: request.ball.trim().to_owned(),
        text: request.text.trim().to_owned(),
    };

    live_service::run_gated(state, &id, async {
        let target = id.clone();
        let stored = entry.clone();
        let updated = call_store(state, move |store| store.append_commentary(target, stored))
            .await?;
        live_service::broadcast_commentary(state, &id, entry);
        Ok::<MatchSnapshot, ServiceError>(updated.into())
    })
    .await
}
