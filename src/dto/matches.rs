//! DTOs describing live matches on the wire, shared by the WebSocket and REST surfaces.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{
        CommentaryEntity, MatchEntity, MatchId, MatchStatus, PollEntity, PollOptionEntity, Sport,
        TeamScoreEntity,
    },
    dto::{
        format_system_time, parse_system_time,
        validation::{validate_not_blank, validate_option_labels, validate_rfc3339},
    },
};

/// Full view of a live match as sent to viewers.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    /// Match identifier.
    pub id: MatchId,
    /// Display title.
    pub title: String,
    /// Sport played.
    pub sport: Sport,
    /// Home side or first player.
    pub team1: TeamScoreSnapshot,
    /// Away side or second player.
    pub team2: TeamScoreSnapshot,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Overs bowled (cricket).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_overs: Option<f32>,
    /// Where the match is played.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// RFC 3339 start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Commentary log, oldest first.
    pub commentary: Vec<CommentarySnapshot>,
    /// Attached polls.
    pub polls: Vec<PollSnapshot>,
}

/// One side of a match as sent to viewers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamScoreSnapshot {
    /// Team or player name.
    pub name: String,
    /// Logo URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Runs, goals, sets or points.
    pub score: u32,
    /// Wickets lost (cricket).
    pub wickets: u32,
}

/// Commentary line as sent to viewers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentarySnapshot {
    /// RFC 3339 timestamp at which the entry was recorded.
    pub timestamp: String,
    /// Ball or minute marker.
    pub ball: String,
    /// Commentary text.
    pub commentary: String,
}

/// Poll with its current counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    /// Poll identifier used by `poll_vote`.
    pub id: String,
    /// Question shown to viewers.
    pub question: String,
    /// Answers with their vote counts.
    pub options: Vec<PollOptionSnapshot>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// One poll answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollOptionSnapshot {
    /// Option identifier used by `poll_vote`.
    pub id: String,
    /// Answer text.
    pub option: String,
    /// Votes received so far.
    pub votes: u64,
}

impl From<MatchEntity> for MatchSnapshot {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            sport: value.sport,
            team1: value.team1.into(),
            team2: value.team2.into(),
            status: value.status,
            current_overs: value.current_overs,
            venue: value.venue,
            start_time: value.start_time.map(format_system_time),
            commentary: value.commentary.into_iter().map(Into::into).collect(),
            polls: value.polls.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<TeamScoreEntity> for TeamScoreSnapshot {
    fn from(value: TeamScoreEntity) -> Self {
        Self {
            name: value.name,
            logo: value.logo,
            score: value.score,
            wickets: value.wickets,
        }
    }
}

impl From<CommentaryEntity> for CommentarySnapshot {
    fn from(value: CommentaryEntity) -> Self {
        Self {
            timestamp: format_system_time(value.timestamp),
            ball: value.ball,
            commentary: value.text,
        }
    }
}

impl From<PollEntity> for PollSnapshot {
    fn from(value: PollEntity) -> Self {
        Self {
            id: value.id,
            question: value.question,
            options: value.options.into_iter().map(Into::into).collect(),
            created_at: format_system_time(value.created_at),
        }
    }
}

impl From<PollOptionEntity> for PollOptionSnapshot {
    fn from(value: PollOptionEntity) -> Self {
        Self {
            id: value.id,
            option: value.label,
            votes: value.votes,
        }
    }
}

/// Payload used by administrators to schedule a new match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    /// Display title.
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    /// Sport played; cannot change afterwards.
    pub sport: Sport,
    /// Home side or first player.
    #[validate(nested)]
    pub team1: TeamInput,
    /// Away side or second player.
    #[validate(nested)]
    pub team2: TeamInput,
    /// Where the match is played.
    #[serde(default)]
    pub venue: Option<String>,
    /// RFC 3339 kick-off time.
    #[serde(default)]
    #[validate(custom(function = "validate_rfc3339"))]
    pub start_time: Option<String>,
}

/// Team definition supplied when scheduling a match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    /// Team or player name.
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    /// Logo URL.
    #[serde(default)]
    pub logo: Option<String>,
}

/// Request to move a match forward in its lifecycle.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    /// Target status; must follow the current one.
    pub status: MatchStatus,
}

/// Request to attach a new poll to a match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePollRequest {
    /// Question shown to viewers.
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub question: String,
    /// Two to six distinct answer labels.
    #[validate(length(min = 2, max = 6), custom(function = "validate_option_labels"))]
    pub options: Vec<String>,
}

/// Commentary line posted through the REST API.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddCommentaryRequest {
    /// Commentary text.
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub text: String,
    /// Ball or minute marker.
    #[validate(length(min = 1, max = 16), custom(function = "validate_not_blank"))]
    pub ball: String,
}

/// Query string accepted by the match listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMatchesQuery {
    /// Only list matches of this sport.
    pub sport: Option<Sport>,
}

/// Number of viewers currently watching a match.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCountResponse {
    /// Match the count refers to.
    pub match_id: MatchId,
    /// Connected viewers.
    pub viewers: usize,
}

impl CreateMatchRequest {
    /// Build the scheduled match document stored for this request.
    pub fn into_entity(self, id: MatchId) -> MatchEntity {
        let mut entity = MatchEntity::scheduled(
            id,
            self.title.trim().to_owned(),
            self.sport,
            TeamScoreEntity::named(self.team1.name.trim().to_owned(), self.team1.logo),
            TeamScoreEntity::named(self.team2.name.trim().to_owned(), self.team2.logo),
        );
        entity.venue = self.venue;
        entity.start_time = self.start_time.as_deref().and_then(parse_system_time);
        entity
    }
}
