//! Viewer WebSocket protocol: inbound commands and outbound events.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{ScoreAssignment, ScoreChange, Sport, TeamSide},
    dto::{
        matches::{MatchSnapshot, PollSnapshot},
        validation::validate_not_blank,
    },
};

/// Reasons an inbound frame could not be turned into a [`ViewerInboundMessage`].
#[derive(Debug, Error)]
pub enum InboundDecodeError {
    /// The frame is longer than the configured limit.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Length of the rejected frame.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
    /// Not JSON, or not a known message shape.
    #[error("unrecognised message: {0}")]
    Parse(#[from] serde_json::Error),
    /// Well-formed but failing field validation.
    #[error("invalid payload: {0}")]
    Invalid(#[from] ValidationErrors),
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
/// Messages accepted from live match viewers.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerInboundMessage {
    /// Subscribe to a match, leaving any previous one.
    JoinMatch(JoinMatchPayload),
    /// Overwrite score fields of the joined match.
    ScoreUpdate(ScoreUpdatePayload),
    /// Append a commentary line to the joined match.
    Commentary(CommentaryPayload),
    /// Vote for one option of a poll on the joined match.
    PollVote(PollVotePayload),
}

impl ViewerInboundMessage {
    /// Decode and validate a text frame, rejecting frames above `limit` bytes unparsed.
    pub fn from_json_str(text: &str, limit: usize) -> Result<Self, InboundDecodeError> {
        if text.len() > limit {
            return Err(InboundDecodeError::TooLarge {
                size: text.len(),
                limit,
            });
        }
        let message: Self = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }

    /// Wire name of the message kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinMatch(_) => "join_match",
            Self::ScoreUpdate(_) => "score_update",
            Self::Commentary(_) => "commentary",
            Self::PollVote(_) => "poll_vote",
        }
    }
}

impl Validate for ViewerInboundMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::JoinMatch(payload) => payload.validate(),
            Self::ScoreUpdate(_) => Ok(()),
            Self::Commentary(payload) => payload.validate(),
            Self::PollVote(payload) => payload.validate(),
        }
    }
}

/// Body of `join_match`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinMatchPayload {
    /// Match to watch.
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub match_id: String,
    /// Advisory viewer identity; anonymous viewers omit it.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Body of `score_update`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ScoreUpdatePayload {
    /// Fields to overwrite.
    pub updates: ScoreDelta,
}

/// Body of `commentary`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CommentaryPayload {
    /// Commentary text.
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub text: String,
    /// Ball or minute marker.
    #[validate(length(min = 1, max = 16), custom(function = "validate_not_blank"))]
    pub ball: String,
}

/// Body of `poll_vote`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PollVotePayload {
    /// Poll being answered.
    #[validate(length(min = 1, max = 64))]
    pub poll_id: String,
    /// Chosen option of that poll.
    #[validate(length(min = 1, max = 64))]
    pub option_id: String,
}

/// Sport-specific score fields a viewer may update; absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "sport", rename_all = "snake_case")]
pub enum ScoreDelta {
    /// Cricket fields.
    Cricket(CricketScoreDelta),
    /// Football fields.
    Football(FootballScoreDelta),
    /// Tennis fields.
    Tennis(TennisScoreDelta),
    /// Esports fields.
    Esports(EsportsScoreDelta),
}

/// Cricket score fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CricketScoreDelta {
    /// Runs of `team1`.
    pub team1_runs: Option<u32>,
    /// Wickets lost by `team1`.
    pub team1_wickets: Option<u32>,
    /// Runs of `team2`.
    pub team2_runs: Option<u32>,
    /// Wickets lost by `team2`.
    pub team2_wickets: Option<u32>,
    /// Overs bowled in the current innings.
    pub overs: Option<f32>,
}

/// Football score fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FootballScoreDelta {
    /// Goals of `team1`.
    pub home_goals: Option<u32>,
    /// Goals of `team2`.
    pub away_goals: Option<u32>,
}

/// Tennis score fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TennisScoreDelta {
    /// Sets won by `team1`.
    pub team1_sets: Option<u32>,
    /// Sets won by `team2`.
    pub team2_sets: Option<u32>,
}

/// Esports score fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EsportsScoreDelta {
    /// Points of `team1`.
    pub team1_score: Option<u32>,
    /// Points of `team2`.
    pub team2_score: Option<u32>,
}

impl From<ScoreDelta> for ScoreChange {
    fn from(delta: ScoreDelta) -> Self {
        use ScoreAssignment::{Overs, Score, Wickets};
        use TeamSide::{Team1, Team2};

        let (sport, candidates) = match delta {
            ScoreDelta::Cricket(d) => (
                Sport::Cricket,
                vec![
                    d.team1_runs.map(|v| Score(Team1, v)),
                    d.team1_wickets.map(|v| Wickets(Team1, v)),
                    d.team2_runs.map(|v| Score(Team2, v)),
                    d.team2_wickets.map(|v| Wickets(Team2, v)),
                    d.overs.map(Overs),
                ],
            ),
            ScoreDelta::Football(d) => (
                Sport::Football,
                vec![
                    d.home_goals.map(|v| Score(Team1, v)),
                    d.away_goals.map(|v| Score(Team2, v)),
                ],
            ),
            ScoreDelta::Tennis(d) => (
                Sport::Tennis,
                vec![
                    d.team1_sets.map(|v| Score(Team1, v)),
                    d.team2_sets.map(|v| Score(Team2, v)),
                ],
            ),
            ScoreDelta::Esports(d) => (
                Sport::Esports,
                vec![
                    d.team1_score.map(|v| Score(Team1, v)),
                    d.team2_score.map(|v| Score(Team2, v)),
                ],
            ),
        };

        ScoreChange {
            sport,
            assignments: candidates.into_iter().flatten().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to live match viewers.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerOutboundMessage {
    /// Full snapshot sent to a viewer right after it joins.
    MatchState {
        /// Current match document.
        data: MatchSnapshot,
    },
    /// Someone else joined; carries the room size after the join.
    UserJoined {
        /// Viewers now in the room.
        viewers: usize,
    },
    /// Full snapshot after a score or status change.
    ScoreUpdate {
        /// Updated match document.
        data: MatchSnapshot,
    },
    /// A commentary line was recorded.
    NewCommentary {
        /// Commentary text.
        commentary: String,
        /// Ball or minute marker.
        ball: String,
    },
    /// Poll counters changed.
    PollUpdate {
        /// Every poll of the match.
        polls: Vec<PollSnapshot>,
    },
    /// Someone left; carries the room size after the departure.
    UserLeft {
        /// Viewers still in the room.
        viewers: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 16 * 1024;

    #[test]
    fn decodes_the_four_inbound_kinds() {
        let join = ViewerInboundMessage::from_json_str(
            r#"{"type":"join_match","matchId":"m1","userId":"u7"}"#,
            LIMIT,
        )
        .unwrap();
        match join {
            ViewerInboundMessage::JoinMatch(payload) => {
                assert_eq!(payload.match_id, "m1");
                assert_eq!(payload.user_id.as_deref(), Some("u7"));
            }
            other => panic!("unexpected message {other:?}"),
        }

        let anonymous =
            ViewerInboundMessage::from_json_str(r#"{"type":"join_match","matchId":"m1"}"#, LIMIT)
                .unwrap();
        assert!(matches!(
            anonymous,
            ViewerInboundMessage::JoinMatch(JoinMatchPayload { user_id: None, .. })
        ));

        let commentary = ViewerInboundMessage::from_json_str(
            r#"{"type":"commentary","text":"Six runs!","ball":"12.3"}"#,
            LIMIT,
        )
        .unwrap();
        assert_eq!(commentary.kind(), "commentary");

        let vote = ViewerInboundMessage::from_json_str(
            r#"{"type":"poll_vote","pollId":"p1","optionId":"o2"}"#,
            LIMIT,
        )
        .unwrap();
        assert_eq!(vote.kind(), "poll_vote");

        let score = ViewerInboundMessage::from_json_str(
            r#"{"type":"score_update","updates":{"sport":"football","homeGoals":2}}"#,
            LIMIT,
        )
        .unwrap();
        match score {
            ViewerInboundMessage::ScoreUpdate(payload) => assert_eq!(
                payload.updates,
                ScoreDelta::Football(FootballScoreDelta {
                    home_goals: Some(2),
                    away_goals: None,
                })
            ),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn unknown_kinds_and_bad_payloads_are_rejected() {
        assert!(matches!(
            ViewerInboundMessage::from_json_str(r#"{"type":"chat","text":"hi"}"#, LIMIT),
            Err(InboundDecodeError::Parse(_))
        ));
        assert!(matches!(
            ViewerInboundMessage::from_json_str("not json", LIMIT),
            Err(InboundDecodeError::Parse(_))
        ));
        assert!(matches!(
            ViewerInboundMessage::from_json_str(
                r#"{"type":"commentary","text":"   ","ball":"1.1"}"#,
                LIMIT
            ),
            Err(InboundDecodeError::Invalid(_))
        ));
        assert!(matches!(
            ViewerInboundMessage::from_json_str(r#"{"type":"join_match","matchId":""}"#, LIMIT),
            Err(InboundDecodeError::Invalid(_))
        ));
    }

    #[test]
    fn oversized_frames_are_rejected_before_parsing() {
        let text = format!(
            r#"{{"type":"commentary","text":"{}","ball":"1.1"}}"#,
            "a".repeat(64)
        );
        assert!(matches!(
            ViewerInboundMessage::from_json_str(&text, 32),
            Err(InboundDecodeError::TooLarge { limit: 32, .. })
        ));
    }

    #[test]
    fn score_delta_only_writes_provided_fields() {
        let change = ScoreChange::from(ScoreDelta::Cricket(CricketScoreDelta {
            team2_runs: Some(201),
            overs: Some(40.2),
            ..Default::default()
        }));
        assert_eq!(change.sport, Sport::Cricket);
        assert_eq!(
            change.assignments,
            vec![
                ScoreAssignment::Score(TeamSide::Team2, 201),
                ScoreAssignment::Overs(40.2),
            ]
        );
    }

    #[test]
    fn outbound_messages_carry_their_type_tag() {
        let joined =
            serde_json::to_value(ViewerOutboundMessage::UserJoined { viewers: 2 }).unwrap();
        assert_eq!(joined, serde_json::json!({"type": "user_joined", "viewers": 2}));

        let commentary = serde_json::to_value(ViewerOutboundMessage::NewCommentary {
            commentary: "Six runs!".into(),
            ball: "12.3".into(),
        })
        .unwrap();
        assert_eq!(
            commentary,
            serde_json::json!({"type": "new_commentary", "commentary": "Six runs!", "ball": "12.3"})
        );
    }
}
