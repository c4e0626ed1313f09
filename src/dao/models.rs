//! Domain entities shared by the stores and the broadcast core.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;

/// Opaque identifier of a live match document.
pub type MatchId = String;

/// Sport discipline played in a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    /// Runs, wickets and overs.
    Cricket,
    /// Goals per side.
    Football,
    /// Sets per player.
    Tennis,
    /// Points per team.
    Esports,
}

impl Sport {
    /// Stored representation of the sport.
    pub fn as_str(self) -> &'static str {
        match self {
            Sport::Cricket => "cricket",
            Sport::Football => "football",
            Sport::Tennis => "tennis",
            Sport::Esports => "esports",
        }
    }
}

/// Lifecycle of a match: scheduled, then live, then completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created but not started.
    Scheduled,
    /// Being played.
    Live,
    /// Finished.
    Completed,
}

impl MatchStatus {
    /// Stored representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
        }
    }

    /// The status a match must currently be in to move to `self`.
    pub fn predecessor(self) -> Option<MatchStatus> {
        match self {
            MatchStatus::Scheduled => None,
            MatchStatus::Live => Some(MatchStatus::Scheduled),
            MatchStatus::Completed => Some(MatchStatus::Live),
        }
    }
}

/// Criteria for listing matches; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFilter {
    /// Only matches in this lifecycle status.
    pub status: Option<MatchStatus>,
    /// Only matches of this sport.
    pub sport: Option<Sport>,
}

impl MatchFilter {
    /// Matches currently being played.
    pub fn live() -> Self {
        Self {
            status: Some(MatchStatus::Live),
            sport: None,
        }
    }

    /// Whether `entity` satisfies every set criterion.
    pub fn accepts(&self, entity: &MatchEntity) -> bool {
        self.status.is_none_or(|status| entity.status == status)
            && self.sport.is_none_or(|sport| entity.sport == sport)
    }
}

/// Live match document shared between the store and the broadcast core.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEntity {
    /// Unique identifier.
    pub id: MatchId,
    /// Display title, e.g. "India vs Australia".
    pub title: String,
    /// Sport played; fixed at creation.
    pub sport: Sport,
    /// Home side or first player.
    pub team1: TeamScoreEntity,
    /// Away side or second player.
    pub team2: TeamScoreEntity,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Overs bowled so far (cricket only).
    pub current_overs: Option<f32>,
    /// Where the match is played.
    pub venue: Option<String>,
    /// Scheduled start, used to order listings.
    pub start_time: Option<SystemTime>,
    /// Append-only, in insertion order.
    pub commentary: Vec<CommentaryEntity>,
    /// Polls attached by administrators.
    pub polls: Vec<PollEntity>,
    /// When the document was created.
    pub created_at: SystemTime,
    /// Last write to the document.
    pub updated_at: SystemTime,
}

impl MatchEntity {
    /// Build a freshly scheduled match with zeroed scores and no commentary or polls.
    pub fn scheduled(
        id: MatchId,
        title: String,
        sport: Sport,
        team1: TeamScoreEntity,
        team2: TeamScoreEntity,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            title,
            sport,
            team1,
            team2,
            status: MatchStatus::Scheduled,
            current_overs: None,
            venue: None,
            start_time: None,
            commentary: Vec::new(),
            polls: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mutable access to one side of the match.
    pub fn team_mut(&mut self, side: TeamSide) -> &mut TeamScoreEntity {
        match side {
            TeamSide::Team1 => &mut self.team1,
            TeamSide::Team2 => &mut self.team2,
        }
    }
}

/// Score record of one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamScoreEntity {
    /// Team or player name.
    pub name: String,
    /// Optional logo URL.
    pub logo: Option<String>,
    /// Runs, goals, sets or points depending on the sport.
    pub score: u32,
    /// Wickets lost (cricket only, zero otherwise).
    pub wickets: u32,
}

impl TeamScoreEntity {
    /// A team with no points on the board.
    pub fn named(name: String, logo: Option<String>) -> Self {
        Self {
            name,
            logo,
            score: 0,
            wickets: 0,
        }
    }
}

/// One timestamped line of ball-by-ball commentary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentaryEntity {
    /// When the line was recorded.
    pub timestamp: SystemTime,
    /// Ball or minute marker, e.g. "12.3".
    pub ball: String,
    /// Commentary text.
    pub text: String,
}

/// Poll embedded in a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEntity {
    /// Identifier unique within the match.
    pub id: String,
    /// Question shown to viewers.
    pub question: String,
    /// Answers with their counters.
    pub options: Vec<PollOptionEntity>,
    /// When the poll was attached.
    pub created_at: SystemTime,
}

/// Option of a poll with its vote counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptionEntity {
    /// Identifier unique within the poll.
    pub id: String,
    /// Answer text.
    pub label: String,
    /// Votes received so far.
    pub votes: u64,
}

/// Which of the two sides a score field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSide {
    /// `team1` of the match.
    Team1,
    /// `team2` of the match.
    Team2,
}

/// A single write to one of the closed set of score paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreAssignment {
    /// Set the score of one side.
    Score(TeamSide, u32),
    /// Set the wickets lost by one side.
    Wickets(TeamSide, u32),
    /// Set the overs bowled.
    Overs(f32),
}

impl ScoreAssignment {
    /// Dotted document path written by this assignment.
    pub fn field_path(&self) -> &'static str {
        match self {
            ScoreAssignment::Score(TeamSide::Team1, _) => "team1.score",
            ScoreAssignment::Score(TeamSide::Team2, _) => "team2.score",
            ScoreAssignment::Wickets(TeamSide::Team1, _) => "team1.wickets",
            ScoreAssignment::Wickets(TeamSide::Team2, _) => "team2.wickets",
            ScoreAssignment::Overs(_) => "current_overs",
        }
    }

    /// Apply the assignment to an in-memory document.
    pub fn apply_to(&self, entity: &mut MatchEntity) {
        match *self {
            ScoreAssignment::Score(side, value) => entity.team_mut(side).score = value,
            ScoreAssignment::Wickets(side, value) => entity.team_mut(side).wickets = value,
            ScoreAssignment::Overs(value) => entity.current_overs = Some(value),
        }
    }
}

/// Score change for a match of the given sport.
///
/// The store only applies it when the stored match plays `sport`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreChange {
    /// Sport the fields belong to.
    pub sport: Sport,
    /// Fields to write, in order.
    pub assignments: Vec<ScoreAssignment>,
}
