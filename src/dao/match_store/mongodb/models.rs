//! BSON document shapes persisted in the `live_matches` collection.

use mongodb::bson::{Bson, DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    CommentaryEntity, MatchEntity, MatchStatus, PollEntity, PollOptionEntity, ScoreAssignment,
    Sport, TeamScoreEntity,
};

/// Stored shape of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    sport: Sport,
    team1: MongoTeamScore,
    team2: MongoTeamScore,
    status: MatchStatus,
    #[serde(default)]
    current_overs: Option<f64>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    start_time: Option<DateTime>,
    #[serde(default)]
    commentary: Vec<MongoCommentary>,
    #[serde(default)]
    polls: Vec<MongoPoll>,
    created_at: DateTime,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoTeamScore {
    name: String,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    wickets: i64,
}

/// Stored commentary line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCommentary {
    timestamp: DateTime,
    ball: String,
    text: String,
}

/// Stored poll with embedded option counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPoll {
    id: String,
    question: String,
    options: Vec<MongoPollOption>,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoPollOption {
    id: String,
    label: String,
    #[serde(default)]
    votes: i64,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            sport: value.sport,
            team1: value.team1.into(),
            team2: value.team2.into(),
            status: value.status,
            current_overs: value.current_overs.map(f64::from),
            venue: value.venue,
            start_time: value.start_time.map(DateTime::from_system_time),
            commentary: value.commentary.into_iter().map(Into::into).collect(),
            polls: value.polls.into_iter().map(Into::into).collect(),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: value.id,
            title: value.title,
            sport: value.sport,
            team1: value.team1.into(),
            team2: value.team2.into(),
            status: value.status,
            current_overs: value.current_overs.map(|overs| overs as f32),
            venue: value.venue,
            start_time: value.start_time.map(DateTime::to_system_time),
            commentary: value.commentary.into_iter().map(Into::into).collect(),
            polls: value.polls.into_iter().map(Into::into).collect(),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

impl From<TeamScoreEntity> for MongoTeamScore {
    fn from(value: TeamScoreEntity) -> Self {
        Self {
            name: value.name,
            logo: value.logo,
            score: value.score.into(),
            wickets: value.wickets.into(),
        }
    }
}

impl From<MongoTeamScore> for TeamScoreEntity {
    fn from(value: MongoTeamScore) -> Self {
        Self {
            name: value.name,
            logo: value.logo,
            score: clamp_counter(value.score),
            wickets: clamp_counter(value.wickets),
        }
    }
}

impl From<CommentaryEntity> for MongoCommentary {
    fn from(value: CommentaryEntity) -> Self {
        Self {
            timestamp: DateTime::from_system_time(value.timestamp),
            ball: value.ball,
            text: value.text,
        }
    }
}

impl From<MongoCommentary> for CommentaryEntity {
    fn from(value: MongoCommentary) -> Self {
        Self {
            timestamp: value.timestamp.to_system_time(),
            ball: value.ball,
            text: value.text,
        }
    }
}

impl From<PollEntity> for MongoPoll {
    fn from(value: PollEntity) -> Self {
        Self {
            id: value.id,
            question: value.question,
            options: value
                .options
                .into_iter()
                .map(|option| MongoPollOption {
                    id: option.id,
                    label: option.label,
                    votes: i64::try_from(option.votes).unwrap_or(i64::MAX),
                })
                .collect(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoPoll> for PollEntity {
    fn from(value: MongoPoll) -> Self {
        Self {
            id: value.id,
            question: value.question,
            options: value
                .options
                .into_iter()
                .map(|option| PollOptionEntity {
                    id: option.id,
                    label: option.label,
                    votes: u64::try_from(option.votes).unwrap_or_default(),
                })
                .collect(),
            created_at: value.created_at.to_system_time(),
        }
    }
}

impl MongoCommentary {
    /// Embedded document pushed onto the `commentary` array.
    pub fn to_document(&self) -> Document {
        doc! {
            "timestamp": self.timestamp,
            "ball": self.ball.as_str(),
            "text": self.text.as_str(),
        }
    }
}

impl MongoPoll {
    /// Embedded document pushed onto the `polls` array.
    pub fn to_document(&self) -> Document {
        let options: Vec<Document> = self
            .options
            .iter()
            .map(|option| {
                doc! {
                    "id": option.id.as_str(),
                    "label": option.label.as_str(),
                    "votes": option.votes,
                }
            })
            .collect();
        doc! {
            "id": self.id.as_str(),
            "question": self.question.as_str(),
            "options": options,
            "created_at": self.created_at,
        }
    }
}

/// `$set` body for a score change; only the closed set of score paths can appear.
pub fn score_set_document(assignments: &[ScoreAssignment]) -> Document {
    let mut set = Document::new();
    for assignment in assignments {
        let value = match *assignment {
            ScoreAssignment::Score(_, value) | ScoreAssignment::Wickets(_, value) => {
                Bson::Int64(value.into())
            }
            ScoreAssignment::Overs(value) => Bson::Double(value.into()),
        };
        set.insert(assignment.field_path(), value);
    }
    set.insert("updated_at", DateTime::now());
    set
}

fn clamp_counter(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::TeamSide;

    #[test]
    fn score_set_document_uses_dotted_paths() {
        let set = score_set_document(&[
            ScoreAssignment::Score(TeamSide::Team1, 120),
            ScoreAssignment::Wickets(TeamSide::Team1, 3),
            ScoreAssignment::Overs(15.2),
        ]);

        assert_eq!(set.get_i64("team1.score").unwrap(), 120);
        assert_eq!(set.get_i64("team1.wickets").unwrap(), 3);
        assert!(set.get_f64("current_overs").is_ok());
        assert!(set.contains_key("updated_at"));
        assert!(!set.contains_key("team2.score"));
    }

    #[test]
    fn negative_counters_are_clamped() {
        assert_eq!(clamp_counter(-4), 0);
        assert_eq!(clamp_counter(12), 12);
    }
}
