//! Match store abstraction and its backends.

/// In-process store used for tests and `MATCH_STORE=memory`.
pub mod memory;
/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    CommentaryEntity, MatchEntity, MatchFilter, MatchId, MatchStatus, PollEntity, ScoreChange,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use memory::InMemoryMatchStore;

/// Abstraction over the persistence layer holding live match documents.
///
/// Every mutation is a single atomic operation of the backend; callers never
/// read, modify and write back a whole match.
pub trait MatchStore: Send + Sync {
    /// Load one match, `None` when it does not exist.
    fn get_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Write the provided score fields and return the updated match.
    fn apply_score_change(
        &self,
        id: MatchId,
        change: ScoreChange,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>>;
    /// Append one entry at the end of the commentary log and return the updated match.
    fn append_commentary(
        &self,
        id: MatchId,
        entry: CommentaryEntity,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>>;
    /// Increment one option counter by exactly one and return the updated poll list.
    fn increment_poll_option_vote(
        &self,
        id: MatchId,
        poll_id: String,
        option_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>>;
    /// Insert a new match document.
    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Matches accepted by `filter`, most recent start time first.
    fn list_matches(
        &self,
        filter: MatchFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    /// Move the match to `status` if it is currently in `status.predecessor()`.
    ///
    /// Returns `Ok(None)` when the match exists but is not in the expected status.
    fn advance_status(
        &self,
        id: MatchId,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Append a poll and return the updated match.
    fn add_poll(&self, id: MatchId, poll: PollEntity)
    -> BoxFuture<'static, StorageResult<MatchEntity>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection in place.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
