//! Process-local match store used for tests and for running without MongoDB.

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    match_store::MatchStore,
    models::{
        CommentaryEntity, MatchEntity, MatchFilter, MatchId, MatchStatus, PollEntity, ScoreChange,
    },
    storage::{StorageError, StorageResult},
};

/// Match store keeping every document behind a single async lock.
///
/// Each mutation runs under one write guard, which makes it atomic with
/// respect to every other store call.
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    matches: RwLock<HashMap<MatchId, MatchEntity>>,
    unavailable: AtomicBool,
}

impl InMemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with [`StorageError::Unavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store switched off".into(),
                io::Error::new(io::ErrorKind::NotConnected, "store offline"),
            ));
        }
        Ok(())
    }

    async fn update<T, F>(&self, id: &str, apply: F) -> StorageResult<T>
    where
        F: FnOnce(&mut MatchEntity) -> StorageResult<T>,
    {
        self.check_available()?;
        let mut guard = self.inner.matches.write().await;
        let entity = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(format!("match `{id}`")))?;
        let previous = std::mem::replace(&mut entity.updated_at, SystemTime::now());
        apply(entity).inspect_err(|_| entity.updated_at = previous)
    }
}

impl MatchStore for InMemoryMatchStore {
    fn get_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_available()?;
            Ok(store.inner.matches.read().await.get(&id).cloned())
        })
    }

    fn apply_score_change(
        &self,
        id: MatchId,
        change: ScoreChange,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update(&id, |entity| {
                    if entity.sport != change.sport {
                        return Err(StorageError::not_found(format!(
                            "{} match `{}`",
                            change.sport.as_str(),
                            entity.id
                        )));
                    }
                    for assignment in &change.assignments {
                        assignment.apply_to(entity);
                    }
                    Ok(entity.clone())
                })
                .await
        })
    }

    fn append_commentary(
        &self,
        id: MatchId,
        entry: CommentaryEntity,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update(&id, |entity| {
                    entity.commentary.push(entry);
                    Ok(entity.clone())
                })
                .await
        })
    }

    fn increment_poll_option_vote(
        &self,
        id: MatchId,
        poll_id: String,
        option_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update(&id, |entity| {
                    let option = entity
                        .polls
                        .iter_mut()
                        .find(|poll| poll.id == poll_id)
                        .and_then(|poll| {
                            poll.options.iter_mut().find(|option| option.id == option_id)
                        })
                        .ok_or_else(|| {
                            StorageError::not_found(format!(
                                "poll `{poll_id}` option `{option_id}` in match `{id}`"
                            ))
                        })?;
                    option.votes += 1;
                    Ok(entity.polls.clone())
                })
                .await
        })
    }

    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_available()?;
            store
                .inner
                .matches
                .write()
                .await
                .insert(entity.id.clone(), entity);
            Ok(())
        })
    }

    fn list_matches(
        &self,
        filter: MatchFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_available()?;
            let guard = store.inner.matches.read().await;
            let mut matches: Vec<MatchEntity> = guard
                .values()
                .filter(|entity| filter.accepts(entity))
                .cloned()
                .collect();
            matches.sort_by(|a, b| b.start_time.cmp(&a.start_time));
            Ok(matches)
        })
    }

    fn advance_status(
        &self,
        id: MatchId,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update(&id, |entity| {
                    if status.predecessor() != Some(entity.status) {
                        return Ok(None);
                    }
                    entity.status = status;
                    Ok(Some(entity.clone()))
                })
                .await
        })
    }

    fn add_poll(
        &self,
        id: MatchId,
        poll: PollEntity,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update(&id, |entity| {
                    entity.polls.push(poll);
                    Ok(entity.clone())
                })
                .await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_available() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_available() })
    }
}
