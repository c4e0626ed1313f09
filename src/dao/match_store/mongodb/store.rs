//! Atomic match mutations expressed as MongoDB updates.

use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoCommentary, MongoMatchDocument, MongoPoll, score_set_document},
};
use crate::dao::{
    match_store::MatchStore,
    models::{
        CommentaryEntity, MatchEntity, MatchFilter, MatchId, MatchStatus, PollEntity, ScoreChange,
    },
    storage::StorageResult,
};

const MATCH_COLLECTION_NAME: &str = "live_matches";

/// [`MatchStore`] backed by a MongoDB collection of live match documents.
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "status": 1, "start_time": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("match_status_idx".to_owned()))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "status,start_time",
                source,
            })?;
        Ok(())
    }

    async fn collection(&self) -> Collection<MongoMatchDocument> {
        let guard = self.inner.database.read().await;
        guard.collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    /// Apply `update` to the match selected by `filter` in one server-side operation
    /// and return the post-update document.
    async fn update_and_fetch(
        &self,
        id: &str,
        operation: &'static str,
        filter: Document,
        update: Document,
        array_filters: Option<Vec<Document>>,
    ) -> MongoResult<MatchEntity> {
        let collection = self.collection().await;
        let mut action = collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After);
        if let Some(filters) = array_filters {
            action = action.array_filters(filters);
        }
        let document = action
            .await
            .map_err(|source| MongoDaoError::UpdateMatch {
                id: id.to_owned(),
                operation,
                source,
            })?
            .ok_or_else(|| MongoDaoError::MissingDocument {
                what: format!("{operation} target in match `{id}`"),
            })?;
        Ok(document.into())
    }

    async fn get_match(&self, id: MatchId) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc! { "_id": id.as_str() })
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn apply_score_change(
        &self,
        id: MatchId,
        change: ScoreChange,
    ) -> MongoResult<MatchEntity> {
        self.update_and_fetch(
            &id,
            "apply score change",
            doc! { "_id": id.as_str(), "sport": change.sport.as_str() },
            doc! { "$set": score_set_document(&change.assignments) },
            None,
        )
        .await
    }

    async fn append_commentary(
        &self,
        id: MatchId,
        entry: CommentaryEntity,
    ) -> MongoResult<MatchEntity> {
        let entry = MongoCommentary::from(entry);
        self.update_and_fetch(
            &id,
            "append commentary",
            doc! { "_id": id.as_str() },
            doc! {
                "$push": { "commentary": entry.to_document() },
                "$set": { "updated_at": DateTime::now() },
            },
            None,
        )
        .await
    }

    async fn increment_poll_option_vote(
        &self,
        id: MatchId,
        poll_id: String,
        option_id: String,
    ) -> MongoResult<Vec<PollEntity>> {
        let updated = self
            .update_and_fetch(
                &id,
                "increment poll vote",
                doc! {
                    "_id": id.as_str(),
                    "polls": {
                        "$elemMatch": { "id": poll_id.as_str(), "options.id": option_id.as_str() }
                    },
                },
                doc! { "$inc": { "polls.$[poll].options.$[option].votes": 1_i64 } },
                Some(vec![
                    doc! { "poll.id": poll_id.as_str() },
                    doc! { "option.id": option_id.as_str() },
                ]),
            )
            .await?;
        Ok(updated.polls)
    }

    async fn create_match(&self, entity: MatchEntity) -> MongoResult<()> {
        let id = entity.id.clone();
        let document = MongoMatchDocument::from(entity);
        self.collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertMatch { id, source })?;
        Ok(())
    }

    async fn list_matches(&self, criteria: MatchFilter) -> MongoResult<Vec<MatchEntity>> {
        let mut filter = doc! {};
        if let Some(status) = criteria.status {
            filter.insert("status", status.as_str());
        }
        if let Some(sport) = criteria.sport {
            filter.insert("sport", sport.as_str());
        }
        let documents: Vec<MongoMatchDocument> = self
            .collection()
            .await
            .find(filter)
            .sort(doc! { "start_time": -1 })
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn advance_status(
        &self,
        id: MatchId,
        status: MatchStatus,
    ) -> MongoResult<Option<MatchEntity>> {
        let Some(expected) = status.predecessor() else {
            return Ok(None);
        };
        let outcome = self
            .update_and_fetch(
                &id,
                "advance status",
                doc! { "_id": id.as_str(), "status": expected.as_str() },
                doc! { "$set": { "status": status.as_str(), "updated_at": DateTime::now() } },
                None,
            )
            .await;

        match outcome {
            Ok(entity) => Ok(Some(entity)),
            // Tell "wrong status" apart from "unknown match".
            Err(MongoDaoError::MissingDocument { what }) => match self.get_match(id).await? {
                Some(_) => Ok(None),
                None => Err(MongoDaoError::MissingDocument { what }),
            },
            Err(err) => Err(err),
        }
    }

    async fn add_poll(&self, id: MatchId, poll: PollEntity) -> MongoResult<MatchEntity> {
        let poll = MongoPoll::from(poll);
        self.update_and_fetch(
            &id,
            "add poll",
            doc! { "_id": id.as_str() },
            doc! {
                "$push": { "polls": poll.to_document() },
                "$set": { "updated_at": DateTime::now() },
            },
            None,
        )
        .await
    }
}

impl MatchStore for MongoMatchStore {
    fn get_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_match(id).await.map_err(Into::into) })
    }

    fn apply_score_change(
        &self,
        id: MatchId,
        change: ScoreChange,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.apply_score_change(id, change).await.map_err(Into::into) })
    }

    fn append_commentary(
        &self,
        id: MatchId,
        entry: CommentaryEntity,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.append_commentary(id, entry).await.map_err(Into::into) })
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
                .increment_poll_option_vote(id, poll_id, option_id)
                .await
                .map_err(Into::into)
        })
    }

    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_match(entity).await.map_err(Into::into) })
    }

    fn list_matches(
        &self,
        filter: MatchFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches(filter).await.map_err(Into::into) })
    }

    fn advance_status(
        &self,
        id: MatchId,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.advance_status(id, status).await.map_err(Into::into) })
    }

    fn add_poll(
        &self,
        id: MatchId,
        poll: PollEntity,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.add_poll(id, poll).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
