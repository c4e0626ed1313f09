//! Application services sitting between the routes and the match store.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::time::timeout;

use crate::{
    dao::{match_store::MatchStore, storage::StorageResult},
    error::ServiceError,
    state::SharedState,
};

/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Viewer message handling and fan-out for live match rooms.
pub mod live_service;
/// Match administration and read operations behind the REST API.
pub mod match_service;
/// Viewer count events derived from the connection registry.
pub mod presence;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection lifecycle for viewers.
pub mod websocket_service;

/// Run one store operation against the installed store, bounded by the configured timeout.
pub(crate) async fn call_store<T, F>(state: &SharedState, operation: F) -> Result<T, ServiceError>
where
    F: FnOnce(Arc<dyn MatchStore>) -> BoxFuture<'static, StorageResult<T>>,
{
    let store = state.require_match_store().await?;
    match timeout(state.config().store_timeout(), operation(store)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ServiceError::Timeout),
    }
}
