//! Health reporting.

use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage health together with the live presence totals.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_match_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let registry = state.live().registry();
    HealthResponse::new(
        state.is_degraded().await,
        registry.watched_matches(),
        registry.total_viewers(),
    )
}
