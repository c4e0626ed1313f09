//! Health check response.

use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Matches with at least one connected viewer.
    pub watched_matches: usize,
    /// Viewer sessions currently subscribed to a match.
    pub viewers: usize,
}

impl HealthResponse {
    /// Build a response from the storage state and the live presence totals.
    pub fn new(degraded: bool, watched_matches: usize, viewers: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            watched_matches,
            viewers,
        }
    }
}
