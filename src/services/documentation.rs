//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Live Match Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::matches::list_matches,
        crate::routes::matches::list_live_matches,
        crate::routes::matches::get_match,
        crate::routes::matches::viewer_count,
        crate::routes::matches::create_match,
        crate::routes::matches::change_status,
        crate::routes::matches::create_poll,
        crate::routes::matches::add_commentary,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::MatchSnapshot,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::StatusChangeRequest,
            crate::dto::matches::CreatePollRequest,
            crate::dto::matches::AddCommentaryRequest,
            crate::dto::matches::ViewerCountResponse,
            crate::dto::ws::ViewerInboundMessage,
            crate::dto::ws::ViewerOutboundMessage,
            crate::dao::models::Sport,
            crate::dao::models::MatchStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Read access to live matches"),
        (name = "admin", description = "Match management, guarded by the X-Admin-Token header"),
        (name = "viewers", description = "WebSocket protocol for live match viewers"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/ws",
            "/matches",
            "/matches/live",
            "/matches/{id}",
            "/matches/{id}/viewers",
            "/matches/{id}/status",
            "/matches/{id}/polls",
            "/matches/{id}/commentary",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
