//! REST routes for reading and managing matches.

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::MatchId,
    dto::matches::{
        AddCommentaryRequest, CreateMatchRequest, CreatePollRequest, ListMatchesQuery,
        MatchSnapshot, StatusChangeRequest, ViewerCountResponse,
    },
    error::AppError,
    services::match_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Public read endpoints plus the admin-only match management endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    let admin = Router::new()
        .route("/matches", post(create_match))
        .route("/matches/{id}/status", patch(change_status))
        .route("/matches/{id}/polls", post(create_poll))
        .route("/matches/{id}/commentary", post(add_commentary))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    Router::new()
        .route("/matches", get(list_matches))
        .route("/matches/live", get(list_live_matches))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/viewers", get(viewer_count))
        .merge(admin)
}

/// List all matches, newest start time first.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    params(ListMatchesQuery),
    responses(
        (status = 200, description = "Matches filtered by sport", body = [MatchSnapshot]),
        (status = 400, description = "Unknown sport"),
        (status = 503, description = "Match store unavailable")
    )
)]
pub async fn list_matches(
    State(state): State<SharedState>,
    Query(query): Query<ListMatchesQuery>,
) -> Result<Json<Vec<MatchSnapshot>>, AppError> {
    Ok(Json(match_service::list_matches(&state, query.sport).await?))
}

/// List matches currently being played.
#[utoipa::path(
    get,
    path = "/matches/live",
    tag = "matches",
    responses(
        (status = 200, description = "Live matches", body = [MatchSnapshot]),
        (status = 503, description = "Match store unavailable")
    )
)]
pub async fn list_live_matches(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchSnapshot>>, AppError> {
    Ok(Json(match_service::list_live_matches(&state).await?))
}

/// Retrieve the full snapshot of a match.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match snapshot", body = MatchSnapshot),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(match_service::get_match(&state, id).await?))
}

/// Number of viewers connected to a match.
#[utoipa::path(
    get,
    path = "/matches/{id}/viewers",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses((status = 200, description = "Current viewer count", body = ViewerCountResponse))
)]
pub async fn viewer_count(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
) -> Json<ViewerCountResponse> {
    Json(match_service::viewer_count(&state, id))
}

/// Schedule a new match.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match created", body = MatchSnapshot),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<(StatusCode, Json<MatchSnapshot>), AppError> {
    let snapshot = match_service::create_match(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Move a match forward in its lifecycle (scheduled, live, completed).
#[utoipa::path(
    patch,
    path = "/matches/{id}/status",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Identifier of the match")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = MatchSnapshot),
        (status = 404, description = "Unknown match"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn change_status(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
    Json(payload): Json<StatusChangeRequest>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(
        match_service::change_status(&state, id, payload.status).await?,
    ))
}

/// Attach a poll to a match.
#[utoipa::path(
    post,
    path = "/matches/{id}/polls",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Identifier of the match")),
    request_body = CreatePollRequest,
    responses(
        (status = 200, description = "Poll created", body = MatchSnapshot),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn create_poll(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
    Valid(Json(payload)): Valid<Json<CreatePollRequest>>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(match_service::create_poll(&state, id, payload).await?))
}

/// Append a commentary line to a match.
#[utoipa::path(
    post,
    path = "/matches/{id}/commentary",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Identifier of the match")),
    request_body = AddCommentaryRequest,
    responses(
        (status = 200, description = "Commentary recorded", body = MatchSnapshot),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn add_commentary(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
    Valid(Json(payload)): Valid<Json<AddCommentaryRequest>>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(
        match_service::add_commentary(&state, id, payload).await?,
    ))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let config = state.config();
    let Some(expected) = config.admin_token() else {
        return Err(AppError::ServiceUnavailable(
            "admin token not configured".into(),
        ));
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    if provided != expected {
        return Err(AppError::Unauthorized("invalid admin token".into()));
    }
    Ok(next.run(req).await)
}
