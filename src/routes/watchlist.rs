use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::{MaybeSession, RequestId, RequireSession},
    models::{ToggleResult, WatchlistEntry},
    routes::{validate_movie_id, AppState},
};

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    /// What the caller's UI currently shows; informational only
    #[serde(default)]
    pub assumed_on_watchlist: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct WatchlistStatus {
    pub external_id: String,
    pub is_on_watchlist: bool,
}

/// Handler listing the caller's watchlist
pub async fn list(
    State(state): State<Arc<AppState>>,
    RequireSession(principal): RequireSession,
) -> AppResult<Json<Vec<WatchlistEntry>>> {
    let entries = state.watchlist.list(&principal).await?;
    Ok(Json(entries))
}

/// Handler for the read-only membership check; anonymous callers get `false`
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    MaybeSession(session): MaybeSession,
) -> AppResult<Json<WatchlistStatus>> {
    let id = validate_movie_id(&id)?;
    let is_on_watchlist = state.watchlist.status(&session, id).await;

    Ok(Json(WatchlistStatus {
        external_id: id.to_string(),
        is_on_watchlist,
    }))
}

/// Handler for the watchlist toggle
///
/// Always answers 200: failures are reported in the body as `success: false`.
pub async fn toggle(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    RequireSession(principal): RequireSession,
    Path(id): Path<String>,
    body: Option<Json<ToggleRequest>>,
) -> Json<ToggleResult> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let Ok(id) = validate_movie_id(&id) else {
        return Json(ToggleResult::failed("Movie id cannot be empty"));
    };

    tracing::info!(
        request_id = %request_id,
        user_id = %principal.id,
        external_id = %id,
        "Processing watchlist toggle"
    );

    let result = state
        .watchlist
        .toggle(&principal, id, request.assumed_on_watchlist)
        .await;

    Json(result)
}
