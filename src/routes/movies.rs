use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::{MaybeSession, RequestId},
    models::{MoviePage, MovieView},
    routes::{validate_movie_id, AppState},
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: Option<u32>,
}

/// Handler for movie search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<MoviePage>> {
    let page = state
        .movies
        .search(&params.q, params.page.unwrap_or(1))
        .await?;
    Ok(Json(page))
}

/// Handler for the movie detail view
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    MaybeSession(session): MaybeSession,
) -> AppResult<Json<MovieView>> {
    let id = validate_movie_id(&id)?;

    tracing::debug!(
        request_id = %request_id,
        external_id = %id,
        authenticated = session.is_authenticated,
        "Rendering movie view"
    );

    let view = state.movies.view(id, &session).await?;
    Ok(Json(view))
}
