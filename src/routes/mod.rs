use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

pub mod me;
pub mod movies;
pub mod state;
pub mod watchlist;

pub use state::{AppState, Dependencies};

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me::current_session))
        .route("/movies/search", get(movies::search))
        .route("/movies/:id", get(movies::detail))
        .route("/watchlist", get(watchlist::list))
        .route("/watchlist/:id", get(watchlist::status))
        .route("/watchlist/:id/toggle", post(watchlist::toggle))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Rejects blank path ids before they reach a provider
pub(crate) fn validate_movie_id(id: &str) -> crate::error::AppResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(crate::error::AppError::InvalidInput(
            "Movie id cannot be empty".to_string(),
        ));
    }
    Ok(id)
}
