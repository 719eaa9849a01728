use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    db::{Cache, MovieCache, UserStore, WatchlistStore},
    middleware::{IdentityProvider, SessionResolver},
    services::{
        movies::MovieViewService,
        providers::{MovieCatalog, StreamingProvider},
        watchlist::WatchlistService,
    },
};

/// Everything the router needs, behind trait objects
pub struct Dependencies {
    pub catalog: Arc<dyn MovieCatalog>,
    pub streaming: Arc<dyn StreamingProvider>,
    pub movies: Arc<dyn MovieCache>,
    pub watchlist: Arc<dyn WatchlistStore>,
    pub users: Arc<dyn UserStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub cache: Cache,
    pub image_url: String,
    pub sign_in_url: String,
}

/// Shared application state
pub struct AppState {
    pub movies: MovieViewService,
    pub watchlist: Arc<WatchlistService>,
    pub sessions: SessionResolver,
}

impl AppState {
    pub fn new(deps: Dependencies) -> Self {
        let watchlist = Arc::new(WatchlistService::new(
            deps.catalog.clone(),
            deps.movies,
            deps.watchlist,
            deps.users,
            deps.cache.clone(),
        ));

        let movies = MovieViewService::new(
            deps.catalog,
            deps.streaming,
            watchlist.clone(),
            deps.cache,
            deps.image_url,
        );

        Self {
            movies,
            watchlist,
            sessions: SessionResolver::new(deps.identity, deps.sign_in_url),
        }
    }
}

impl FromRef<Arc<AppState>> for SessionResolver {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.sessions.clone()
    }
}
