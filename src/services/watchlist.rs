use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey, MovieCache, UserStore, WatchlistStore},
    error::{AppError, AppResult},
    models::{Principal, Session, ToggleResult, WatchlistEntry},
    services::providers::MovieCatalog,
};

const WATCHLIST_CACHE_TTL: u64 = 300; // 5 minutes

/// Watchlist reads and the toggle workflow
///
/// The toggle is server-authoritative: membership is always re-read from the
/// store before deciding whether to add or remove. Each step is its own
/// autocommitted statement, so a failure part-way leaves earlier steps in place
/// (a cached movie can outlive a failed add).
pub struct WatchlistService {
    catalog: Arc<dyn MovieCatalog>,
    movies: Arc<dyn MovieCache>,
    watchlist: Arc<dyn WatchlistStore>,
    users: Arc<dyn UserStore>,
    cache: Cache,
}

impl WatchlistService {
    /// Creates the service over its stores and catalog
    ///
    /// `cache` backs the watchlist listing; pass `Cache::disabled()` to read the
    /// store every time.
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        movies: Arc<dyn MovieCache>,
        watchlist: Arc<dyn WatchlistStore>,
        users: Arc<dyn UserStore>,
        cache: Cache,
    ) -> Self {
        Self {
            catalog,
            movies,
            watchlist,
            users,
            cache,
        }
    }

    /// Flips the membership of `external_id` on the principal's watchlist.
    ///
    /// `assumed_on_watchlist` is the caller's last-known state. It is only
    /// compared against the store for diagnostics.
    ///
    /// Never returns an error: every failure becomes `success: false`.
    pub async fn toggle(
        &self,
        principal: &Principal,
        external_id: &str,
        assumed_on_watchlist: Option<bool>,
    ) -> ToggleResult {
        match self
            .try_toggle(principal, external_id, assumed_on_watchlist)
            .await
        {
            Ok(result) => {
                tracing::info!(
                    user_id = %principal.id,
                    external_id = %external_id,
                    is_on_watchlist = ?result.is_on_watchlist,
                    "Watchlist toggled"
                );
                self.invalidate_for(principal);
                result
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %principal.id,
                    external_id = %external_id,
                    error = %e,
                    "Watchlist toggle failed"
                );
                ToggleResult::failed(e)
            }
        }
    }

    async fn try_toggle(
        &self,
        principal: &Principal,
        external_id: &str,
        assumed_on_watchlist: Option<bool>,
    ) -> AppResult<ToggleResult> {
        let user = self.users.ensure(principal).await?;

        let Some(movie) = self.movies.get_by_external_id(external_id).await? else {
            let details = self
                .catalog
                .lookup(external_id)
                .await
                .map_err(|e| AppError::CatalogLookup(e.to_string()))?
                .ok_or_else(|| {
                    AppError::CatalogLookup(format!(
                        "{} has no movie with id {}",
                        self.catalog.name(),
                        external_id
                    ))
                })?;

            let movie = self.movies.insert(details.to_new_movie(external_id)).await?;
            let entry_id = self.watchlist.add(&user.id, movie.id).await?;
            return Ok(ToggleResult::added(entry_id));
        };

        let is_member = self.watchlist.exists(&user.id, movie.id).await?;

        if matches!(assumed_on_watchlist, Some(assumed) if assumed != is_member) {
            tracing::warn!(
                user_id = %user.id,
                external_id = %external_id,
                stored = is_member,
                "Client watchlist state is stale, using stored state"
            );
        }

        if is_member {
            self.watchlist.remove(&user.id, movie.id).await?;
            Ok(ToggleResult::removed())
        } else {
            let entry_id = self.watchlist.add(&user.id, movie.id).await?;
            Ok(ToggleResult::added(entry_id))
        }
    }

    /// Read-only membership check; never redirects and never fails.
    ///
    /// Anonymous sessions, uncached movies and store errors all read as `false`.
    pub async fn status(&self, session: &Session, external_id: &str) -> bool {
        let Some(user) = session.user.as_ref() else {
            return false;
        };

        let result = match self.movies.get_by_external_id(external_id).await {
            Ok(Some(movie)) => self.watchlist.exists(&user.id, movie.id).await,
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            tracing::error!(
                user_id = %user.id,
                external_id = %external_id,
                error = %e,
                "Error checking watchlist"
            );
            false
        })
    }

    /// The principal's watchlist, newest first
    ///
    /// Read through the cache for a few minutes; a successful toggle by the same
    /// principal invalidates it.
    pub async fn list(&self, principal: &Principal) -> AppResult<Vec<WatchlistEntry>> {
        cached!(
            self.cache,
            CacheKey::Watchlist(principal.id.clone()),
            WATCHLIST_CACHE_TTL,
            async move { self.watchlist.list_for_user(&principal.id).await }
        )
    }

    /// Drops the principal's cached watchlist after a membership change.
    ///
    /// Membership on the movie view is never cached, so the list is the only
    /// per-user entry a toggle can make stale.
    fn invalidate_for(&self, principal: &Principal) {
        self.cache
            .invalidate(&[CacheKey::Watchlist(principal.id.clone())]);
    }
}
