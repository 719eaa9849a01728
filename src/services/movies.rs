use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{release_year, MovieDetails, MoviePage, MovieView, ProviderOffer, Session, Video},
    services::{
        providers::{MovieCatalog, StreamingProvider},
        watchlist::WatchlistService,
    },
};

const VIEW_CACHE_TTL: u64 = 600; // 10 minutes
const CAST_LIMIT: usize = 10;
const FALLBACK_POSTER: &str = "/images/film-stock.jpg";

/// Search and the assembled movie detail view
pub struct MovieViewService {
    catalog: Arc<dyn MovieCatalog>,
    streaming: Arc<dyn StreamingProvider>,
    watchlist: Arc<WatchlistService>,
    cache: Cache,
    image_url: String,
}

impl MovieViewService {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        streaming: Arc<dyn StreamingProvider>,
        watchlist: Arc<WatchlistService>,
        cache: Cache,
        image_url: String,
    ) -> Self {
        Self {
            catalog,
            streaming,
            watchlist,
            cache,
            image_url: image_url.trim_end_matches('/').to_string(),
        }
    }

    /// Keyword search against the catalog
    ///
    /// A blank query returns an empty page without calling out. Pages start at 1.
    pub async fn search(&self, query: &str, page: u32) -> AppResult<MoviePage> {
        self.catalog.search(query, page).await
    }

    /// Detail view of one movie as seen by `session`.
    ///
    /// Metadata, cast and streaming offers are the same for every viewer and are
    /// cached together. Watchlist membership changes with every toggle, so it is
    /// read from the store on each call and never cached.
    ///
    /// An unknown movie is `NotFound`. A failed availability lookup only empties
    /// the offers.
    pub async fn view(&self, external_id: &str, session: &Session) -> AppResult<MovieView> {
        let shared: AppResult<MovieView> = cached!(
            self.cache,
            CacheKey::MovieView(external_id.to_string()),
            VIEW_CACHE_TTL,
            async move {
                let (details, availability) = tokio::join!(
                    self.catalog.lookup(external_id),
                    self.streaming.fetch_availability(external_id),
                );

                let details = details?.ok_or_else(|| {
                    AppError::NotFound(format!("Movie {} not found", external_id))
                })?;

                let offers = match availability {
                    Ok(availability) => availability.offers,
                    Err(e) => {
                        tracing::warn!(
                            external_id = %external_id,
                            provider = self.streaming.name(),
                            error = %e,
                            "Streaming availability unavailable"
                        );
                        Vec::new()
                    }
                };

                Ok::<_, AppError>(self.build_view(details, offers))
            }
        );

        let mut view = shared?;
        view.is_on_watchlist = self.watchlist.status(session, external_id).await;
        view.is_authenticated = session.is_authenticated;
        Ok(view)
    }

    /// Viewer-independent view; membership fields start out false
    fn build_view(&self, details: MovieDetails, offers: Vec<ProviderOffer>) -> MovieView {
        let director = director_name(&details);
        let trailer_url = trailer_url(&details.videos);
        let poster_url = poster_url(&self.image_url, details.poster_path.as_deref());

        let mut cast = details.cast;
        cast.sort_by_key(|member| member.order);
        cast.truncate(CAST_LIMIT);

        MovieView {
            release_year: release_year(details.release_date.as_deref()),
            runtime_label: runtime_label(details.runtime),
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            id: details.id,
            title: details.title,
            director,
            overview: details.overview,
            poster_url,
            trailer_url,
            cast,
            offers,
            is_on_watchlist: false,
            is_authenticated: false,
        }
    }
}

/// First credited director, or "Unknown"
fn director_name(details: &MovieDetails) -> String {
    details
        .directing_crew()
        .next()
        .map(|member| member.name.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// "2h 15m"; nothing for a missing or zero runtime
fn runtime_label(runtime: Option<i32>) -> Option<String> {
    match runtime {
        Some(minutes) if minutes > 0 => Some(format!("{}h {}m", minutes / 60, minutes % 60)),
        _ => None,
    }
}

fn poster_url(image_url: &str, poster_path: Option<&str>) -> String {
    match poster_path {
        Some(path) if !path.is_empty() => format!("{}{}", image_url, path),
        _ => FALLBACK_POSTER.to_string(),
    }
}

/// YouTube trailer, official uploads first
fn trailer_url(videos: &[Video]) -> Option<String> {
    videos
        .iter()
        .filter(|v| v.site == "YouTube" && v.video_type == "Trailer")
        .max_by_key(|v| v.official)
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}
