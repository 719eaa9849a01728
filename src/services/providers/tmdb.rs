//! TMDB provider
//!
//! Serves both catalog lookups/search and streaming availability from the TMDB
//! v3 API, authenticated with a read access token.
//!
//! API Flow:
//! 1. Search: /search/movie?query=..&page=..
//! 2. Details: /movie/{id}?append_to_response=credits,videos
//! 3. Availability: /movie/{id}/watch/providers → per-region provider lists

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        MovieDetails, MoviePage, StreamingAvailability, TmdbMovieDetails, TmdbSearchResponse,
        TmdbWatchProviders,
    },
    services::providers::{MovieCatalog, StreamingProvider},
};
use chrono::Utc;
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const DETAILS_CACHE_TTL: u64 = 86400; // 1 day
const AVAIL_CACHE_TTL: u64 = 86400; // 1 day

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    access_token: String,
    api_url: String,
    image_url: String,
    region: String,
    cache: Cache,
}

impl TmdbProvider {
    pub fn new(
        cache: Cache,
        access_token: String,
        api_url: String,
        image_url: String,
        region: String,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            access_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            image_url: image_url.trim_end_matches('/').to_string(),
            region: region.to_uppercase(),
            cache,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// GET a TMDB resource; `None` when TMDB answers 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<Option<T>> {
        let response = self
            .http_client
            .get(self.endpoint(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                path = %path,
                status = %status,
                body = %body,
                provider = "tmdb",
                "External API request failed"
            );
            return Err(AppError::ExternalApi(format!(
                "TMDB returned status {}: {}",
                status, body
            )));
        }

        Ok(Some(response.json().await?))
    }
}

/// TMDB ids are positive integers in canonical form.
///
/// TMDB resolves "0238" to movie 238, so a padded id would be cached under a
/// different key than the one callers look it up by. Only the canonical
/// spelling is accepted.
fn is_valid_tmdb_id(external_id: &str) -> bool {
    !external_id.is_empty()
        && !external_id.starts_with('0')
        && external_id.bytes().all(|b| b.is_ascii_digit())
}

#[async_trait::async_trait]
impl MovieCatalog for TmdbProvider {
    async fn lookup(&self, external_id: &str) -> AppResult<Option<MovieDetails>> {
        if !is_valid_tmdb_id(external_id) {
            tracing::debug!(external_id = %external_id, "Rejected malformed TMDB id");
            return Ok(None);
        }

        let key = CacheKey::MovieDetails(external_id.to_string());
        if let Some(details) = self.cache.get_from_cache::<MovieDetails>(&key).await? {
            return Ok(Some(details));
        }

        let raw: Option<TmdbMovieDetails> = self
            .get_json(
                &format!("movie/{}", external_id),
                &[("append_to_response", "credits,videos".to_string())],
            )
            .await?;

        let Some(raw) = raw else {
            tracing::info!(external_id = %external_id, provider = "tmdb", "Movie not found");
            return Ok(None);
        };

        let details = MovieDetails::from(raw);
        // Only hits are cached; a missing id may appear later
        self.cache.set_in_background(&key, &details, DETAILS_CACHE_TTL);

        tracing::info!(
            external_id = %external_id,
            title = %details.title,
            provider = "tmdb",
            "Movie details fetched"
        );

        Ok(Some(details))
    }

    async fn search(&self, query: &str, page: u32) -> AppResult<MoviePage> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(MoviePage::empty());
        }
        let page = page.max(1);

        cached!(
            self.cache,
            CacheKey::MovieSearch {
                query: query.to_string(),
                page,
            },
            SEARCH_CACHE_TTL,
            async move {
                let response: Option<TmdbSearchResponse> = self
                    .get_json(
                        "search/movie",
                        &[("query", query.to_string()), ("page", page.to_string())],
                    )
                    .await?;

                let results = response.map(MoviePage::from).unwrap_or_else(MoviePage::empty);

                tracing::info!(
                    query = %query,
                    page = page,
                    results = results.results.len(),
                    provider = "tmdb",
                    "Movie search completed"
                );

                Ok::<_, AppError>(results)
            }
        )
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

#[async_trait::async_trait]
impl StreamingProvider for TmdbProvider {
    async fn fetch_availability(&self, external_id: &str) -> AppResult<StreamingAvailability> {
        if !is_valid_tmdb_id(external_id) {
            return Err(AppError::InvalidInput(format!(
                "Invalid movie id: {}",
                external_id
            )));
        }

        cached!(
            self.cache,
            CacheKey::Availability {
                external_id: external_id.to_string(),
                region: self.region.clone(),
            },
            AVAIL_CACHE_TTL,
            async move {
                let response: Option<TmdbWatchProviders> = self
                    .get_json(&format!("movie/{}/watch/providers", external_id), &[])
                    .await?;

                let region = response
                    .and_then(|mut r| r.results.remove(&self.region))
                    .unwrap_or_default();
                let link = region.link.clone();

                let availability = StreamingAvailability {
                    external_id: external_id.to_string(),
                    region: self.region.clone(),
                    link,
                    offers: region.into_offers(&self.image_url),
                    cached_at: Utc::now(),
                };

                tracing::info!(
                    external_id = %external_id,
                    region = %self.region,
                    offers = availability.offers.len(),
                    provider = "tmdb",
                    "Availability fetched"
                );

                Ok::<_, AppError>(availability)
            }
        )
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
