//! External movie data sources
//!
//! The catalog answers "what is this movie" (lookup by id, keyword search); the
//! streaming provider answers "where can I watch it". Both sit behind traits so
//! the workflow and the HTTP layer never depend on a concrete vendor.

use crate::{
    error::AppResult,
    models::{MovieDetails, MoviePage, StreamingAvailability},
};

pub mod tmdb;

pub use tmdb::TmdbProvider;

/// Third-party movie metadata and search
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Full metadata for one movie, `None` when the catalog has no such id
    async fn lookup(&self, external_id: &str) -> AppResult<Option<MovieDetails>>;

    /// Keyword search. A blank query yields an empty page.
    async fn search(&self, query: &str, page: u32) -> AppResult<MoviePage>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Streaming availability lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Where the movie can be streamed, rented or bought in the configured region
    async fn fetch_availability(&self, external_id: &str) -> AppResult<StreamingAvailability>;

    fn name(&self) -> &'static str;
}
