use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CachedMovie, NewMovie},
};

/// Local cache of catalog movies, keyed by external catalog id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovieCache: Send + Sync {
    /// Point lookup by external catalog id
    async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<CachedMovie>>;

    /// Inserts a row with a freshly generated id.
    ///
    /// Fails with `ConstraintViolation` if the external id is already cached;
    /// two concurrent first-adds of the same movie race on this.
    async fn insert(&self, movie: NewMovie) -> AppResult<CachedMovie>;
}

#[derive(Clone)]
pub struct PgMovieCache {
    pool: PgPool,
}

impl PgMovieCache {
    /// Creates the Postgres-backed movie cache over a shared pool
    ///
    /// Rows are written once on first watchlist add and never updated.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovieCache for PgMovieCache {
    async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<CachedMovie>> {
        let movie = sqlx::query_as::<_, CachedMovie>(
            r#"
            SELECT id, external_id, title, poster_path, overview, release_date, runtime, genres, created_at
            FROM movies
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movie)
    }

    async fn insert(&self, movie: NewMovie) -> AppResult<CachedMovie> {
        let cached = sqlx::query_as::<_, CachedMovie>(
            r#"
            INSERT INTO movies (id, external_id, title, poster_path, overview, release_date, runtime, genres)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, external_id, title, poster_path, overview, release_date, runtime, genres, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&movie.external_id)
        .bind(&movie.title)
        .bind(&movie.poster_path)
        .bind(&movie.overview)
        .bind(&movie.release_date)
        .bind(movie.runtime)
        .bind(&movie.genres)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_write(e, "cached movie"))?;

        tracing::info!(
            external_id = %cached.external_id,
            movie_id = %cached.id,
            "Cached movie from catalog"
        );

        Ok(cached)
    }
}
