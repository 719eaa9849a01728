use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CachedMovie, WatchlistEntry},
};

/// Per-user watchlist membership, unique on (user, movie)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// All entries for one user, newest first
    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>>;

    /// Inserts one entry and returns its id.
    /// Fails with `ConstraintViolation` when the pair already exists.
    async fn add(&self, user_id: &str, movie_id: Uuid) -> AppResult<Uuid>;

    /// Deletes the matching entry.
    /// Fails with `ConstraintViolation` when nothing matched.
    async fn remove(&self, user_id: &str, movie_id: Uuid) -> AppResult<()>;

    async fn exists(&self, user_id: &str, movie_id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgWatchlistStore {
    pool: PgPool,
}

impl PgWatchlistStore {
    /// Creates the Postgres-backed watchlist store over a shared pool
    ///
    /// Uniqueness of (user, movie) is enforced by the schema, not by this type;
    /// duplicate adds surface as `ConstraintViolation`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WatchlistRow {
    entry_id: Uuid,
    user_id: String,
    entry_created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    movie: CachedMovie,
}

impl From<WatchlistRow> for WatchlistEntry {
    fn from(row: WatchlistRow) -> Self {
        WatchlistEntry {
            id: row.entry_id,
            user_id: row.user_id,
            movie: row.movie,
            created_at: row.entry_created_at,
        }
    }
}

#[async_trait]
impl WatchlistStore for PgWatchlistStore {
    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>> {
        let rows = sqlx::query_as::<_, WatchlistRow>(
            r#"
            SELECT w.id AS entry_id, w.user_id, w.created_at AS entry_created_at,
                   m.id, m.external_id, m.title, m.poster_path, m.overview,
                   m.release_date, m.runtime, m.genres, m.created_at
            FROM watchlist w
            JOIN movies m ON m.id = w.movie_id
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WatchlistEntry::from).collect())
    }

    async fn add(&self, user_id: &str, movie_id: Uuid) -> AppResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO watchlist (id, user_id, movie_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_write(e, "watchlist entry"))?;

        tracing::debug!(user_id = %user_id, movie_id = %movie_id, "Watchlist entry added");
        Ok(id)
    }

    async fn remove(&self, user_id: &str, movie_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM watchlist
            WHERE user_id = $1 AND movie_id = $2
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConstraintViolation(format!(
                "movie {} is not on the watchlist",
                movie_id
            )));
        }

        tracing::debug!(user_id = %user_id, movie_id = %movie_id, "Watchlist entry removed");
        Ok(())
    }

    async fn exists(&self, user_id: &str, movie_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM watchlist WHERE user_id = $1 AND movie_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
