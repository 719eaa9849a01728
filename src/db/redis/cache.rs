use redis::AsyncCommands;
use redis::Client;
use std::collections::HashMap;
use std::fmt::Display;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    MovieSearch { query: String, page: u32 },
    MovieDetails(String),
    Availability { external_id: String, region: String },
    /// Viewer-independent part of the movie detail view
    MovieView(String),
    Watchlist(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::MovieSearch { query, page } => {
                write!(f, "search:{}:{}", query.trim().to_lowercase(), page)
            }
            CacheKey::MovieDetails(id) => write!(f, "movie:{}", id),
            CacheKey::Availability {
                external_id,
                region,
            } => write!(f, "avail:{}:{}", external_id, region.to_lowercase()),
            CacheKey::MovieView(external_id) => write!(f, "view:movie:{}", external_id),
            CacheKey::Watchlist(user_id) => write!(f, "watchlist:{}", user_id),
        }
    }
}

/// Creates a Redis client for caching
///
/// Only parses the URL; connections are opened per operation, so an
/// unreachable Redis surfaces as a cache error on first use, not at startup.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// How long a deletion keeps rejecting fills that were computed before it
const TOMBSTONE_HORIZON: Duration = Duration::from_secs(300);

/// Work for the background writer, applied strictly in queue order
#[derive(Debug)]
pub(crate) enum CacheCommand {
    Set {
        key: String,
        value: String,
        ttl: u64,
        /// When the value's computation started
        computed_since: Instant,
    },
    Delete {
        keys: Vec<String>,
        at: Instant,
    },
}

/// Last deletion time per key.
///
/// A fill whose computation started before the key was last deleted may hold
/// pre-invalidation data and is dropped instead of written.
#[derive(Debug, Default)]
struct Tombstones {
    deleted_at: HashMap<String, Instant>,
}

impl Tombstones {
    fn record(&mut self, keys: &[String], at: Instant) {
        self.deleted_at
            .retain(|_, deleted| at.saturating_duration_since(*deleted) < TOMBSTONE_HORIZON);
        for key in keys {
            self.deleted_at.insert(key.clone(), at);
        }
    }

    fn is_stale(&self, key: &str, computed_since: Instant) -> bool {
        self.deleted_at
            .get(key)
            .is_some_and(|deleted| computed_since <= *deleted)
    }
}

#[derive(Clone)]
struct CacheBackend {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheCommand>,
}

/// Cache handler for storing and retrieving data from Redis
///
/// Reads go straight to Redis. Writes and invalidations are queued to a single
/// background writer, so a delete always lands after every fill queued before
/// it, and fills computed before a delete are discarded.
///
/// A disabled cache (no Redis configured) misses on every read and drops every
/// write and invalidation.
#[derive(Clone)]
pub struct Cache {
    backend: Option<CacheBackend>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends the shutdown signal; the writer applies everything already queued
    /// before it stops. No-op for a disabled cache.
    pub async fn shutdown(self) {
        if let Some(tx) = self.shutdown_tx {
            let _ = tx.send(()).await;
            tracing::info!("Cache writer shutdown signal sent");
        }
    }
}

impl Cache {
    /// Creates a Redis-backed cache and spawns its background writer
    ///
    /// Must be called inside a Tokio runtime. Keep the returned handle and call
    /// [`CacheWriterHandle::shutdown`] on exit so queued writes are flushed.
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            backend: Some(CacheBackend {
                redis_client,
                write_tx,
            }),
        };

        let handle = CacheWriterHandle {
            shutdown_tx: Some(shutdown_tx),
        };

        (cache, handle)
    }

    /// Creates a cache that never stores anything
    pub fn disabled() -> (Self, CacheWriterHandle) {
        (
            Self { backend: None },
            CacheWriterHandle { shutdown_tx: None },
        )
    }

    /// A cache whose queued commands are handed to the caller instead of Redis
    #[cfg(test)]
    pub(crate) fn capturing() -> (Self, mpsc::UnboundedReceiver<CacheCommand>) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let redis_client =
            Client::open("redis://127.0.0.1:6379").expect("static redis url parses");
        (
            Self {
                backend: Some(CacheBackend {
                    redis_client,
                    write_tx,
                }),
            },
            write_rx,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheCommand>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");
        let mut tombstones = Tombstones::default();

        loop {
            tokio::select! {
                Some(command) = write_rx.recv() => {
                    Self::apply(&client, &mut tombstones, command).await;
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    // Drain without waiting: other Cache clones still hold senders
                    while let Ok(command) = write_rx.try_recv() {
                        Self::apply(&client, &mut tombstones, command).await;
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn apply(client: &Client, tombstones: &mut Tombstones, command: CacheCommand) {
        match command {
            CacheCommand::Set {
                key,
                value,
                ttl,
                computed_since,
            } => {
                if tombstones.is_stale(&key, computed_since) {
                    tracing::debug!(key = %key, "Dropped cache fill computed before invalidation");
                    return;
                }
                if let Err(e) = Self::write_to_redis(client, key, value, ttl).await {
                    tracing::error!(error = %e, "Failed to write to Redis cache");
                }
            }
            CacheCommand::Delete { keys, at } => {
                tombstones.record(&keys, at);
                match Self::delete_from_redis(client, &keys).await {
                    Ok(()) => tracing::debug!(keys = ?keys, "Cache keys invalidated"),
                    Err(e) => tracing::error!(error = %e, keys = ?keys, "Failed to invalidate Redis keys"),
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, key: String, value: String, ttl: u64) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl).await?;
        Ok(())
    }

    async fn delete_from_redis(client: &Client, keys: &[String]) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(keys.to_vec()).await?;
        Ok(())
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` when the key is absent or the cache is disabled. A value
    /// that no longer deserializes into `T` is reported as an `Internal` error
    /// rather than treated as a miss.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };

        let mut conn = backend.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Stores a value computed just now; see [`Cache::set_computed_since`]
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        self.set_computed_since(key, value, ttl, Instant::now());
    }

    /// Stores a value in the cache asynchronously without blocking
    ///
    /// The value is serialized here and queued for the background writer.
    /// `computed_since` is when the computation of `value` began: if `key` is
    /// invalidated after that instant the write is dropped, since the value may
    /// predate the change that caused the invalidation.
    pub fn set_computed_since<T: serde::Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: u64,
        computed_since: Instant,
    ) {
        if self.backend.is_none() {
            return;
        }

        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        self.enqueue(CacheCommand::Set {
            key: key.to_string(),
            value: json,
            ttl,
            computed_since,
        });
    }

    /// Queues deletion of the given keys
    ///
    /// The delete runs after every write queued before it, and fills that began
    /// before this call are discarded when they reach the writer.
    pub fn invalidate(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            return;
        }

        self.enqueue(CacheCommand::Delete {
            keys: keys.iter().map(ToString::to_string).collect(),
            at: Instant::now(),
        });
    }

    fn enqueue(&self, command: CacheCommand) {
        let Some(backend) = &self.backend else {
            return;
        };

        if let Err(e) = backend.write_tx.send(command) {
            tracing::error!(error = %e, "Failed to queue cache command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_movie_search() {
        let key = CacheKey::MovieSearch {
            query: " The Godfather ".to_string(),
            page: 2,
        };
        assert_eq!(key.to_string(), "search:the godfather:2");
    }

    #[test]
    fn test_cache_key_display_movie_details() {
        let key = CacheKey::MovieDetails("238".to_string());
        assert_eq!(key.to_string(), "movie:238");
    }

    #[test]
    fn test_cache_key_display_availability() {
        let key = CacheKey::Availability {
            external_id: "238".to_string(),
            region: "US".to_string(),
        };
        assert_eq!(key.to_string(), "avail:238:us");
    }

    #[test]
    fn test_cache_key_display_movie_view() {
        let key = CacheKey::MovieView("238".to_string());
        assert_eq!(key.to_string(), "view:movie:238");
    }

    #[test]
    fn test_cache_key_display_watchlist() {
        let key = CacheKey::Watchlist("kp_123".to_string());
        assert_eq!(key.to_string(), "watchlist:kp_123");
    }

    #[test]
    fn test_fill_started_before_delete_is_stale() {
        let mut tombstones = Tombstones::default();
        let key = "watchlist:kp_1".to_string();

        let started = Instant::now();
        let deleted = started + Duration::from_millis(10);
        tombstones.record(&[key.clone()], deleted);

        assert!(tombstones.is_stale(&key, started));
        assert!(!tombstones.is_stale(&key, deleted + Duration::from_millis(1)));
        assert!(!tombstones.is_stale("watchlist:kp_2", started));
    }

    #[test]
    fn test_old_tombstones_are_pruned() {
        let mut tombstones = Tombstones::default();
        let start = Instant::now();

        tombstones.record(&["a".to_string()], start);
        tombstones.record(&["b".to_string()], start + TOMBSTONE_HORIZON);

        assert!(!tombstones.deleted_at.contains_key("a"));
        assert!(tombstones.deleted_at.contains_key("b"));
    }

    #[tokio::test]
    async fn test_invalidate_is_queued_behind_earlier_fills() {
        let (cache, mut rx) = Cache::capturing();
        let key = CacheKey::Watchlist("kp_1".to_string());

        cache.set_in_background(&key, &vec!["238"], 60);
        cache.invalidate(&[key.clone()]);
        cache.invalidate(&[]);

        match rx.try_recv().unwrap() {
            CacheCommand::Set { key: k, .. } => assert_eq!(k, "watchlist:kp_1"),
            other => panic!("expected set, got {:?}", other),
        }
        match rx.try_recv().unwrap() {
            CacheCommand::Delete { keys, .. } => assert_eq!(keys, vec!["watchlist:kp_1"]),
            other => panic!("expected delete, got {:?}", other),
        }
        // Empty invalidations queue nothing
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disabled_cache_is_a_no_op() {
        let (cache, handle) = Cache::disabled();
        let key = CacheKey::MovieDetails("238".to_string());

        cache.set_in_background(&key, &vec!["value"], 60);
        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, None);

        cache.invalidate(&[key]);
        assert!(!cache.is_enabled());
        handle.shutdown().await;
    }

    fn live_cache() -> (Cache, CacheWriterHandle) {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Cache::new(create_redis_client(&redis_url).unwrap())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_set_in_background_then_invalidate() {
        let (cache, _handle) = live_cache();

        let key = CacheKey::Watchlist("test_invalidate".to_string());
        let value = vec!["238".to_string()];

        cache.set_in_background(&key, &value, 60);
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));

        cache.invalidate(&[key.clone()]);
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_fill_computed_before_invalidation_is_not_written() {
        let (cache, _handle) = live_cache();
        let key = CacheKey::MovieView("test_stale_fill".to_string());

        // A read started, then a toggle invalidated the key, then the read finished
        let started = Instant::now();
        cache.invalidate(&[key.clone()]);
        cache.set_computed_since(&key, &vec!["stale".to_string()], 60, started);
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, None);

        // A read started after the invalidation is cached normally
        cache.set_in_background(&key, &vec!["fresh".to_string()], 60);
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(vec!["fresh".to_string()]));

        cache.invalidate(&[key]);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_cache_writer_graceful_shutdown() {
        let (cache, handle) = live_cache();

        let key = CacheKey::MovieDetails("test_shutdown".to_string());
        let value = vec!["shutdown_test".to_string()];

        cache.set_in_background(&key, &value, 60);
        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));
    }
}
