pub mod movies;
pub mod postgres;
pub mod redis;
pub mod users;
pub mod watchlist;

pub use movies::{MovieCache, PgMovieCache};
pub use postgres::{create_pool, run_migrations};
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
pub use users::{PgUserStore, UserStore};
pub use watchlist::{PgWatchlistStore, WatchlistStore};
