use std::sync::Arc;

use cinelist_api::{
    config::Config,
    db::{
        create_pool, create_redis_client, run_migrations, Cache, PgMovieCache, PgUserStore,
        PgWatchlistStore,
    },
    middleware::HeaderIdentityProvider,
    routes::{create_router, AppState, Dependencies},
    services::TmdbProvider,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinelist_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let (cache, cache_handle) = match config.redis_url.as_deref() {
        Some(url) => {
            let client = create_redis_client(url)?;
            tracing::info!("Redis cache enabled");
            Cache::new(client)
        }
        None => {
            tracing::warn!("REDIS_URL not set, running without cache");
            Cache::disabled()
        }
    };

    let tmdb = Arc::new(TmdbProvider::new(
        cache.clone(),
        config.tmdb_access_token.clone(),
        config.tmdb_api_url.clone(),
        config.tmdb_image_url.clone(),
        config.watch_region.clone(),
    ));

    let identity =
        HeaderIdentityProvider::new(&config.auth_user_header, &config.auth_email_header)?;

    let state = Arc::new(AppState::new(Dependencies {
        catalog: tmdb.clone(),
        streaming: tmdb,
        movies: Arc::new(PgMovieCache::new(pool.clone())),
        watchlist: Arc::new(PgWatchlistStore::new(pool.clone())),
        users: Arc::new(PgUserStore::new(pool)),
        identity: Arc::new(identity),
        cache,
        image_url: config.tmdb_image_url.clone(),
        sign_in_url: config.sign_in_url.clone(),
    }));

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server running on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_handle.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
