use sqlx::{postgres::PgPoolOptions, PgPool};

/// Creates a PostgreSQL connection pool
///
/// Connects eagerly, so a wrong `DATABASE_URL` fails at startup instead of on
/// the first request. `max_connections` bounds concurrent queries across all
/// stores sharing the pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded migrations under `migrations/`
///
/// Migrations are compiled into the binary and tracked in `_sqlx_migrations`;
/// already-applied ones are skipped, so this is safe on every start.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
