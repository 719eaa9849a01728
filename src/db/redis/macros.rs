/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Returns the cached value for `$key` when present. Otherwise awaits `$block`,
/// queues the computed value for a background write with the given TTL (seconds)
/// and returns it. Errors from the cache read or from `$block` propagate with `?`,
/// so the enclosing function must return `AppResult`.
///
/// The fill is stamped with the instant the lookup began, so an invalidation of
/// `$key` that lands while `$block` is running discards the fill.
///
/// # Example
/// ```rust,ignore
/// let page: AppResult<MoviePage> = cached!(self.cache, CacheKey::MovieDetails(id.into()), 3600, async move {
///     self.fetch_page(id).await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        let computed_since = ::std::time::Instant::now();
        match $cache.get_from_cache(&key).await? {
            Some(cached) => {
                tracing::debug!(key = %key, "Cache hit");
                Ok(cached)
            }
            None => {
                let value = $block.await?;
                $cache.set_computed_since(&key, &value, $ttl, computed_since);
                Ok(value)
            }
        }
    }};
}
