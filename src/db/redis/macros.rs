/// Cache-first wrapper around a collaborator call.
///
/// Looks the key up first; on a miss, awaits the block, queues the result
/// for a background cache write, and returns it. The block's value must be
/// serde-serializable.
///
/// # Example
/// ```rust,ignore
/// let similar: Vec<ArtistHit> = cached!(
///     self.cache,
///     CacheKey::SocialSimilarArtists(name.to_string()),
///     CACHE_TTL,
///     async move { self.fetch_similar(name).await }
/// )?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok::<_, $crate::error::AppError>(cached)
        } else {
            let result: $crate::error::AppResult<_> = $block.await;
            let value = result?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok::<_, $crate::error::AppError>(value)
        }
    }};
}
