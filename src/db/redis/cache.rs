use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::TimeWindow;

/// Lower-cases and strips punctuation so "Godspeed You! Black Emperor" and
/// "godspeed you black emperor" key the same entry.
fn slug(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Cache keys, one per collaborator operation kind.
///
/// Artist-keyed variants render through `slug` so the key is deterministic
/// across punctuation and casing variants of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    FollowedArtists,
    TopArtists(TimeWindow),
    RecentlyPlayed,
    PrimaryRecommendations(String),
    GraphArtistSearch(String),
    GraphArtistLookup(String),
    GraphRelatedArtists(String),
    GraphTagArtists(String),
    GraphCountryArtists(String),
    SocialSimilarArtists(String),
    SocialTagArtists(String),
    SocialTopTags,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::FollowedArtists => write!(f, "followed_artists"),
            CacheKey::TopArtists(window) => write!(f, "top_artists:{}", window),
            CacheKey::RecentlyPlayed => write!(f, "recently_played"),
            CacheKey::PrimaryRecommendations(seeds) => write!(f, "primary_recs:{}", slug(seeds)),
            CacheKey::GraphArtistSearch(name) => write!(f, "graph_search:{}", slug(name)),
            CacheKey::GraphArtistLookup(id) => write!(f, "graph_lookup:{}", id),
            CacheKey::GraphRelatedArtists(name) => write!(f, "graph_related:{}", slug(name)),
            CacheKey::GraphTagArtists(tag) => write!(f, "graph_tag:{}", slug(tag)),
            CacheKey::GraphCountryArtists(country) => write!(f, "graph_country:{}", slug(country)),
            CacheKey::SocialSimilarArtists(name) => write!(f, "social_similar:{}", slug(name)),
            CacheKey::SocialTagArtists(tag) => write!(f, "social_tag:{}", slug(tag)),
            CacheKey::SocialTopTags => write!(f, "social_top_tags"),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Cache handler for storing and retrieving collaborator responses.
///
/// Entries expire by elapsed time (Redis TTL), never by event; `invalidate`
/// exists for the one case that must force a refetch, the corruption abort.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush pending writes and stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache with a background write task so collaborator
    /// calls never block on Redis writes.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx })
    }

    /// Background task draining the write channel into Redis.
    ///
    /// On shutdown, flushes everything still queued before exiting.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::debug!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }
                    tracing::debug!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Retrieves and deserializes a cached value, `None` on miss.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::CacheCorruption(format!("{}: {}", key, e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Queues a cache write; returns immediately, the background task does
    /// the Redis call.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: format!("{}", key),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }

    /// Drops a cache entry so the next read refetches.
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(format!("{}", key)).await?;
        tracing::info!(key = %key, "Cache entry invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_strips_punctuation_and_case() {
        assert_eq!(
            slug("Godspeed You! Black Emperor"),
            "godspeed you black emperor"
        );
        assert_eq!(slug("  AC/DC "), "acdc");
    }

    #[test]
    fn test_cache_key_display_followed() {
        assert_eq!(format!("{}", CacheKey::FollowedArtists), "followed_artists");
    }

    #[test]
    fn test_cache_key_display_top_artists() {
        let key = CacheKey::TopArtists(TimeWindow::ShortTerm);
        assert_eq!(format!("{}", key), "top_artists:short_term");
    }

    #[test]
    fn test_cache_key_display_similar_normalizes() {
        let key = CacheKey::SocialSimilarArtists("Sigur Rós!".to_string());
        assert_eq!(format!("{}", key), "social_similar:sigur rós");
    }

    #[test]
    fn test_cache_key_display_equal_for_punctuation_variants() {
        let a = CacheKey::GraphRelatedArtists("Belle & Sebastian".to_string());
        let b = CacheKey::GraphRelatedArtists("belle  sebastian".to_string());
        // "&" is stripped, whitespace kept as typed
        assert_eq!(format!("{}", a), "graph_related:belle  sebastian");
        assert_eq!(format!("{}", a), format!("{}", b));
    }
}
