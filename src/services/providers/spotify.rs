/// Primary streaming service client
///
/// Fetches the user's library and listening signal: followed artists
/// (cursor-paginated), top artists per listening window, the
/// recently-played feed, and the service's native seed-artist
/// recommendations. Every fetch is cache-first; a mandated pause precedes
/// each network call, and a single bounded retry handles rate limiting.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        ArtistRecord, CachedArtist, PlayEvent, RecommendationCandidate, RecommendationSource,
        TimeWindow,
    },
    services::providers::StreamingLibrary,
};
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;

const LIBRARY_CACHE_TTL: u64 = 86_400; // 24 hours
const RECS_CACHE_TTL: u64 = 3_600; // 1 hour
const PAGE_SIZE: usize = 50;
const MAX_RETRY_AFTER_SECS: u64 = 10;

/// Confidence assigned to every native recommendation; the service exposes
/// no per-item signal.
const PRIMARY_CONFIDENCE: f64 = 0.7;

#[derive(Clone)]
pub struct SpotifyClient {
    http_client: HttpClient,
    api_url: String,
    token: String,
    cache: Cache,
    call_delay: Duration,
}

// Wire types

#[derive(Debug, Deserialize)]
struct ApiArtist {
    id: String,
    name: String,
    #[serde(default)]
    popularity: u8,
    #[serde(default)]
    followers: ApiFollowers,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiFollowers {
    #[serde(default)]
    total: u64,
}

impl From<ApiArtist> for ArtistRecord {
    fn from(artist: ApiArtist) -> Self {
        ArtistRecord {
            id: artist.id,
            name: artist.name,
            popularity: artist.popularity,
            followers: artist.followers.total,
            genres: artist.genres,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FollowedPage {
    artists: FollowedCursorPage,
}

#[derive(Debug, Deserialize)]
struct FollowedCursorPage {
    items: Vec<ApiArtist>,
    #[serde(default)]
    cursors: Option<FollowedCursors>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowedCursors {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopArtistsPage {
    items: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct RecentlyPlayedPage {
    items: Vec<ApiPlayItem>,
}

#[derive(Debug, Deserialize)]
struct ApiPlayItem {
    track: ApiTrack,
    played_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: String,
    name: String,
    artists: Vec<ApiTrackArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiTrackArtist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationsPage {
    tracks: Vec<ApiTrack>,
}

impl From<ApiPlayItem> for PlayEvent {
    fn from(item: ApiPlayItem) -> Self {
        PlayEvent {
            track_id: item.track.id,
            track_name: item.track.name,
            artist_ids: item.track.artists.iter().map(|a| a.id.clone()).collect(),
            artist_names: item.track.artists.into_iter().map(|a| a.name).collect(),
            played_at: item.played_at,
        }
    }
}

impl SpotifyClient {
    pub fn new(cache: Cache, api_url: String, token: String, call_delay_ms: u64) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            token,
            cache,
            call_delay: Duration::from_millis(call_delay_ms),
        }
    }

    /// One GET against the service with the mandated pre-call pause and a
    /// single bounded rate-limit retry.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        tokio::time::sleep(self.call_delay).await;

        let mut response = self
            .http_client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after_secs(&response).unwrap_or(1);
            if wait > MAX_RETRY_AFTER_SECS {
                return Err(AppError::RateLimited {
                    source_name: self.name().to_string(),
                });
            }

            tracing::warn!(wait_secs = wait, "Rate limited, retrying once");
            tokio::time::sleep(Duration::from_secs(wait)).await;

            response = self
                .http_client
                .get(url)
                .bearer_auth(&self.token)
                .query(query)
                .send()
                .await?;
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::source_unavailable(
                self.name(),
                format!("status {}: {}", status, body),
            ));
        }

        Ok(response.json().await?)
    }

    async fn fetch_followed(&self) -> AppResult<Vec<ArtistRecord>> {
        let url = format!("{}/me/following", self.api_url);
        let mut artists = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![
                ("type", "artist".to_string()),
                ("limit", PAGE_SIZE.to_string()),
            ];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page: FollowedPage = self.get_json(&url, &query).await?;
            artists.extend(page.artists.items.into_iter().map(ArtistRecord::from));

            if page.artists.next.is_none() {
                break;
            }
            after = page.artists.cursors.and_then(|c| c.after);
            if after.is_none() {
                break;
            }
        }

        tracing::info!(count = artists.len(), "Followed artists fetched");
        Ok(artists)
    }
}

/// Parses the Retry-After header when the service signals a transient limit.
fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[async_trait::async_trait]
impl StreamingLibrary for SpotifyClient {
    async fn followed_artists(&self) -> AppResult<Vec<ArtistRecord>> {
        cached!(
            self.cache,
            CacheKey::FollowedArtists,
            LIBRARY_CACHE_TTL,
            async move { self.fetch_followed().await }
        )
    }

    async fn followed_artists_raw(&self) -> AppResult<Vec<CachedArtist>> {
        // Same key as the typed read, but decoded shape-unchecked so a
        // damaged payload reaches the corruption guard instead of failing
        // deserialization here.
        if let Some(cached) = self
            .cache
            .get_from_cache::<Vec<CachedArtist>>(&CacheKey::FollowedArtists)
            .await?
        {
            return Ok(cached);
        }

        let fresh = self.fetch_followed().await?;
        self.cache
            .set_in_background(&CacheKey::FollowedArtists, &fresh, LIBRARY_CACHE_TTL);
        Ok(fresh.into_iter().map(CachedArtist::Record).collect())
    }

    async fn top_artists(&self, window: TimeWindow) -> AppResult<Vec<ArtistRecord>> {
        cached!(
            self.cache,
            CacheKey::TopArtists(window),
            LIBRARY_CACHE_TTL,
            async move {
                let url = format!("{}/me/top/artists", self.api_url);
                let query = [
                    ("time_range", window.as_str().to_string()),
                    ("limit", PAGE_SIZE.to_string()),
                ];

                let page: TopArtistsPage = self.get_json(&url, &query).await?;
                let artists: Vec<ArtistRecord> =
                    page.items.into_iter().map(ArtistRecord::from).collect();

                tracing::info!(window = %window, count = artists.len(), "Top artists fetched");
                Ok(artists)
            }
        )
    }

    async fn recently_played(&self) -> AppResult<Vec<PlayEvent>> {
        cached!(
            self.cache,
            CacheKey::RecentlyPlayed,
            LIBRARY_CACHE_TTL,
            async move {
                let url = format!("{}/me/player/recently-played", self.api_url);
                let query = [("limit", PAGE_SIZE.to_string())];

                let page: RecentlyPlayedPage = self.get_json(&url, &query).await?;
                let events: Vec<PlayEvent> =
                    page.items.into_iter().map(PlayEvent::from).collect();

                tracing::info!(count = events.len(), "Recently played fetched");
                Ok(events)
            }
        )
    }

    async fn recommendations(
        &self,
        seeds: &[ArtistRecord],
    ) -> AppResult<Vec<RecommendationCandidate>> {
        // The endpoint takes at most 5 seed artists.
        let seeds = &seeds[..seeds.len().min(5)];
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let seed_param = seeds
            .iter()
            .map(|a| a.id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let seed_names = seeds
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let cache_key = CacheKey::PrimaryRecommendations(seed_param.clone());

        cached!(
            self.cache,
            cache_key,
            RECS_CACHE_TTL,
            async move {
                let url = format!("{}/recommendations", self.api_url);
                let query = [
                    ("seed_artists", seed_param),
                    ("limit", PAGE_SIZE.to_string()),
                ];

                let page: RecommendationsPage = self.get_json(&url, &query).await?;

                let mut candidates = Vec::new();
                for track in page.tracks {
                    for artist in track.artists {
                        candidates.push(RecommendationCandidate {
                            artist_name: artist.name,
                            source: RecommendationSource::PrimaryRecommendation,
                            confidence: PRIMARY_CONFIDENCE,
                            reason: format!("Recommended via track '{}'", track.name),
                            seed_artist: seed_names.clone(),
                            external_id: Some(artist.id),
                        });
                    }
                }

                tracing::info!(
                    seeds = seeds.len(),
                    candidates = candidates.len(),
                    "Primary recommendations fetched"
                );
                Ok(candidates)
            }
        )
    }

    async fn invalidate_followed(&self) -> AppResult<()> {
        self.cache.invalidate(&CacheKey::FollowedArtists).await
    }

    fn name(&self) -> &'static str {
        "streaming-library"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_artist_deserialization() {
        let json = r#"{
            "id": "4Z8W4fKeB5YxbusRsdQVPb",
            "name": "Radiohead",
            "popularity": 82,
            "followers": {"total": 11000000},
            "genres": ["art rock", "alternative rock"]
        }"#;

        let artist: ApiArtist = serde_json::from_str(json).unwrap();
        let record = ArtistRecord::from(artist);
        assert_eq!(record.id, "4Z8W4fKeB5YxbusRsdQVPb");
        assert_eq!(record.name, "Radiohead");
        assert_eq!(record.popularity, 82);
        assert_eq!(record.followers, 11_000_000);
        assert_eq!(record.genres.len(), 2);
    }

    #[test]
    fn test_api_artist_defaults_missing_fields() {
        let json = r#"{"id": "abc123", "name": "Unknown"}"#;

        let artist: ApiArtist = serde_json::from_str(json).unwrap();
        let record = ArtistRecord::from(artist);
        assert_eq!(record.popularity, 0);
        assert_eq!(record.followers, 0);
        assert!(record.genres.is_empty());
    }

    #[test]
    fn test_play_item_conversion() {
        let json = r#"{
            "track": {
                "id": "t1",
                "name": "Weird Fishes",
                "artists": [{"id": "a1", "name": "Radiohead"}]
            },
            "played_at": "2026-07-01T12:30:00Z"
        }"#;

        let item: ApiPlayItem = serde_json::from_str(json).unwrap();
        let event = PlayEvent::from(item);
        assert_eq!(event.track_name, "Weird Fishes");
        assert_eq!(event.artist_ids, vec!["a1"]);
        assert_eq!(event.artist_names, vec!["Radiohead"]);
    }

    #[test]
    fn test_followed_page_cursor_shape() {
        let json = r#"{
            "artists": {
                "items": [{"id": "a1", "name": "Mono"}],
                "cursors": {"after": "a1"},
                "next": "https://example/next"
            }
        }"#;

        let page: FollowedPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.artists.items.len(), 1);
        assert_eq!(page.artists.cursors.unwrap().after.unwrap(), "a1");
        assert!(page.artists.next.is_some());
    }
}
