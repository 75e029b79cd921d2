/// Social-scrobbling network client
///
/// Crowd-sourced similarity and tag charts: similar artists with a match
/// score, top artists per tag, and the related-genre heuristic over the
/// network's global tag chart. The service reports numbers as JSON strings,
/// so the wire types parse both forms.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::ArtistHit,
    services::providers::ScrobbleNetwork,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

const SOCIAL_CACHE_TTL: u64 = 604_800; // 1 week
const TOP_TAGS_FETCH_LIMIT: usize = 500;
const MAX_RETRY_AFTER_SECS: u64 = 10;

#[derive(Clone)]
pub struct LastfmClient {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    cache: Cache,
    call_delay: Duration,
}

// Wire types. Numeric fields arrive as strings ("match": "0.85"), so both
// encodings are accepted.

fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Deserialize)]
struct SimilarArtistsPage {
    #[serde(rename = "similarartists")]
    similar_artists: SimilarArtistsBody,
}

#[derive(Debug, Deserialize)]
struct SimilarArtistsBody {
    #[serde(default)]
    artist: Vec<WireSimilarArtist>,
}

#[derive(Debug, Deserialize)]
struct WireSimilarArtist {
    name: String,
    #[serde(default)]
    mbid: Option<String>,
    #[serde(rename = "match", default, deserialize_with = "flexible_f64")]
    match_score: f64,
}

#[derive(Debug, Deserialize)]
struct TagArtistsPage {
    #[serde(rename = "topartists")]
    top_artists: TagArtistsBody,
}

#[derive(Debug, Deserialize)]
struct TagArtistsBody {
    #[serde(default)]
    artist: Vec<WireTagArtist>,
}

#[derive(Debug, Deserialize)]
struct WireTagArtist {
    name: String,
    #[serde(default)]
    mbid: Option<String>,
    #[serde(default, deserialize_with = "flexible_u64")]
    listeners: u64,
}

#[derive(Debug, Deserialize)]
struct TopTagsPage {
    tags: TopTagsBody,
}

#[derive(Debug, Deserialize)]
struct TopTagsBody {
    #[serde(default)]
    tag: Vec<WireTag>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct WireTag {
    name: String,
}

impl From<WireSimilarArtist> for ArtistHit {
    fn from(artist: WireSimilarArtist) -> Self {
        ArtistHit {
            name: artist.name,
            external_id: artist.mbid.filter(|m| !m.is_empty()),
            score: Some(artist.match_score),
            ..ArtistHit::default()
        }
    }
}

impl From<WireTagArtist> for ArtistHit {
    fn from(artist: WireTagArtist) -> Self {
        ArtistHit {
            name: artist.name,
            external_id: artist.mbid.filter(|m| !m.is_empty()),
            listeners: Some(artist.listeners),
            ..ArtistHit::default()
        }
    }
}

impl LastfmClient {
    pub fn new(cache: Cache, api_url: String, api_key: String, call_delay_ms: u64) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            api_key,
            cache,
            call_delay: Duration::from_millis(call_delay_ms),
        }
    }

    /// One method call with the mandated pre-call pause and a single bounded
    /// rate-limit retry. The service signals errors inside 200 bodies, so
    /// the parsed value is shape-checked before typed decoding.
    async fn call_method<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let mut query = vec![
            ("method", method.to_string()),
            ("api_key", self.api_key.clone()),
            ("format", "json".to_string()),
        ];
        query.extend(params.iter().map(|(k, v)| (*k, v.clone())));

        tokio::time::sleep(self.call_delay).await;

        let mut response = self
            .http_client
            .get(&self.api_url)
            .query(&query)
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
                .get(&self.api_url)
                .query(&query)
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

        let body: serde_json::Value = response.json().await?;
        if let Some(message) = body.get("message").filter(|_| body.get("error").is_some()) {
            return Err(AppError::source_unavailable(
                self.name(),
                message.as_str().unwrap_or("unknown service error"),
            ));
        }

        serde_json::from_value(body).map_err(|e| {
            AppError::source_unavailable(self.name(), format!("unexpected response shape: {}", e))
        })
    }

    async fn top_tags(&self) -> AppResult<Vec<String>> {
        cached!(
            self.cache,
            CacheKey::SocialTopTags,
            SOCIAL_CACHE_TTL,
            async move {
                let params = [("limit", TOP_TAGS_FETCH_LIMIT.to_string())];
                let page: TopTagsPage = self.call_method("chart.gettoptags", &params).await?;
                let tags: Vec<String> = page.tags.tag.into_iter().map(|t| t.name).collect();
                tracing::debug!(count = tags.len(), "Top tags fetched");
                Ok(tags)
            }
        )
    }
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Word-overlap relatedness between a candidate tag and a known genre:
/// either side containing a whole word of the other counts.
fn tags_related(candidate: &str, known: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let known = known.to_lowercase();
    known.split_whitespace().any(|word| candidate.contains(word))
        || candidate.split_whitespace().any(|word| known.contains(word))
}

#[async_trait::async_trait]
impl ScrobbleNetwork for LastfmClient {
    async fn similar_artists(&self, name: &str, limit: usize) -> AppResult<Vec<ArtistHit>> {
        let cache_key = CacheKey::SocialSimilarArtists(name.to_string());
        let hits: Vec<ArtistHit> =
            cached!(self.cache, cache_key, SOCIAL_CACHE_TTL, async move {
                let params = [("artist", name.to_string()), ("limit", limit.to_string())];
                let page: SimilarArtistsPage =
                    self.call_method("artist.getsimilar", &params).await?;
                let hits: Vec<ArtistHit> = page
                    .similar_artists
                    .artist
                    .into_iter()
                    .map(ArtistHit::from)
                    .collect();
                tracing::debug!(name = %name, results = hits.len(), "Similar artists fetched");
                Ok(hits)
            })?;

        // A cache entry written under a larger limit can overshoot.
        Ok(hits.into_iter().take(limit).collect())
    }

    async fn top_artists_by_tag(&self, tag: &str, limit: usize) -> AppResult<Vec<ArtistHit>> {
        let cache_key = CacheKey::SocialTagArtists(tag.to_string());
        let hits: Vec<ArtistHit> =
            cached!(self.cache, cache_key, SOCIAL_CACHE_TTL, async move {
                let params = [("tag", tag.to_string()), ("limit", limit.to_string())];
                let page: TagArtistsPage =
                    self.call_method("tag.gettopartists", &params).await?;
                let hits: Vec<ArtistHit> = page
                    .top_artists
                    .artist
                    .into_iter()
                    .map(ArtistHit::from)
                    .collect();
                tracing::debug!(tag = %tag, results = hits.len(), "Tag artists fetched");
                Ok(hits)
            })?;

        Ok(hits.into_iter().take(limit).collect())
    }

    async fn related_genres(
        &self,
        known_genres: &[String],
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let all_tags = self.top_tags().await?;

        let known_set: Vec<String> = known_genres.iter().map(|g| g.to_lowercase()).collect();
        let mut related = Vec::new();

        for tag in all_tags {
            if known_set.contains(&tag.to_lowercase()) {
                continue;
            }
            if known_genres.iter().any(|known| tags_related(&tag, known)) {
                related.push(tag);
                if related.len() >= limit {
                    break;
                }
            }
        }

        tracing::debug!(
            known = known_genres.len(),
            related = related.len(),
            "Related genres derived"
        );
        Ok(related)
    }

    fn name(&self) -> &'static str {
        "social-scrobbling"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similar_artist_string_match_score() {
        let json = r#"{"name": "Mogwai", "mbid": "mbid-9", "match": "0.87"}"#;
        let artist: WireSimilarArtist = serde_json::from_str(json).unwrap();
        assert_eq!(artist.match_score, 0.87);

        let hit = ArtistHit::from(artist);
        assert_eq!(hit.score, Some(0.87));
        assert_eq!(hit.external_id.as_deref(), Some("mbid-9"));
    }

    #[test]
    fn test_similar_artist_numeric_match_score() {
        let json = r#"{"name": "Mogwai", "match": 0.5}"#;
        let artist: WireSimilarArtist = serde_json::from_str(json).unwrap();
        assert_eq!(artist.match_score, 0.5);
    }

    #[test]
    fn test_empty_mbid_dropped() {
        let json = r#"{"name": "Mogwai", "mbid": "", "match": "1"}"#;
        let hit = ArtistHit::from(serde_json::from_str::<WireSimilarArtist>(json).unwrap());
        assert_eq!(hit.external_id, None);
    }

    #[test]
    fn test_tag_artist_string_listeners() {
        let json = r#"{"name": "Boards of Canada", "listeners": "1204394"}"#;
        let artist: WireTagArtist = serde_json::from_str(json).unwrap();
        assert_eq!(artist.listeners, 1_204_394);
    }

    #[test]
    fn test_tags_related_word_overlap() {
        assert!(tags_related("post-rock", "rock"));
        assert!(tags_related("dream pop", "pop"));
        assert!(tags_related("rock", "indie rock"));
        assert!(!tags_related("hip hop", "ambient"));
    }
}
