/// Relationship/tag graph service client
///
/// Search and relationship traversal over a canonical artist database:
/// name/tag/country queries, artist lookup with relations, and the
/// related-artist derivation that feeds the recommendation pipeline and
/// the chain explorer. Relationship hits carry higher confidence than
/// shared-tag hits; the two scales are this source's own convention.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{normalized_name, ArtistHit, RecommendationCandidate, RecommendationSource},
    services::providers::{ArtistDetails, ArtistGraph},
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const GRAPH_CACHE_TTL: u64 = 604_800; // 1 week
const SEARCH_LIMIT: usize = 5;
const TAG_SEARCH_LIMIT: usize = 10;
const COUNTRY_SEARCH_LIMIT: usize = 25;
const RELATED_LIMIT: usize = 20;
const MAX_RETRY_AFTER_SECS: u64 = 10;

/// Confidence for artists linked by an explicit graph relationship
const RELATIONSHIP_CONFIDENCE: f64 = 0.8;
/// Confidence for artists found through a shared tag
const TAG_CONFIDENCE: f64 = 0.6;

/// Relationship types that indicate musical kinship rather than legal or
/// administrative links
const KINSHIP_RELATIONS: [&str; 3] = ["member of band", "collaboration", "is person"];

const USER_AGENT: &str = concat!("encore-api/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct MusicBrainzClient {
    http_client: HttpClient,
    api_url: String,
    cache: Cache,
    call_delay: Duration,
}

// Wire types

#[derive(Debug, Deserialize)]
struct ArtistSearchPage {
    #[serde(default)]
    artists: Vec<WireArtist>,
}

#[derive(Debug, Deserialize)]
struct WireArtist {
    id: String,
    name: String,
    #[serde(default, rename = "type")]
    artist_type: Option<String>,
    #[serde(default)]
    score: Option<u32>,
    #[serde(default)]
    area: Option<WireArea>,
    #[serde(default, rename = "life-span")]
    life_span: Option<WireLifeSpan>,
    #[serde(default)]
    tags: Vec<WireTag>,
}

#[derive(Debug, Deserialize)]
struct WireArea {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLifeSpan {
    #[serde(default)]
    begin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireLookup {
    id: String,
    #[serde(default, rename = "type")]
    artist_type: Option<String>,
    #[serde(default)]
    area: Option<WireArea>,
    #[serde(default, rename = "life-span")]
    life_span: Option<WireLifeSpan>,
    #[serde(default)]
    tags: Vec<WireTag>,
    #[serde(default)]
    relations: Vec<WireRelation>,
}

#[derive(Debug, Deserialize)]
struct WireRelation {
    #[serde(rename = "type")]
    relation_type: String,
    #[serde(default)]
    artist: Option<WireRelatedArtist>,
}

#[derive(Debug, Deserialize)]
struct WireRelatedArtist {
    id: String,
    name: String,
}

impl From<WireArtist> for ArtistHit {
    fn from(artist: WireArtist) -> Self {
        ArtistHit {
            name: artist.name,
            external_id: Some(artist.id),
            country: artist.area.and_then(|a| a.name),
            begin_date: artist.life_span.and_then(|l| l.begin),
            artist_type: artist.artist_type,
            tags: artist.tags.into_iter().map(|t| t.name).collect(),
            // Search relevance arrives as 0-100
            score: artist.score.map(|s| s as f64 / 100.0),
            listeners: None,
        }
    }
}

impl MusicBrainzClient {
    pub fn new(cache: Cache, api_url: String, call_delay_ms: u64) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            cache,
            call_delay: Duration::from_millis(call_delay_ms),
        }
    }

    /// One GET with the mandated pre-call pause and a single bounded
    /// rate-limit retry.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        tokio::time::sleep(self.call_delay).await;

        let mut response = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
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
                .header(reqwest::header::USER_AGENT, USER_AGENT)
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

    async fn search(&self, lucene_query: String, limit: usize) -> AppResult<Vec<ArtistHit>> {
        let url = format!("{}/artist", self.api_url);
        let query = [
            ("query", lucene_query),
            ("limit", limit.to_string()),
            ("fmt", "json".to_string()),
        ];

        let page: ArtistSearchPage = self.get_json(&url, &query).await?;
        let mut hits: Vec<ArtistHit> = page.artists.into_iter().map(ArtistHit::from).collect();
        // Best search relevance first
        hits.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        });
        Ok(hits)
    }

    async fn lookup(&self, external_id: &str) -> AppResult<Option<ArtistDetails>> {
        let cache_key = CacheKey::GraphArtistLookup(external_id.to_string());
        cached!(self.cache, cache_key, GRAPH_CACHE_TTL, async move {
            let url = format!("{}/artist/{}", self.api_url, external_id);
            let query = [
                ("inc", "artist-rels+tags".to_string()),
                ("fmt", "json".to_string()),
            ];

            let lookup: WireLookup = self.get_json(&url, &query).await?;
            Ok(Some(ArtistDetails {
                external_id: Some(lookup.id),
                country: lookup.area.and_then(|a| a.name),
                begin_date: lookup.life_span.and_then(|l| l.begin),
                artist_type: lookup.artist_type,
                tags: lookup.tags.into_iter().map(|t| t.name).collect(),
            }))
        })
    }

    /// Full lookup including relations, uncached at this layer because the
    /// related-artist derivation caches its own final shape.
    async fn lookup_with_relations(&self, external_id: &str) -> AppResult<WireLookup> {
        let url = format!("{}/artist/{}", self.api_url, external_id);
        let query = [
            ("inc", "artist-rels+tags".to_string()),
            ("fmt", "json".to_string()),
        ];
        self.get_json(&url, &query).await
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

/// Escapes the quote characters Lucene treats specially in a phrase query.
fn quoted(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\\\""))
}

#[async_trait::async_trait]
impl ArtistGraph for MusicBrainzClient {
    async fn search_artist(&self, name: &str) -> AppResult<Vec<ArtistHit>> {
        let cache_key = CacheKey::GraphArtistSearch(name.to_string());
        cached!(self.cache, cache_key, GRAPH_CACHE_TTL, async move {
            let hits = self
                .search(format!("artist:{}", quoted(name)), SEARCH_LIMIT)
                .await?;
            tracing::debug!(name = %name, results = hits.len(), "Graph artist search");
            Ok(hits)
        })
    }

    async fn search_by_tag(&self, tag: &str) -> AppResult<Vec<ArtistHit>> {
        let cache_key = CacheKey::GraphTagArtists(tag.to_string());
        cached!(self.cache, cache_key, GRAPH_CACHE_TTL, async move {
            let hits = self
                .search(format!("tag:{}", quoted(tag)), TAG_SEARCH_LIMIT)
                .await?;
            tracing::debug!(tag = %tag, results = hits.len(), "Graph tag search");
            Ok(hits)
        })
    }

    async fn search_by_country(&self, country: &str) -> AppResult<Vec<ArtistHit>> {
        let cache_key = CacheKey::GraphCountryArtists(country.to_string());
        cached!(self.cache, cache_key, GRAPH_CACHE_TTL, async move {
            let hits = self
                .search(format!("area:{}", quoted(country)), COUNTRY_SEARCH_LIMIT)
                .await?;
            tracing::debug!(country = %country, results = hits.len(), "Graph country search");
            Ok(hits)
        })
    }

    async fn related_artists(&self, name: &str) -> AppResult<Vec<RecommendationCandidate>> {
        let cache_key = CacheKey::GraphRelatedArtists(name.to_string());
        cached!(self.cache, cache_key, GRAPH_CACHE_TTL, async move {
            let matches = self
                .search(format!("artist:{}", quoted(name)), 1)
                .await?;
            let best = match matches.into_iter().next() {
                Some(hit) => hit,
                None => return Ok(Vec::new()),
            };
            let external_id = match best.external_id {
                Some(id) => id,
                None => return Ok(Vec::new()),
            };

            let lookup = self.lookup_with_relations(&external_id).await?;

            let mut candidates = Vec::new();

            for relation in &lookup.relations {
                if !KINSHIP_RELATIONS.contains(&relation.relation_type.as_str()) {
                    continue;
                }
                if let Some(related) = &relation.artist {
                    candidates.push(RecommendationCandidate {
                        artist_name: related.name.clone(),
                        source: RecommendationSource::RelationshipGraph,
                        confidence: RELATIONSHIP_CONFIDENCE,
                        reason: format!("Related: {}", relation.relation_type),
                        seed_artist: name.to_string(),
                        external_id: Some(related.id.clone()),
                    });
                }
            }

            // Top tags widen the net beyond explicit relations.
            for tag in lookup.tags.iter().take(3) {
                let tag_hits = self
                    .search(format!("tag:{}", quoted(&tag.name)), SEARCH_LIMIT)
                    .await?;
                for hit in tag_hits {
                    if normalized_name(&hit.name) == normalized_name(name) {
                        continue;
                    }
                    candidates.push(RecommendationCandidate {
                        artist_name: hit.name,
                        source: RecommendationSource::RelationshipGraph,
                        confidence: TAG_CONFIDENCE,
                        reason: format!("Similar tag: {}", tag.name),
                        seed_artist: name.to_string(),
                        external_id: hit.external_id,
                    });
                }
            }

            // First mention wins, then strongest signal first.
            let mut seen = HashSet::new();
            candidates.retain(|c| seen.insert(normalized_name(&c.artist_name)));
            candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            candidates.truncate(RELATED_LIMIT);

            tracing::debug!(
                seed = %name,
                candidates = candidates.len(),
                "Graph related artists derived"
            );
            Ok(candidates)
        })
    }

    async fn enrich(&self, name: &str) -> AppResult<Option<ArtistDetails>> {
        let matches = self.search_artist(name).await?;
        let best = match matches.into_iter().next() {
            Some(hit) => hit,
            None => return Ok(None),
        };

        match best.external_id {
            Some(id) => self.lookup(&id).await,
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "relationship-graph"
    }
}
