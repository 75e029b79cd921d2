/// External collaborator abstractions
///
/// The pipeline consumes three independent metadata services: the primary
/// streaming library, a relationship/tag graph, and a social-scrobbling
/// network. Each trait is implemented by a reqwest-backed client and, in
/// tests, by stubs/mocks, so every stage takes its collaborators as
/// injected handles rather than reaching for process-wide clients.
use crate::{
    error::AppResult,
    models::{
        ArtistHit, ArtistRecord, CachedArtist, PlayEvent, RecommendationCandidate, TimeWindow,
    },
};

pub mod lastfm;
pub mod musicbrainz;
pub mod spotify;

pub use lastfm::LastfmClient;
pub use musicbrainz::MusicBrainzClient;
pub use spotify::SpotifyClient;

/// Country/begin-date/type/tag metadata the graph service attaches to an
/// artist on lookup
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArtistDetails {
    pub external_id: Option<String>,
    pub country: Option<String>,
    pub begin_date: Option<String>,
    pub artist_type: Option<String>,
    pub tags: Vec<String>,
}

/// The primary streaming service: the user's own library and listening
/// signal, plus its native recommendation endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StreamingLibrary: Send + Sync {
    /// Every artist the user follows, cursor-paginated to exhaustion.
    async fn followed_artists(&self) -> AppResult<Vec<ArtistRecord>>;

    /// The followed-artist list as cached, shape-unchecked. The inactive
    /// scorer runs its corruption guard over this form.
    async fn followed_artists_raw(&self) -> AppResult<Vec<CachedArtist>>;

    /// Top artists for one listening window.
    async fn top_artists(&self, window: TimeWindow) -> AppResult<Vec<ArtistRecord>>;

    /// The recently-played feed.
    async fn recently_played(&self) -> AppResult<Vec<PlayEvent>>;

    /// The service's own recommendations for up to 5 seed artists,
    /// surfaced as candidates at the service's flat confidence.
    async fn recommendations(
        &self,
        seeds: &[ArtistRecord],
    ) -> AppResult<Vec<RecommendationCandidate>>;

    /// Drops the cached followed-artist list so the next read refetches.
    async fn invalidate_followed(&self) -> AppResult<()>;

    /// Collaborator name for logging
    fn name(&self) -> &'static str;
}

/// The relationship/tag graph service: search and relationship traversal
/// over a canonical artist database.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArtistGraph: Send + Sync {
    /// Name search, best match first.
    async fn search_artist(&self, name: &str) -> AppResult<Vec<ArtistHit>>;

    /// Artists sharing a tag.
    async fn search_by_tag(&self, tag: &str) -> AppResult<Vec<ArtistHit>>;

    /// Artists from a country.
    async fn search_by_country(&self, country: &str) -> AppResult<Vec<ArtistHit>>;

    /// Similar artists derived from graph relationships (members,
    /// collaborations) and shared tags, deduplicated, source-limited.
    async fn related_artists(&self, name: &str) -> AppResult<Vec<RecommendationCandidate>>;

    /// Country/begin-date/type/tags for a named artist, `None` when the
    /// graph has no match.
    async fn enrich(&self, name: &str) -> AppResult<Option<ArtistDetails>>;

    /// Collaborator name for logging
    fn name(&self) -> &'static str;
}

/// The social-scrobbling network: crowd-sourced similarity and tag charts.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ScrobbleNetwork: Send + Sync {
    /// Similar artists with a match score in [0,1], bounded to `limit`.
    async fn similar_artists(&self, name: &str, limit: usize) -> AppResult<Vec<ArtistHit>>;

    /// Top artists for a tag, rank order.
    async fn top_artists_by_tag(&self, tag: &str, limit: usize) -> AppResult<Vec<ArtistHit>>;

    /// Tags adjacent to the user's known genres, per the network's own
    /// tag chart.
    async fn related_genres(&self, known_genres: &[String], limit: usize)
        -> AppResult<Vec<String>>;

    /// Collaborator name for logging
    fn name(&self) -> &'static str;
}
