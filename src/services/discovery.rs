/// Multi-source discovery pipeline
///
/// Harvests recommendation candidates from four independent sources
/// (relationship-graph traversal, tag search driven by the taste profile,
/// social similarity, and the primary service's own recommendations) and
/// hands the combined pool to the aggregator. One dead source never aborts
/// the run; whatever the remaining sources produced is aggregated.
use crate::{
    error::AppResult,
    models::{
        normalized_name, ArtistRecord, RecommendationCandidate, RecommendationSource,
        ScoredRecommendation, TasteProfile,
    },
    services::{
        aggregator,
        providers::{ArtistGraph, ScrobbleNetwork, StreamingLibrary},
    },
};
use std::collections::HashSet;
use std::sync::Arc;

/// Genres from the profile driving the tag-search source
const TAG_SEARCH_GENRES: usize = 5;
/// Social-similarity results pulled per seed artist
const SOCIAL_RESULTS_PER_SEED: usize = 10;

pub struct DiscoveryEngine {
    library: Arc<dyn StreamingLibrary>,
    graph: Arc<dyn ArtistGraph>,
    scrobbles: Arc<dyn ScrobbleNetwork>,
    seed_sample_size: usize,
}

impl DiscoveryEngine {
    pub fn new(
        library: Arc<dyn StreamingLibrary>,
        graph: Arc<dyn ArtistGraph>,
        scrobbles: Arc<dyn ScrobbleNetwork>,
        seed_sample_size: usize,
    ) -> Self {
        Self {
            library,
            graph,
            scrobbles,
            seed_sample_size,
        }
    }

    /// Runs the full pipeline: harvest from every source, then aggregate
    /// under `threshold` and `limit`.
    ///
    /// The seed sample is the first N known artists, so a rerun over the
    /// same library produces the same recommendations.
    pub async fn discover(
        &self,
        known_artists: &[ArtistRecord],
        profile: &TasteProfile,
        threshold: f64,
        limit: usize,
    ) -> AppResult<Vec<ScoredRecommendation>> {
        let seeds = &known_artists[..known_artists.len().min(self.seed_sample_size)];

        let mut candidates: Vec<RecommendationCandidate> = Vec::new();

        self.harvest_graph(seeds, &mut candidates).await;
        self.harvest_social(seeds, &mut candidates).await;
        self.harvest_primary(seeds, &mut candidates).await;
        self.harvest_tag_search(profile, &mut candidates).await;

        tracing::info!(
            candidates = candidates.len(),
            seeds = seeds.len(),
            "Candidate harvest complete"
        );

        let known_names: HashSet<String> = known_artists
            .iter()
            .map(|a| normalized_name(&a.name))
            .collect();

        Ok(aggregator::aggregate(
            candidates,
            profile,
            &known_names,
            threshold,
            limit,
        ))
    }

    /// Relationship-graph traversal over the seed artists.
    async fn harvest_graph(
        &self,
        seeds: &[ArtistRecord],
        candidates: &mut Vec<RecommendationCandidate>,
    ) {
        for seed in seeds {
            match self.graph.related_artists(&seed.name).await {
                Ok(related) => candidates.extend(related),
                Err(e) => {
                    tracing::warn!(
                        source = self.graph.name(),
                        seed = %seed.name,
                        error = %e,
                        "Source failed for seed, continuing"
                    );
                }
            }
        }
    }

    /// Social-similarity lookups over the seed artists.
    async fn harvest_social(
        &self,
        seeds: &[ArtistRecord],
        candidates: &mut Vec<RecommendationCandidate>,
    ) {
        for seed in seeds {
            match self
                .scrobbles
                .similar_artists(&seed.name, SOCIAL_RESULTS_PER_SEED)
                .await
            {
                Ok(similar) => {
                    for hit in similar {
                        candidates.push(RecommendationCandidate {
                            artist_name: hit.name,
                            source: RecommendationSource::SocialSimilarity,
                            confidence: hit.score.unwrap_or(0.5).min(1.0),
                            reason: "Listeners overlap".to_string(),
                            seed_artist: seed.name.clone(),
                            external_id: hit.external_id,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        source = self.scrobbles.name(),
                        seed = %seed.name,
                        error = %e,
                        "Source failed for seed, continuing"
                    );
                }
            }
        }
    }

    /// The primary service's own recommendation endpoint.
    async fn harvest_primary(
        &self,
        seeds: &[ArtistRecord],
        candidates: &mut Vec<RecommendationCandidate>,
    ) {
        match self.library.recommendations(seeds).await {
            Ok(recs) => candidates.extend(recs),
            Err(e) => {
                tracing::warn!(
                    source = self.library.name(),
                    error = %e,
                    "Source failed, continuing"
                );
            }
        }
    }

    /// Tag search over the profile's dominant genres. Confidence scales
    /// with how dominant the genre is in the profile.
    async fn harvest_tag_search(
        &self,
        profile: &TasteProfile,
        candidates: &mut Vec<RecommendationCandidate>,
    ) {
        if profile.total_artist_count == 0 {
            return;
        }

        for (genre, count) in profile.genre_counts.most_common(TAG_SEARCH_GENRES) {
            let confidence =
                (0.6 + (count as f64 / profile.total_artist_count as f64) * 0.3).min(0.9);

            match self.graph.search_by_tag(&genre).await {
                Ok(hits) => {
                    for hit in hits {
                        candidates.push(RecommendationCandidate {
                            artist_name: hit.name,
                            source: RecommendationSource::TagSearch,
                            confidence,
                            reason: format!("Popular in your {} listening", genre),
                            seed_artist: genre.clone(),
                            external_id: hit.external_id,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        source = self.graph.name(),
                        genre = %genre,
                        error = %e,
                        "Source failed for genre, continuing"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::ArtistHit;
    use crate::services::providers::{
        MockArtistGraph, MockScrobbleNetwork, MockStreamingLibrary,
    };

    fn artist(name: &str, genres: &[&str]) -> ArtistRecord {
        ArtistRecord {
            id: name.to_lowercase(),
            name: name.to_string(),
            popularity: 50,
            followers: 1000,
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn social_hit(name: &str, score: f64) -> ArtistHit {
        ArtistHit {
            name: name.to_string(),
            score: Some(score),
            ..ArtistHit::default()
        }
    }

    fn graph_candidate(name: &str, seed: &str, confidence: f64) -> RecommendationCandidate {
        RecommendationCandidate {
            artist_name: name.to_string(),
            source: RecommendationSource::RelationshipGraph,
            confidence,
            reason: "Related: collaboration".to_string(),
            seed_artist: seed.to_string(),
            external_id: None,
        }
    }

    fn quiet_library() -> MockStreamingLibrary {
        let mut library = MockStreamingLibrary::new();
        library.expect_recommendations().returning(|_| Ok(Vec::new()));
        library.expect_name().return_const("streaming-library");
        library
    }

    fn quiet_graph() -> MockArtistGraph {
        let mut graph = MockArtistGraph::new();
        graph.expect_related_artists().returning(|_| Ok(Vec::new()));
        graph.expect_search_by_tag().returning(|_| Ok(Vec::new()));
        graph.expect_name().return_const("relationship-graph");
        graph
    }

    fn quiet_scrobbles() -> MockScrobbleNetwork {
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles
            .expect_similar_artists()
            .returning(|_, _| Ok(Vec::new()));
        scrobbles.expect_name().return_const("social-scrobbling");
        scrobbles
    }

    fn engine(
        library: MockStreamingLibrary,
        graph: MockArtistGraph,
        scrobbles: MockScrobbleNetwork,
    ) -> DiscoveryEngine {
        DiscoveryEngine::new(Arc::new(library), Arc::new(graph), Arc::new(scrobbles), 10)
    }

    #[tokio::test]
    async fn test_candidates_from_multiple_sources_merge() {
        let mut graph = MockArtistGraph::new();
        graph
            .expect_related_artists()
            .returning(|seed| Ok(vec![graph_candidate("Tortoise", seed, 0.8)]));
        graph.expect_search_by_tag().returning(|_| Ok(Vec::new()));
        graph.expect_name().return_const("relationship-graph");

        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles
            .expect_similar_artists()
            .returning(|_, _| Ok(vec![social_hit("Tortoise", 0.9)]));
        scrobbles.expect_name().return_const("social-scrobbling");

        let engine = engine(quiet_library(), graph, scrobbles);
        let known = vec![artist("Mogwai", &["post-rock"])];

        let result = engine
            .discover(&known, &TasteProfile::default(), 0.0, 10)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].recommendation_count, 2);
        assert_eq!(result[0].sources.len(), 2);
    }

    #[tokio::test]
    async fn test_known_artists_excluded_from_output() {
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles.expect_similar_artists().returning(|_, _| {
            Ok(vec![social_hit("Mogwai", 1.0), social_hit("Tortoise", 1.0)])
        });
        scrobbles.expect_name().return_const("social-scrobbling");

        let engine = engine(quiet_library(), quiet_graph(), scrobbles);
        let known = vec![artist("Mogwai", &[])];

        let result = engine
            .discover(&known, &TasteProfile::default(), 0.0, 10)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].candidate.artist_name, "Tortoise");
    }

    #[tokio::test]
    async fn test_one_failed_source_never_aborts() {
        let mut graph = MockArtistGraph::new();
        graph.expect_related_artists().returning(|_| {
            Err(AppError::source_unavailable("relationship-graph", "down"))
        });
        graph
            .expect_search_by_tag()
            .returning(|_| Err(AppError::source_unavailable("relationship-graph", "down")));
        graph.expect_name().return_const("relationship-graph");

        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles
            .expect_similar_artists()
            .returning(|_, _| Ok(vec![social_hit("Survivor", 0.9)]));
        scrobbles.expect_name().return_const("social-scrobbling");

        let engine = engine(quiet_library(), graph, scrobbles);
        let known = vec![artist("Mogwai", &["post-rock"])];
        let mut profile = TasteProfile::default();
        profile.total_artist_count = 1;
        profile.genre_counts.bump("post-rock");

        let result = engine.discover(&known, &profile, 0.0, 10).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].candidate.artist_name, "Survivor");
    }

    #[tokio::test]
    async fn test_tag_search_confidence_scales_with_genre_share() {
        let mut graph = MockArtistGraph::new();
        graph.expect_related_artists().returning(|_| Ok(Vec::new()));
        graph.expect_search_by_tag().returning(|_| {
            Ok(vec![ArtistHit {
                name: "Tagged Artist".to_string(),
                ..ArtistHit::default()
            }])
        });
        graph.expect_name().return_const("relationship-graph");

        let engine = engine(quiet_library(), graph, quiet_scrobbles());
        let known = vec![artist("Mogwai", &[])];

        // 1 of 2 artists in the dominant genre: 0.6 + 0.5*0.3 = 0.75
        let mut profile = TasteProfile::default();
        profile.total_artist_count = 2;
        profile.genre_counts.bump("post-rock");

        let result = engine.discover(&known, &profile, 0.0, 10).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!((result[0].candidate.confidence - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_library_yields_empty_output() {
        let mut library = MockStreamingLibrary::new();
        library
            .expect_recommendations()
            .returning(|_| Ok(Vec::new()));
        library.expect_name().return_const("streaming-library");

        let engine = engine(library, quiet_graph(), quiet_scrobbles());
        let result = engine
            .discover(&[], &TasteProfile::default(), 0.5, 10)
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
