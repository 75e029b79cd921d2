/// Similarity-chain exploration
///
/// Breadth-first, depth-bounded traversal over the similarity graph the
/// social network and the relationship graph expose: similar artists of
/// similar artists, level by level. First discovery wins: an artist found
/// at level 1 keeps that level and provenance even if rediscovered deeper
/// or from another seed.
use crate::{
    error::AppResult,
    models::{normalized_name, SimilarityChainEntry},
    services::providers::{ArtistGraph, ScrobbleNetwork},
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct ChainExplorer {
    scrobbles: Arc<dyn ScrobbleNetwork>,
    graph: Arc<dyn ArtistGraph>,
}

impl ChainExplorer {
    pub fn new(scrobbles: Arc<dyn ScrobbleNetwork>, graph: Arc<dyn ArtistGraph>) -> Self {
        Self { scrobbles, graph }
    }

    /// Explores up to `depth` levels out from the seed artists.
    ///
    /// Each level expands every frontier artist not yet explored, querying
    /// both similarity collaborators; the social side is bounded to
    /// `per_artist_result_cap` results per query, the graph side keeps its
    /// own source limit. Names are enqueued for the next level only below
    /// `depth - 1`; the next frontier is deduplicated and capped to
    /// `per_level_fanout_cap`. An empty frontier ends the walk early.
    ///
    /// A collaborator failure on one artist skips that artist's expansion;
    /// discoveries made so far are always kept.
    ///
    /// Output is ordered by discovery level, then score descending, and
    /// truncated to `overall_limit`.
    pub async fn explore(
        &self,
        seed_names: &[String],
        depth: usize,
        per_level_fanout_cap: usize,
        per_artist_result_cap: usize,
        overall_limit: usize,
    ) -> AppResult<Vec<SimilarityChainEntry>> {
        let mut explored: HashSet<String> = HashSet::new();
        let mut discovered: HashMap<String, SimilarityChainEntry> = HashMap::new();

        let mut frontier: Vec<String> = seed_names.to_vec();

        tracing::info!(
            seeds = seed_names.len(),
            depth,
            "Starting similarity-chain exploration"
        );

        for level in 0..depth {
            let mut next_frontier: Vec<String> = Vec::new();

            for artist in &frontier {
                let key = normalized_name(artist);
                if explored.contains(&key) {
                    continue;
                }
                explored.insert(key);

                self.expand_artist(
                    artist,
                    level,
                    depth,
                    per_artist_result_cap,
                    &explored,
                    &mut discovered,
                    &mut next_frontier,
                )
                .await;
            }

            tracing::debug!(
                level = level + 1,
                discovered = discovered.len(),
                next_frontier = next_frontier.len(),
                "Level complete"
            );

            // Deduplicate, then cap the fan-out for the next level.
            let mut seen = HashSet::new();
            next_frontier.retain(|name| seen.insert(normalized_name(name)));
            next_frontier.truncate(per_level_fanout_cap);

            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        let mut entries: Vec<SimilarityChainEntry> = discovered.into_values().collect();
        entries.sort_by(|a, b| {
            a.similarity_level
                .cmp(&b.similarity_level)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.artist_name.cmp(&b.artist_name))
        });
        entries.truncate(overall_limit);

        tracing::info!(results = entries.len(), "Exploration complete");
        Ok(entries)
    }

    /// Queries both similarity collaborators for one artist and records the
    /// unseen results. Failures are logged and skipped so one dead source
    /// never aborts a level.
    #[allow(clippy::too_many_arguments)]
    async fn expand_artist(
        &self,
        artist: &str,
        level: usize,
        depth: usize,
        per_artist_result_cap: usize,
        explored: &HashSet<String>,
        discovered: &mut HashMap<String, SimilarityChainEntry>,
        next_frontier: &mut Vec<String>,
    ) {
        match self
            .scrobbles
            .similar_artists(artist, per_artist_result_cap)
            .await
        {
            Ok(similar) => {
                for hit in similar {
                    let key = normalized_name(&hit.name);
                    if explored.contains(&key) {
                        continue;
                    }
                    if !discovered.contains_key(&key) {
                        discovered.insert(
                            key,
                            SimilarityChainEntry {
                                artist_name: hit.name.clone(),
                                source_chain: format!("{} ({})", artist, self.scrobbles.name()),
                                similarity_level: level + 1,
                                score: hit.score.unwrap_or(0.0),
                                external_id: hit.external_id,
                            },
                        );
                    }
                    if level < depth - 1 {
                        next_frontier.push(hit.name);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(artist = %artist, error = %e, "Social similarity query failed, skipping");
            }
        }

        match self.graph.related_artists(artist).await {
            Ok(related) => {
                for candidate in related {
                    let key = normalized_name(&candidate.artist_name);
                    if explored.contains(&key) {
                        continue;
                    }
                    if !discovered.contains_key(&key) {
                        discovered.insert(
                            key,
                            SimilarityChainEntry {
                                artist_name: candidate.artist_name.clone(),
                                source_chain: format!("{} ({})", artist, self.graph.name()),
                                similarity_level: level + 1,
                                score: candidate.confidence,
                                external_id: candidate.external_id,
                            },
                        );
                    }
                    if level < depth - 1 {
                        next_frontier.push(candidate.artist_name);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(artist = %artist, error = %e, "Graph similarity query failed, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistHit, RecommendationCandidate, RecommendationSource};
    use crate::services::providers::{MockArtistGraph, MockScrobbleNetwork};

    fn hit(name: &str, score: f64) -> ArtistHit {
        ArtistHit {
            name: name.to_string(),
            score: Some(score),
            ..ArtistHit::default()
        }
    }

    fn graph_candidate(name: &str, seed: &str) -> RecommendationCandidate {
        RecommendationCandidate {
            artist_name: name.to_string(),
            source: RecommendationSource::RelationshipGraph,
            confidence: 0.8,
            reason: "Related: member of band".to_string(),
            seed_artist: seed.to_string(),
            external_id: None,
        }
    }

    fn quiet_graph() -> MockArtistGraph {
        let mut graph = MockArtistGraph::new();
        graph.expect_related_artists().returning(|_| Ok(Vec::new()));
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

    fn explorer(scrobbles: MockScrobbleNetwork, graph: MockArtistGraph) -> ChainExplorer {
        ChainExplorer::new(Arc::new(scrobbles), Arc::new(graph))
    }

    #[tokio::test]
    async fn test_zero_depth_returns_nothing() {
        let explorer = explorer(quiet_scrobbles(), quiet_graph());
        let result = explorer
            .explore(&["Seed".to_string()], 0, 20, 10, 50)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_single_level_discovery() {
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles
            .expect_similar_artists()
            .returning(|seed, _| match seed {
                "Seed" => Ok(vec![hit("Alpha", 0.9), hit("Beta", 0.7)]),
                _ => Ok(Vec::new()),
            });
        scrobbles.expect_name().return_const("social-scrobbling");

        let explorer = explorer(scrobbles, quiet_graph());
        let result = explorer
            .explore(&["Seed".to_string()], 1, 20, 10, 50)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].artist_name, "Alpha");
        assert_eq!(result[0].similarity_level, 1);
        assert_eq!(result[0].source_chain, "Seed (social-scrobbling)");
        assert_eq!(result[1].artist_name, "Beta");
    }

    #[tokio::test]
    async fn test_first_discovery_wins() {
        // X is discoverable at level 1 from SeedA, and again at level 2 via
        // Alpha; the level-1 discovery must stand.
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles
            .expect_similar_artists()
            .returning(|seed, _| match seed {
                "SeedA" => Ok(vec![hit("X", 0.9), hit("Alpha", 0.8)]),
                "Alpha" => Ok(vec![hit("X", 0.2)]),
                _ => Ok(Vec::new()),
            });
        scrobbles.expect_name().return_const("social-scrobbling");

        let explorer = explorer(scrobbles, quiet_graph());
        let result = explorer
            .explore(&["SeedA".to_string()], 2, 20, 10, 50)
            .await
            .unwrap();

        let x = result.iter().find(|e| e.artist_name == "X").unwrap();
        assert_eq!(x.similarity_level, 1);
        assert!((x.score - 0.9).abs() < 1e-9);
        assert_eq!(x.source_chain, "SeedA (social-scrobbling)");
    }

    #[tokio::test]
    async fn test_terminates_under_high_fanout() {
        // Every artist has many similar artists; the walk must still finish
        // within `depth` levels because the fanout cap bounds each frontier.
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles.expect_similar_artists().returning(|seed, _| {
            Ok((0..100)
                .map(|i| hit(&format!("{}-{}", seed, i), 0.5))
                .collect())
        });
        scrobbles.expect_name().return_const("social-scrobbling");

        let explorer = explorer(scrobbles, quiet_graph());
        let result = explorer
            .explore(&["Seed".to_string()], 3, 5, 10, 10_000)
            .await
            .unwrap();

        // Level 1: 100 from the seed; levels 2 and 3: 5 expansions each of
        // 100 results. Bounded, and well under an unbounded explosion.
        assert!(!result.is_empty());
        assert!(result.iter().all(|e| e.similarity_level <= 3));
    }

    #[tokio::test]
    async fn test_empty_frontier_ends_early() {
        let mut scrobbles = MockScrobbleNetwork::new();
        let mut calls = 0;
        scrobbles.expect_similar_artists().returning(move |_, _| {
            calls += 1;
            // Seeds yield nothing, so no level beyond the first runs.
            assert!(calls <= 1, "explorer kept running on an empty frontier");
            Ok(Vec::new())
        });
        scrobbles.expect_name().return_const("social-scrobbling");

        let explorer = explorer(scrobbles, quiet_graph());
        let result = explorer
            .explore(&["Seed".to_string()], 5, 20, 10, 50)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_both_collaborators_contribute() {
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles
            .expect_similar_artists()
            .returning(|seed, _| match seed {
                "Seed" => Ok(vec![hit("FromSocial", 0.9)]),
                _ => Ok(Vec::new()),
            });
        scrobbles.expect_name().return_const("social-scrobbling");

        let mut graph = MockArtistGraph::new();
        graph.expect_related_artists().returning(|seed| match seed {
            "Seed" => Ok(vec![graph_candidate("FromGraph", "Seed")]),
            _ => Ok(Vec::new()),
        });
        graph.expect_name().return_const("relationship-graph");

        let explorer = explorer(scrobbles, graph);
        let result = explorer
            .explore(&["Seed".to_string()], 1, 20, 10, 50)
            .await
            .unwrap();

        let names: Vec<_> = result.iter().map(|e| e.artist_name.as_str()).collect();
        assert!(names.contains(&"FromSocial"));
        assert!(names.contains(&"FromGraph"));
        let from_graph = result
            .iter()
            .find(|e| e.artist_name == "FromGraph")
            .unwrap();
        assert_eq!(from_graph.source_chain, "Seed (relationship-graph)");
    }

    #[tokio::test]
    async fn test_one_failing_collaborator_does_not_abort() {
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles.expect_similar_artists().returning(|_, _| {
            Err(crate::error::AppError::source_unavailable(
                "social-scrobbling",
                "timeout",
            ))
        });
        scrobbles.expect_name().return_const("social-scrobbling");

        let mut graph = MockArtistGraph::new();
        graph.expect_related_artists().returning(|seed| match seed {
            "Seed" => Ok(vec![graph_candidate("Survivor", "Seed")]),
            _ => Ok(Vec::new()),
        });
        graph.expect_name().return_const("relationship-graph");

        let explorer = explorer(scrobbles, graph);
        let result = explorer
            .explore(&["Seed".to_string()], 1, 20, 10, 50)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].artist_name, "Survivor");
    }

    #[tokio::test]
    async fn test_output_ordered_by_level_then_score() {
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles
            .expect_similar_artists()
            .returning(|seed, _| match seed {
                "Seed" => Ok(vec![hit("L1-low", 0.3), hit("L1-high", 0.9)]),
                "L1-low" => Ok(vec![hit("L2", 0.99)]),
                _ => Ok(Vec::new()),
            });
        scrobbles.expect_name().return_const("social-scrobbling");

        let explorer = explorer(scrobbles, quiet_graph());
        let result = explorer
            .explore(&["Seed".to_string()], 2, 20, 10, 50)
            .await
            .unwrap();

        let names: Vec<_> = result.iter().map(|e| e.artist_name.as_str()).collect();
        // Level-1 entries first (score descending), then level 2 despite its
        // higher raw score.
        assert_eq!(names, vec!["L1-high", "L1-low", "L2"]);
    }

    #[tokio::test]
    async fn test_overall_limit_truncates() {
        let mut scrobbles = MockScrobbleNetwork::new();
        scrobbles.expect_similar_artists().returning(|seed, _| {
            if seed == "Seed" {
                Ok((0..10).map(|i| hit(&format!("A{}", i), 0.5)).collect())
            } else {
                Ok(Vec::new())
            }
        });
        scrobbles.expect_name().return_const("social-scrobbling");

        let explorer = explorer(scrobbles, quiet_graph());
        let result = explorer
            .explore(&["Seed".to_string()], 1, 20, 10, 4)
            .await
            .unwrap();
        assert_eq!(result.len(), 4);
    }
}
