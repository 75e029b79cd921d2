/// Multi-source recommendation aggregation and scoring
///
/// Candidates harvested independently from up to four sources arrive with
/// confidences on each source's own notion of [0,1]; the scales are not
/// cross-calibrated. Merging keys on the normalized artist name alone;
/// distinct artists sharing a name collide, and cross-source external ids
/// are never compared.
use crate::models::{
    normalized_name, RecommendationCandidate, ScoredRecommendation, TasteProfile,
};
use std::collections::{HashMap, HashSet};

const CONFIDENCE_WEIGHT: f64 = 0.6;
const SOURCE_DIVERSITY_STEP: f64 = 0.2;
const SOURCE_DIVERSITY_CAP: f64 = 0.3;
const VOLUME_STEP: f64 = 0.05;
const VOLUME_CAP: f64 = 0.1;

/// Merges raw candidates into scored recommendations.
///
/// Candidates naming an already-known artist are discarded outright. The
/// rest are grouped by normalized name in encounter order, scored from
/// average confidence plus source-diversity and volume bonuses, filtered by
/// `threshold` (taken as-is, the caller owns its range), sorted by
/// descending score with ties keeping group-encounter order, and truncated
/// to `limit`. Deterministic for a given input.
pub fn aggregate(
    candidates: Vec<RecommendationCandidate>,
    profile: &TasteProfile,
    known_artists: &HashSet<String>,
    threshold: f64,
    limit: usize,
) -> Vec<ScoredRecommendation> {
    tracing::debug!(
        candidates = candidates.len(),
        known = known_artists.len(),
        profile_genres = profile.genre_counts.len(),
        threshold,
        "Aggregating recommendations"
    );

    // Group by normalized name, preserving first-encounter order of groups.
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<RecommendationCandidate>> = HashMap::new();

    for candidate in candidates {
        let key = normalized_name(&candidate.artist_name);
        if key.is_empty() {
            tracing::debug!("Dropping candidate with empty name");
            continue;
        }
        if known_artists.contains(&key) {
            continue;
        }
        groups.entry(key.clone()).or_insert_with(|| {
            group_order.push(key);
            Vec::new()
        }).push(candidate);
    }

    let mut scored: Vec<ScoredRecommendation> = Vec::new();

    for key in &group_order {
        let group = &groups[key];

        let avg_confidence =
            group.iter().map(|c| c.confidence).sum::<f64>() / group.len() as f64;

        let distinct_sources: HashSet<_> = group.iter().map(|c| c.source).collect();
        let diversity_bonus =
            (distinct_sources.len() as f64 * SOURCE_DIVERSITY_STEP).min(SOURCE_DIVERSITY_CAP);
        let volume_bonus = (group.len() as f64 * VOLUME_STEP).min(VOLUME_CAP);

        let final_score =
            (avg_confidence * CONFIDENCE_WEIGHT + diversity_bonus + volume_bonus).min(1.0);

        if final_score < threshold {
            continue;
        }

        // The metadata-richest candidate represents the group: largest
        // serialized footprint, first one on ties.
        let representative = group
            .iter()
            .max_by_key(|c| serde_json::to_string(c).map(|s| s.len()).unwrap_or(0))
            .expect("group is never empty")
            .clone();

        let mut sources: Vec<_> = distinct_sources.into_iter().collect();
        sources.sort_by_key(|s| s.to_string());

        scored.push(ScoredRecommendation {
            candidate: representative,
            final_score,
            recommendation_count: group.len(),
            sources,
        });
    }

    // Stable: equal scores keep group-encounter order.
    scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    scored.truncate(limit);

    tracing::debug!(recommendations = scored.len(), "Aggregation complete");
    scored
}
