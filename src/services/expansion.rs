/// Geographic and genre expansion
///
/// Picks which countries and genres to explore next, either handed in by
/// the user or chosen to complement what the library already covers, and
/// harvests artists for them from the metadata collaborators.
use crate::{
    error::AppResult,
    models::{normalized_name, ArtistHit},
    services::providers::{ArtistGraph, ScrobbleNetwork},
};
use std::collections::HashSet;
use std::sync::Arc;

/// Curated catalog of countries worth a listen beyond the usual suspects.
/// Fixed order; geographic selection preserves it.
pub const DIVERSE_COUNTRIES: [&str; 54] = [
    "Iceland",
    "Estonia",
    "Latvia",
    "Lithuania",
    "Slovenia",
    "Croatia",
    "Serbia",
    "Bulgaria",
    "Romania",
    "Hungary",
    "Czech Republic",
    "Mali",
    "Senegal",
    "Nigeria",
    "Ghana",
    "South Africa",
    "Kenya",
    "Mongolia",
    "Kazakhstan",
    "Georgia",
    "Armenia",
    "Azerbaijan",
    "Lebanon",
    "Jordan",
    "Israel",
    "Iran",
    "Turkey",
    "Greece",
    "Portugal",
    "Belgium",
    "Luxembourg",
    "Austria",
    "Switzerland",
    "Uruguay",
    "Paraguay",
    "Bolivia",
    "Ecuador",
    "Peru",
    "Colombia",
    "Venezuela",
    "Cuba",
    "Jamaica",
    "Trinidad and Tobago",
    "Indonesia",
    "Malaysia",
    "Philippines",
    "Vietnam",
    "Thailand",
    "Myanmar",
    "Cambodia",
    "Laos",
    "Nepal",
    "Bangladesh",
    "Sri Lanka",
];

/// Per-genre artist pull during genre expansion
const ARTISTS_PER_GENRE: usize = 10;
/// How many related genres to explore
const RELATED_GENRE_LIMIT: usize = 20;

/// First `cap` catalog entries whose normalized form is absent from
/// `current_countries`, catalog order preserved.
pub fn select_underrepresented(
    current_countries: &HashSet<String>,
    catalog: &[&str],
    cap: usize,
) -> Vec<String> {
    let current: HashSet<String> = current_countries
        .iter()
        .map(|c| normalized_name(c))
        .collect();

    catalog
        .iter()
        .filter(|country| !current.contains(&normalized_name(country)))
        .take(cap)
        .map(|country| country.to_string())
        .collect()
}

/// An artist surfaced by expansion, tagged with what led to it
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ExpansionFind {
    pub artist: ArtistHit,
    /// The country or genre that surfaced the artist
    pub via: String,
    pub provider: &'static str,
}

pub struct ExpansionExplorer {
    graph: Arc<dyn ArtistGraph>,
    scrobbles: Arc<dyn ScrobbleNetwork>,
}

impl ExpansionExplorer {
    pub fn new(graph: Arc<dyn ArtistGraph>, scrobbles: Arc<dyn ScrobbleNetwork>) -> Self {
        Self { graph, scrobbles }
    }

    /// Harvests artists from the given countries through the graph service,
    /// deduplicated by name, popularity signal descending, truncated.
    ///
    /// A country whose query fails is skipped; finds from earlier countries
    /// are kept.
    pub async fn explore_countries(
        &self,
        countries: &[String],
        limit: usize,
    ) -> AppResult<Vec<ExpansionFind>> {
        let mut finds: Vec<ExpansionFind> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        tracing::info!(countries = countries.len(), "Exploring countries");

        for country in countries {
            let hits = match self.graph.search_by_country(country).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(country = %country, error = %e, "Country query failed, skipping");
                    continue;
                }
            };

            for hit in hits {
                if seen.insert(normalized_name(&hit.name)) {
                    finds.push(ExpansionFind {
                        artist: hit,
                        via: country.clone(),
                        provider: self.graph.name(),
                    });
                }
            }
        }

        finds.sort_by(|a, b| {
            signal(&b.artist)
                .total_cmp(&signal(&a.artist))
                .then_with(|| a.artist.name.cmp(&b.artist.name))
        });
        finds.truncate(limit);

        tracing::info!(finds = finds.len(), "Country exploration complete");
        Ok(finds)
    }

    /// Expands the user's known genres through the scrobble network's
    /// related-genre capability, then pulls each related genre's top
    /// artists. No scoring of its own: dedup by normalized name, early stop
    /// once `limit` is reached.
    pub async fn explore_genres(
        &self,
        known_genres: &[String],
        limit: usize,
    ) -> AppResult<Vec<ExpansionFind>> {
        let related = self
            .scrobbles
            .related_genres(known_genres, RELATED_GENRE_LIMIT)
            .await?;

        tracing::info!(
            known = known_genres.len(),
            related = related.len(),
            "Exploring related genres"
        );

        let mut finds: Vec<ExpansionFind> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        'genres: for genre in &related {
            let hits = match self
                .scrobbles
                .top_artists_by_tag(genre, ARTISTS_PER_GENRE)
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(genre = %genre, error = %e, "Genre query failed, skipping");
                    continue;
                }
            };

            for hit in hits {
                if seen.insert(normalized_name(&hit.name)) {
                    finds.push(ExpansionFind {
                        artist: hit,
                        via: genre.clone(),
                        provider: self.scrobbles.name(),
                    });
                    if finds.len() >= limit {
                        break 'genres;
                    }
                }
            }
        }

        tracing::info!(finds = finds.len(), "Genre exploration complete");
        Ok(finds)
    }
}

/// Popularity signal for ranking a find: listener count when the source
/// reports one, search relevance otherwise.
fn signal(hit: &ArtistHit) -> f64 {
    hit.listeners
        .map(|l| l as f64)
        .or(hit.score)
        .unwrap_or(0.0)
}
