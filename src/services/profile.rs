/// Taste profile analysis
///
/// Reduces the user's known-artist set into aggregate signal: genre, country,
/// era, and artist-type frequencies. Genres come from the primary service's
/// records; country, type, and begin-date arrive by enriching each artist
/// through the relationship graph. The profile is built once per run and
/// read-only afterward.
use crate::{
    models::{ArtistRecord, Era, TasteProfile},
    services::providers::ArtistGraph,
};
use std::sync::Arc;

/// How many of an artist's graph tags fold into the genre signal
const TAGS_PER_ARTIST: usize = 5;

pub struct ProfileAnalyzer {
    graph: Arc<dyn ArtistGraph>,
}

impl ProfileAnalyzer {
    pub fn new(graph: Arc<dyn ArtistGraph>) -> Self {
        Self { graph }
    }

    /// Folds the artist list into a profile.
    ///
    /// A single artist's enrichment failure never aborts the pass: the
    /// artist still contributes its genres, and the walk continues with the
    /// counters accumulated so far. Missing or unparseable begin dates are
    /// excluded from the era counts.
    pub async fn analyze(&self, artists: &[ArtistRecord]) -> TasteProfile {
        let mut profile = TasteProfile {
            total_artist_count: artists.len(),
            ..TasteProfile::default()
        };

        tracing::info!(artists = artists.len(), "Analyzing taste profile");

        for artist in artists {
            profile
                .genre_counts
                .extend(artist.genres.iter().map(|g| g.to_lowercase()));

            let details = match self.graph.enrich(&artist.name).await {
                Ok(Some(details)) => details,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(artist = %artist.name, error = %e, "Enrichment failed, skipping");
                    continue;
                }
            };

            profile
                .genre_counts
                .extend(details.tags.iter().take(TAGS_PER_ARTIST).map(|t| t.to_lowercase()));

            if let Some(country) = &details.country {
                profile.country_counts.bump(country.clone());
            }

            if let Some(artist_type) = &details.artist_type {
                profile.artist_type_counts.bump(artist_type.clone());
            }

            if let Some(era) = details
                .begin_date
                .as_deref()
                .and_then(Era::from_begin_date)
            {
                profile.era_counts.bump(era.label());
            }
        }

        tracing::info!(
            genres = profile.genre_counts.len(),
            countries = profile.country_counts.len(),
            eras = profile.era_counts.len(),
            "Taste profile built"
        );
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::providers::{ArtistDetails, MockArtistGraph};

    fn artist(name: &str, genres: &[&str]) -> ArtistRecord {
        ArtistRecord {
            id: name.to_lowercase(),
            name: name.to_string(),
            popularity: 50,
            followers: 1000,
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn details(
        country: Option<&str>,
        begin_date: Option<&str>,
        artist_type: Option<&str>,
        tags: &[&str],
    ) -> ArtistDetails {
        ArtistDetails {
            external_id: Some("mbid".to_string()),
            country: country.map(String::from),
            begin_date: begin_date.map(String::from),
            artist_type: artist_type.map(String::from),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_counts_genres_countries_types_and_eras() {
        let mut graph = MockArtistGraph::new();
        graph.expect_enrich().returning(|name| match name {
            "Sigur Rós" => Ok(Some(details(
                Some("Iceland"),
                Some("1994-01"),
                Some("Group"),
                &["post-rock", "ambient"],
            ))),
            "Björk" => Ok(Some(details(
                Some("Iceland"),
                Some("1965"),
                Some("Person"),
                &["electronic"],
            ))),
            _ => Ok(None),
        });

        let analyzer = ProfileAnalyzer::new(Arc::new(graph));
        let artists = vec![
            artist("Sigur Rós", &["Post-Rock"]),
            artist("Björk", &["art pop"]),
        ];

        let profile = analyzer.analyze(&artists).await;

        assert_eq!(profile.total_artist_count, 2);
        // Spotify genre + graph tag, case-folded into one key
        assert_eq!(profile.genre_counts.get("post-rock"), 2);
        assert_eq!(profile.genre_counts.get("art pop"), 1);
        assert_eq!(profile.genre_counts.get("electronic"), 1);
        assert_eq!(profile.country_counts.get("Iceland"), 2);
        assert_eq!(profile.artist_type_counts.get("Group"), 1);
        assert_eq!(profile.artist_type_counts.get("Person"), 1);
        assert_eq!(profile.era_counts.get("1980s-1990s"), 1);
        assert_eq!(profile.era_counts.get("1960s-1970s"), 1);
    }

    #[tokio::test]
    async fn test_only_first_five_tags_counted() {
        let mut graph = MockArtistGraph::new();
        graph.expect_enrich().returning(|_| {
            Ok(Some(details(
                None,
                None,
                None,
                &["t1", "t2", "t3", "t4", "t5", "t6", "t7"],
            )))
        });

        let analyzer = ProfileAnalyzer::new(Arc::new(graph));
        let profile = analyzer.analyze(&[artist("A", &[])]).await;

        assert_eq!(profile.genre_counts.get("t5"), 1);
        assert_eq!(profile.genre_counts.get("t6"), 0);
    }

    #[tokio::test]
    async fn test_enrichment_failure_skips_artist_not_run() {
        let mut graph = MockArtistGraph::new();
        graph.expect_enrich().returning(|name| match name {
            "Broken" => Err(AppError::source_unavailable("relationship-graph", "timeout")),
            _ => Ok(Some(details(Some("Japan"), None, None, &[]))),
        });

        let analyzer = ProfileAnalyzer::new(Arc::new(graph));
        let artists = vec![artist("Broken", &["noise"]), artist("Mono", &["post-rock"])];
        let profile = analyzer.analyze(&artists).await;

        // The failed artist still contributed its own genres.
        assert_eq!(profile.genre_counts.get("noise"), 1);
        assert_eq!(profile.genre_counts.get("post-rock"), 1);
        // Only the enrichable artist contributed a country.
        assert_eq!(profile.country_counts.get("Japan"), 1);
        assert_eq!(profile.total_artist_count, 2);
    }

    #[tokio::test]
    async fn test_missing_begin_date_excluded_from_eras() {
        let mut graph = MockArtistGraph::new();
        graph.expect_enrich().returning(|name| match name {
            "NoDate" => Ok(Some(details(None, None, None, &[]))),
            "BadDate" => Ok(Some(details(None, Some("??"), None, &[]))),
            _ => Ok(Some(details(None, Some("2015"), None, &[]))),
        });

        let analyzer = ProfileAnalyzer::new(Arc::new(graph));
        let artists = vec![
            artist("NoDate", &[]),
            artist("BadDate", &[]),
            artist("Dated", &[]),
        ];
        let profile = analyzer.analyze(&artists).await;

        assert_eq!(profile.era_counts.total(), 1);
        assert_eq!(profile.era_counts.get("2010s+"), 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let graph = MockArtistGraph::new();
        let analyzer = ProfileAnalyzer::new(Arc::new(graph));
        let profile = analyzer.analyze(&[]).await;

        assert_eq!(profile.total_artist_count, 0);
        assert!(profile.genre_counts.is_empty());
    }
}
