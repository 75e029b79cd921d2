/// Inactive-artist relevance scoring
///
/// Cross-references the followed-artist list against every listening signal
/// (top artists across all windows, recently played) and scores the artists
/// that appear in none of them. Low scores are the best removal candidates.
///
/// The follower count is an API-reported metric, not a true monthly-listener
/// count, so the score carries protective floors: an artist the platform
/// itself rates popular is never ranked deep into removal territory just
/// because its follower number is small.
use crate::{
    error::{AppError, AppResult},
    models::{CachedArtist, InactiveArtistRecord, PlayEvent, TopArtistsByWindow},
};
use std::collections::HashSet;

const POPULARITY_WEIGHT: f64 = 0.7;
const FOLLOWER_WEIGHT: f64 = 0.3;
const FOLLOWER_LOG_SCALE: f64 = 12.0;

/// Scores every followed-but-inactive artist, least relevant first.
///
/// Refuses to run over malformed input: if any followed entry is not a
/// well-formed artist record the whole operation aborts with
/// `CacheCorruption`, and the caller should invalidate the cached list and
/// refetch rather than trust a partial scoring.
pub fn score_inactive(
    followed: &[CachedArtist],
    top_artists_by_window: &TopArtistsByWindow,
    recently_played: &[PlayEvent],
) -> AppResult<Vec<InactiveArtistRecord>> {
    // Corruption guard before any scoring.
    let mut records = Vec::with_capacity(followed.len());
    for entry in followed {
        match entry {
            CachedArtist::Record(artist) => records.push(artist),
            CachedArtist::Malformed(value) => {
                tracing::error!(entry = %value, "Malformed followed-artist entry");
                return Err(AppError::CacheCorruption(
                    "followed-artist list contains a malformed entry".to_string(),
                ));
            }
        }
    }

    let active_ids = collect_active_ids(top_artists_by_window, recently_played);

    let mut inactive: Vec<InactiveArtistRecord> = records
        .into_iter()
        .filter(|artist| !active_ids.contains(artist.id.as_str()))
        .map(|artist| {
            let follower_score = follower_score(artist.followers);
            let relevance_score =
                relevance_score(artist.popularity, artist.followers, follower_score);

            InactiveArtistRecord {
                id: artist.id.clone(),
                name: artist.name.clone(),
                popularity: artist.popularity,
                followers: artist.followers,
                genres: artist.genres.clone(),
                follower_score,
                relevance_score,
            }
        })
        .collect();

    // Least relevant first: the top of the list is the safest to drop.
    inactive.sort_by(|a, b| a.relevance_score.total_cmp(&b.relevance_score));

    tracing::info!(
        followed = followed.len(),
        active = active_ids.len(),
        inactive = inactive.len(),
        "Inactive artists scored"
    );
    Ok(inactive)
}

/// Every artist id appearing in any top-artists window or any recent play.
fn collect_active_ids<'a>(
    top_artists_by_window: &'a TopArtistsByWindow,
    recently_played: &'a [PlayEvent],
) -> HashSet<&'a str> {
    let mut active: HashSet<&str> = HashSet::new();

    for artists in top_artists_by_window.values() {
        for artist in artists {
            active.insert(artist.id.as_str());
        }
    }

    for event in recently_played {
        for id in &event.artist_ids {
            active.insert(id.as_str());
        }
    }

    active
}

/// Log-scaled follower signal on a 0-100 scale; zero followers score zero.
fn follower_score(followers: u64) -> f64 {
    if followers == 0 {
        return 0.0;
    }
    (((followers + 1) as f64).log10() * FOLLOWER_LOG_SCALE).clamp(0.0, 100.0)
}

/// Popularity/follower blend with the protective floor ladder, first match
/// wins.
fn relevance_score(popularity: u8, followers: u64, follower_score: f64) -> f64 {
    let base_score = popularity as f64 * POPULARITY_WEIGHT + follower_score * FOLLOWER_WEIGHT;

    if popularity >= 50 {
        base_score.max(50.0)
    } else if popularity >= 30 && followers < 1000 {
        base_score.max(35.0)
    } else {
        base_score
    }
}
