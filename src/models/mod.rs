use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

mod frequency;

pub use frequency::FrequencyMap;

/// One of the four independent providers of recommendation candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    RelationshipGraph,
    TagSearch,
    SocialSimilarity,
    PrimaryRecommendation,
}

impl Display for RecommendationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecommendationSource::RelationshipGraph => "relationship_graph",
            RecommendationSource::TagSearch => "tag_search",
            RecommendationSource::SocialSimilarity => "social_similarity",
            RecommendationSource::PrimaryRecommendation => "primary_recommendation",
        };
        write!(f, "{}", name)
    }
}

/// Listening window on the primary service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::ShortTerm,
        TimeWindow::MediumTerm,
        TimeWindow::LongTerm,
    ];

    /// Wire value used by the primary service
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::ShortTerm => "short_term",
            TimeWindow::MediumTerm => "medium_term",
            TimeWindow::LongTerm => "long_term",
        }
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An artist as the primary streaming service reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub popularity: u8,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// A cached followed-artist entry, before the shape check.
///
/// Cache payloads written by older versions (or damaged on disk) have been
/// observed to contain bare strings where artist objects belong. Decoding
/// into this enum keeps the malformed entries visible so the inactive-artist
/// scorer can refuse to run on them instead of silently skipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedArtist {
    Record(ArtistRecord),
    Malformed(serde_json::Value),
}

/// A search/graph hit from one of the metadata collaborators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistHit {
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub begin_date: Option<String>,
    #[serde(default)]
    pub artist_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Search relevance on the graph side, listener count on the social side
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub listeners: Option<u64>,
}

/// A single play from the recently-played feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub track_id: String,
    pub track_name: String,
    pub artist_ids: Vec<String>,
    pub artist_names: Vec<String>,
    pub played_at: DateTime<Utc>,
}

/// A raw recommendation from one source, before aggregation.
///
/// Confidence is on the producing source's own notion of [0,1]; sources are
/// not cross-calibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub artist_name: String,
    pub source: RecommendationSource,
    pub confidence: f64,
    pub reason: String,
    pub seed_artist: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// A candidate promoted by the aggregator, ordered by descending final score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecommendation {
    #[serde(flatten)]
    pub candidate: RecommendationCandidate,
    pub final_score: f64,
    pub recommendation_count: usize,
    pub sources: Vec<RecommendationSource>,
}

/// Fixed era buckets keyed off an artist's begin year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Era {
    #[serde(rename = "Pre-1960")]
    Pre1960,
    #[serde(rename = "1960s-1970s")]
    SixtiesSeventies,
    #[serde(rename = "1980s-1990s")]
    EightiesNineties,
    #[serde(rename = "2000s")]
    TwoThousands,
    #[serde(rename = "2010s+")]
    TwentyTensPlus,
}

impl Era {
    /// Buckets a begin year into its era band.
    pub fn from_year(year: i32) -> Era {
        if year < 1960 {
            Era::Pre1960
        } else if year < 1980 {
            Era::SixtiesSeventies
        } else if year < 2000 {
            Era::EightiesNineties
        } else if year < 2010 {
            Era::TwoThousands
        } else {
            Era::TwentyTensPlus
        }
    }

    /// Parses the leading year of a begin date ("1969-03-01", "1969").
    ///
    /// Unparseable or missing dates are excluded from era counts, not errors.
    pub fn from_begin_date(begin_date: &str) -> Option<Era> {
        begin_date
            .get(..4)?
            .parse::<i32>()
            .ok()
            .map(Era::from_year)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Era::Pre1960 => "Pre-1960",
            Era::SixtiesSeventies => "1960s-1970s",
            Era::EightiesNineties => "1980s-1990s",
            Era::TwoThousands => "2000s",
            Era::TwentyTensPlus => "2010s+",
        }
    }
}

impl Display for Era {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Aggregate signal reduced from the user's known-artist set.
///
/// Built once per analysis run, read-only afterward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub genre_counts: FrequencyMap,
    pub country_counts: FrequencyMap,
    pub era_counts: FrequencyMap,
    pub artist_type_counts: FrequencyMap,
    pub total_artist_count: usize,
}

/// An artist discovered through similarity-chain exploration.
///
/// First discovery wins: the level and provenance recorded are those of the
/// first time the name was seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityChainEntry {
    pub artist_name: String,
    /// e.g. "Radiohead (social)"
    pub source_chain: String,
    /// 1-based depth at which the artist was first discovered
    pub similarity_level: usize,
    pub score: f64,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// A followed artist absent from every listening signal, scored for removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InactiveArtistRecord {
    pub id: String,
    pub name: String,
    pub popularity: u8,
    pub followers: u64,
    pub genres: Vec<String>,
    pub follower_score: f64,
    pub relevance_score: f64,
}

/// Lower-cased, whitespace-trimmed artist name: the sole deduplication key
/// across sources. Distinct artists sharing a name collide by design.
pub fn normalized_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Top-artist lists keyed by listening window
pub type TopArtistsByWindow = HashMap<TimeWindow, Vec<ArtistRecord>>;
