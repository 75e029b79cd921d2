/// Library analytics
///
/// The report is an ordered list of explicit named steps, each reducing the
/// same input snapshot to one tagged section. Adding an analysis means
/// adding a step to the list, not another stringly-dispatched method name.
use crate::models::{ArtistRecord, PlayEvent, TasteProfile};
use serde::Serialize;
use serde_json::json;

/// Everything a step may look at, assembled once per report run
pub struct AnalysisInput {
    pub followed: Vec<ArtistRecord>,
    pub recently_played: Vec<PlayEvent>,
    pub profile: TasteProfile,
}

/// One named analysis producing a tagged section
struct AnalysisStep {
    name: &'static str,
    run: fn(&AnalysisInput) -> serde_json::Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReportSection {
    pub name: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LibraryReport {
    pub sections: Vec<ReportSection>,
}

/// The fixed step list, in report order
const STEPS: [AnalysisStep; 5] = [
    AnalysisStep {
        name: "library_totals",
        run: library_totals,
    },
    AnalysisStep {
        name: "genre_distribution",
        run: genre_distribution,
    },
    AnalysisStep {
        name: "era_distribution",
        run: era_distribution,
    },
    AnalysisStep {
        name: "country_distribution",
        run: country_distribution,
    },
    AnalysisStep {
        name: "popularity_summary",
        run: popularity_summary,
    },
];

/// Runs every step over the input, in order.
pub fn run_report(input: &AnalysisInput) -> LibraryReport {
    let sections = STEPS
        .iter()
        .map(|step| {
            tracing::debug!(step = step.name, "Running analysis step");
            ReportSection {
                name: step.name.to_string(),
                data: (step.run)(input),
            }
        })
        .collect();

    LibraryReport { sections }
}

fn library_totals(input: &AnalysisInput) -> serde_json::Value {
    json!({
        "followed_artists": input.followed.len(),
        "recent_plays": input.recently_played.len(),
        "distinct_genres": input.profile.genre_counts.len(),
        "distinct_countries": input.profile.country_counts.len(),
    })
}

fn genre_distribution(input: &AnalysisInput) -> serde_json::Value {
    json!({
        "top_genres": input.profile.genre_counts.most_common(20),
        "genre_diversity": input.profile.genre_counts.len(),
    })
}

fn era_distribution(input: &AnalysisInput) -> serde_json::Value {
    json!({
        "eras": input.profile.era_counts.most_common(10),
    })
}

fn country_distribution(input: &AnalysisInput) -> serde_json::Value {
    json!({
        "top_countries": input.profile.country_counts.most_common(10),
        "geographic_diversity": input.profile.country_counts.len(),
    })
}

fn popularity_summary(input: &AnalysisInput) -> serde_json::Value {
    if input.followed.is_empty() {
        return json!({
            "average_popularity": 0.0,
            "average_followers": 0.0,
            "mainstream": 0,
            "moderate": 0,
            "niche": 0,
        });
    }

    let count = input.followed.len() as f64;
    let avg_popularity =
        input.followed.iter().map(|a| a.popularity as f64).sum::<f64>() / count;
    let avg_followers = input.followed.iter().map(|a| a.followers as f64).sum::<f64>() / count;

    let mainstream = input.followed.iter().filter(|a| a.popularity >= 70).count();
    let niche = input.followed.iter().filter(|a| a.popularity < 40).count();
    let moderate = input.followed.len() - mainstream - niche;

    json!({
        "average_popularity": avg_popularity,
        "average_followers": avg_followers,
        "mainstream": mainstream,
        "moderate": moderate,
        "niche": niche,
    })
}
