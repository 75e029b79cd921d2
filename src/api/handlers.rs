use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{
    InactiveArtistRecord, ScoredRecommendation, SimilarityChainEntry, TasteProfile, TimeWindow,
    TopArtistsByWindow,
};
use crate::services::analytics::{self, AnalysisInput, LibraryReport};
use crate::services::backup::{self, BackupManifest};
use crate::services::cleanup;
use crate::services::expansion::{self, ExpansionFind};
use crate::services::{ChainExplorer, DiscoveryEngine, ExpansionExplorer, ProfileAnalyzer};

use super::AppState;

/// Social-similarity results per expanded artist during chain exploration
const CHAIN_RESULTS_PER_ARTIST: usize = 10;
/// Chain discoveries returned per request
const CHAIN_OVERALL_LIMIT: usize = 50;
/// Countries explored per request when none are given
const DEFAULT_COUNTRY_PICKS: usize = 10;
/// Profile genres seeding genre expansion when none are given
const DEFAULT_GENRE_SEEDS: usize = 5;

// Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct RecommendRequest {
    pub threshold: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ChainsRequest {
    pub seeds: Vec<String>,
    pub depth: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenresRequest {
    pub genres: Option<Vec<String>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CountriesRequest {
    pub countries: Option<Vec<String>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct InactiveResponse {
    pub followed_count: usize,
    pub inactive_count: usize,
    pub candidates: Vec<InactiveArtistRecord>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Builds the taste profile from the followed-artist list.
pub async fn get_profile(State(state): State<AppState>) -> AppResult<Json<TasteProfile>> {
    let artists = state.library.followed_artists().await?;
    let profile = ProfileAnalyzer::new(state.graph.clone())
        .analyze(&artists)
        .await;
    Ok(Json(profile))
}

/// Runs the full multi-source recommendation pipeline.
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> AppResult<Json<Vec<ScoredRecommendation>>> {
    let threshold = request
        .threshold
        .unwrap_or(state.tunables.confidence_threshold);
    let limit = request.limit.unwrap_or(state.tunables.recommendation_limit);

    let known = state.library.followed_artists().await?;
    let profile = ProfileAnalyzer::new(state.graph.clone())
        .analyze(&known)
        .await;

    let engine = DiscoveryEngine::new(
        state.library.clone(),
        state.graph.clone(),
        state.scrobbles.clone(),
        state.tunables.seed_sample_size,
    );
    let recommendations = engine.discover(&known, &profile, threshold, limit).await?;

    Ok(Json(recommendations))
}

/// Follows similarity chains out from the given seed artists.
pub async fn explore_chains(
    State(state): State<AppState>,
    Json(request): Json<ChainsRequest>,
) -> AppResult<Json<Vec<SimilarityChainEntry>>> {
    if request.seeds.is_empty() {
        return Err(AppError::InvalidInput(
            "at least one seed artist is required".to_string(),
        ));
    }

    let depth = request.depth.unwrap_or(state.tunables.chain_depth);
    let limit = request.limit.unwrap_or(CHAIN_OVERALL_LIMIT);

    let explorer = ChainExplorer::new(state.scrobbles.clone(), state.graph.clone());
    let entries = explorer
        .explore(
            &request.seeds,
            depth,
            state.tunables.chain_fanout_cap,
            CHAIN_RESULTS_PER_ARTIST,
            limit,
        )
        .await?;

    Ok(Json(entries))
}

/// Expands into related genres, seeded by the request or by the profile.
pub async fn explore_genres(
    State(state): State<AppState>,
    Json(request): Json<GenresRequest>,
) -> AppResult<Json<Vec<ExpansionFind>>> {
    let limit = request.limit.unwrap_or(state.tunables.recommendation_limit);

    let genres = match request.genres {
        Some(genres) if !genres.is_empty() => genres,
        _ => {
            let artists = state.library.followed_artists().await?;
            let profile = ProfileAnalyzer::new(state.graph.clone())
                .analyze(&artists)
                .await;
            profile.genre_counts.top_keys(DEFAULT_GENRE_SEEDS)
        }
    };

    let explorer = ExpansionExplorer::new(state.graph.clone(), state.scrobbles.clone());
    let finds = explorer.explore_genres(&genres, limit).await?;
    Ok(Json(finds))
}

/// Explores artists from the given countries, or from curated countries the
/// library does not cover yet.
pub async fn explore_countries(
    State(state): State<AppState>,
    Json(request): Json<CountriesRequest>,
) -> AppResult<Json<Vec<ExpansionFind>>> {
    let limit = request.limit.unwrap_or(state.tunables.recommendation_limit);

    let countries = match request.countries {
        Some(countries) if !countries.is_empty() => countries,
        _ => {
            let artists = state.library.followed_artists().await?;
            let profile = ProfileAnalyzer::new(state.graph.clone())
                .analyze(&artists)
                .await;
            let current = profile
                .country_counts
                .top_keys(usize::MAX)
                .into_iter()
                .collect();
            expansion::select_underrepresented(
                &current,
                &expansion::DIVERSE_COUNTRIES,
                DEFAULT_COUNTRY_PICKS,
            )
        }
    };

    let explorer = ExpansionExplorer::new(state.graph.clone(), state.scrobbles.clone());
    let finds = explorer.explore_countries(&countries, limit).await?;
    Ok(Json(finds))
}

/// Scores followed-but-inactive artists as removal candidates.
///
/// On cache corruption the cached list is invalidated before the error
/// surfaces, so the client's retry refetches clean data.
pub async fn inactive_artists(
    State(state): State<AppState>,
) -> AppResult<Json<InactiveResponse>> {
    let followed = state.library.followed_artists_raw().await?;
    let top_by_window = fetch_top_windows(&state).await;
    let recently_played = match state.library.recently_played().await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(error = %e, "Recently-played fetch failed, scoring without it");
            Vec::new()
        }
    };

    match cleanup::score_inactive(&followed, &top_by_window, &recently_played) {
        Ok(candidates) => Ok(Json(InactiveResponse {
            followed_count: followed.len(),
            inactive_count: candidates.len(),
            candidates,
        })),
        Err(e @ AppError::CacheCorruption(_)) => {
            state.library.invalidate_followed().await?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Runs every analysis step and returns the assembled report.
pub async fn analytics_report(State(state): State<AppState>) -> AppResult<Json<LibraryReport>> {
    let input = gather_analysis_input(&state).await?;
    Ok(Json(analytics::run_report(&input)))
}

/// Writes a portable JSON snapshot of the library.
pub async fn create_backup(State(state): State<AppState>) -> AppResult<Json<BackupManifest>> {
    let followed = state.library.followed_artists().await?;
    let top_by_window = fetch_top_windows(&state).await;
    let recently_played = state.library.recently_played().await.unwrap_or_default();
    let profile = ProfileAnalyzer::new(state.graph.clone())
        .analyze(&followed)
        .await;

    let manifest = backup::write_backup(
        state.exporter.as_ref(),
        &followed,
        &top_by_window,
        &recently_played,
        &profile,
    )?;

    Ok(Json(manifest))
}

/// Top artists for every window; a failed window is skipped, not fatal.
async fn fetch_top_windows(state: &AppState) -> TopArtistsByWindow {
    let mut top_by_window = TopArtistsByWindow::new();
    for window in TimeWindow::ALL {
        match state.library.top_artists(window).await {
            Ok(artists) => {
                top_by_window.insert(window, artists);
            }
            Err(e) => {
                tracing::warn!(window = %window, error = %e, "Top-artists fetch failed, skipping window");
            }
        }
    }
    top_by_window
}

async fn gather_analysis_input(state: &AppState) -> AppResult<AnalysisInput> {
    let followed = state.library.followed_artists().await?;
    let recently_played = state.library.recently_played().await.unwrap_or_default();
    let profile = ProfileAnalyzer::new(state.graph.clone())
        .analyze(&followed)
        .await;

    Ok(AnalysisInput {
        followed,
        recently_played,
        profile,
    })
}
