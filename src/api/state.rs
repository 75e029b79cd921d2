use std::sync::Arc;

use crate::config::Config;
use crate::services::backup::ExportSink;
use crate::services::providers::{ArtistGraph, ScrobbleNetwork, StreamingLibrary};

/// Pipeline tunables, read-only once the server is up
#[derive(Debug, Clone, Copy)]
pub struct Tunables {
    pub confidence_threshold: f64,
    pub recommendation_limit: usize,
    pub chain_depth: usize,
    pub chain_fanout_cap: usize,
    pub seed_sample_size: usize,
}

impl From<&Config> for Tunables {
    fn from(config: &Config) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            recommendation_limit: config.recommendation_limit,
            chain_depth: config.chain_depth,
            chain_fanout_cap: config.chain_fanout_cap,
            seed_sample_size: config.seed_sample_size,
        }
    }
}

/// Shared application state: injected collaborator handles plus tunables.
///
/// Handlers construct pipeline stages from these handles per request; no
/// stage holds hidden process-wide clients.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<dyn StreamingLibrary>,
    pub graph: Arc<dyn ArtistGraph>,
    pub scrobbles: Arc<dyn ScrobbleNetwork>,
    pub exporter: Arc<dyn ExportSink>,
    pub tunables: Tunables,
}

impl AppState {
    pub fn new(
        library: Arc<dyn StreamingLibrary>,
        graph: Arc<dyn ArtistGraph>,
        scrobbles: Arc<dyn ScrobbleNetwork>,
        exporter: Arc<dyn ExportSink>,
        tunables: Tunables,
    ) -> Self {
        Self {
            library,
            graph,
            scrobbles,
            exporter,
            tunables,
        }
    }
}
