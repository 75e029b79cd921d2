use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Every tunable has a default so a missing or unset variable never aborts
/// the run. The confidence threshold is passed through as-is; callers own
/// keeping it inside [0,1].
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Primary streaming service API base URL
    #[serde(default = "default_streaming_api_url")]
    pub streaming_api_url: String,

    /// Primary streaming service bearer token
    #[serde(default)]
    pub streaming_api_token: String,

    /// Relationship/tag graph service base URL
    #[serde(default = "default_graph_api_url")]
    pub graph_api_url: String,

    /// Social-scrobbling service base URL
    #[serde(default = "default_scrobble_api_url")]
    pub scrobble_api_url: String,

    /// Social-scrobbling service API key
    #[serde(default)]
    pub scrobble_api_key: String,

    /// Minimum final score for an aggregated recommendation to surface
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Maximum aggregated recommendations returned
    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: usize,

    /// Similarity-chain depth
    #[serde(default = "default_chain_depth")]
    pub chain_depth: usize,

    /// Per-level frontier cap during chain exploration
    #[serde(default = "default_chain_fanout_cap")]
    pub chain_fanout_cap: usize,

    /// How many of the user's artists seed each candidate source
    #[serde(default = "default_seed_sample_size")]
    pub seed_sample_size: usize,

    /// Pause between consecutive calls to the same collaborator, in ms
    #[serde(default = "default_streaming_delay_ms")]
    pub streaming_delay_ms: u64,

    #[serde(default = "default_graph_delay_ms")]
    pub graph_delay_ms: u64,

    #[serde(default = "default_scrobble_delay_ms")]
    pub scrobble_delay_ms: u64,

    /// Directory backup snapshots are written into
    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_streaming_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_graph_api_url() -> String {
    "https://musicbrainz.org/ws/2".to_string()
}

fn default_scrobble_api_url() -> String {
    "https://ws.audioscrobbler.com/2.0".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_recommendation_limit() -> usize {
    20
}

fn default_chain_depth() -> usize {
    2
}

fn default_chain_fanout_cap() -> usize {
    20
}

fn default_seed_sample_size() -> usize {
    10
}

fn default_streaming_delay_ms() -> u64 {
    200
}

fn default_graph_delay_ms() -> u64 {
    1000
}

fn default_scrobble_delay_ms() -> u64 {
    200
}

fn default_export_dir() -> String {
    "exports".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_tunables() {
        let config: Config = envy::from_iter(std::iter::empty::<(String, String)>()).unwrap();
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.recommendation_limit, 20);
        assert_eq!(config.chain_depth, 2);
        assert_eq!(config.chain_fanout_cap, 20);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_out_of_range_threshold_passes_through() {
        let config: Config = envy::from_iter(vec![(
            "CONFIDENCE_THRESHOLD".to_string(),
            "1.7".to_string(),
        )])
        .unwrap();
        assert_eq!(config.confidence_threshold, 1.7);
    }
}
