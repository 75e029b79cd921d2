use std::sync::Arc;

use encore_api::api::{create_router, AppState, Tunables};
use encore_api::config::Config;
use encore_api::db::{create_redis_client, Cache};
use encore_api::services::backup::FileExporter;
use encore_api::services::providers::{LastfmClient, MusicBrainzClient, SpotifyClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;

    let library = Arc::new(SpotifyClient::new(
        cache.clone(),
        config.streaming_api_url.clone(),
        config.streaming_api_token.clone(),
        config.streaming_delay_ms,
    ));
    let graph = Arc::new(MusicBrainzClient::new(
        cache.clone(),
        config.graph_api_url.clone(),
        config.graph_delay_ms,
    ));
    let scrobbles = Arc::new(LastfmClient::new(
        cache.clone(),
        config.scrobble_api_url.clone(),
        config.scrobble_api_key.clone(),
        config.scrobble_delay_ms,
    ));
    let exporter = Arc::new(FileExporter::new(&config.export_dir));

    let state = AppState::new(library, graph, scrobbles, exporter, Tunables::from(&config));
    let app = create_router(state);

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app).await?;

    cache_writer.shutdown().await;
    Ok(())
}
