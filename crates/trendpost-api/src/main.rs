//! Binary entrypoint for the Trendpost API server.
use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use trendpost_api::{run, AppState};
use trendpost_core::{ArtifactStore, RefinementOrchestrator, TrendpostConfig};
use trendpost_oracle::OpenRouterOracle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Optional YAML config path as the only argument; env overrides apply either way
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = TrendpostConfig::load(config_path.as_deref())?;

    let oracle = OpenRouterOracle::from_env(&config.oracle).context("building OpenRouter oracle")?;
    tracing::info!(model = oracle.model(), timeout_secs = config.oracle.timeout_secs, "oracle ready");

    let refiner = RefinementOrchestrator::new(std::sync::Arc::new(oracle))
        .with_timeout(config.oracle.timeout());
    let state = AppState::new(refiner, ArtifactStore::new(&config.artifacts_dir))?;

    run(&config.listen_addr, state).await
}
