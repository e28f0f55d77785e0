//! Trendpost API /v1: sessions, generated posts and refinements over REST
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub use error::ApiError;
pub use state::{AppState, SessionRegistry};

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/sessions", post(handlers::create_session))
        .route("/v1/sessions/:sid/steps", post(handlers::append_step))
        .route("/v1/sessions/:sid/posts", post(handlers::register_post))
        .route("/v1/sessions/:sid/posts/:pid", get(handlers::get_post))
        .route("/v1/sessions/:sid/posts/:pid/refine", post(handlers::refine_post))
        .route("/v1/sessions/:sid/posts/:pid/reset", post(handlers::reset_post))
        .route("/v1/sessions/:sid/history", get(handlers::history))
        .route("/v1/sessions/:sid/snapshot", post(handlers::snapshot_session))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::cors())
        .layer(middleware::trace())
        .with_state(state)
}

pub async fn run(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Trendpost API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
