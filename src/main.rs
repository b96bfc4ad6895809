use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tune_graph_api::backend::HttpSparqlBackend;
use tune_graph_api::config::ServerConfig;
use tune_graph_api::routes::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::parse();
    let backend = HttpSparqlBackend::new(config.endpoint.clone(), config.request_timeout())
        .context("Failed to build SPARQL client")?;
    tracing::info!(endpoint = %backend.endpoint(), bind = %config.bind, "starting tune graph api");
    let state = AppState::new(Arc::new(backend), config.match_options());

    // Title search answers 503 until a load succeeds; the server starts regardless.
    if state.titles.load(state.backend.as_ref()).await.is_err() {
        tracing::warn!("starting without a title index, title searches will retry the load");
    }
    let _ = state.vocabulary.load(state.backend.as_ref()).await;

    if let Some(interval) = config.refresh_interval() {
        spawn_refresh(state.clone(), interval);
    }

    let app = create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("listening on http://{}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Rebuild the title index and filter vocabulary on a fixed interval.
/// Failures keep the previous data and are logged by the loaders.
fn spawn_refresh(state: AppState, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick fires immediately and startup already loaded
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let _ = state.titles.refresh(state.backend.as_ref()).await;
            let _ = state.vocabulary.load(state.backend.as_ref()).await;
        }
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tune_graph_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
