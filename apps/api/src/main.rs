mod analysis;
mod config;
mod db;
mod documents;
mod errors;
mod llm_client;
mod models;
mod rate_limit;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimiter;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{AnalysisStore, PgAnalysisStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resly API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (optional: without it analyses are not persisted)
    let store: Option<Arc<dyn AnalysisStore>> = match &config.database_url {
        Some(url) => Some(Arc::new(PgAnalysisStore::new(create_pool(url).await?))),
        None => {
            warn!("DATABASE_URL not set; persistence and history are disabled");
            None
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.groq_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let rate_limiter = RateLimiter::new(
        config.rate_limit_max_requests,
        Duration::from_secs(config.rate_limit_window_secs),
    );
    info!(
        "Rate limit: {} requests per {}s",
        config.rate_limit_max_requests, config.rate_limit_window_secs
    );

    // Build app state
    let state = AppState {
        inference: Arc::new(llm),
        store,
        rate_limiter: Arc::new(rate_limiter),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict allowed origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
