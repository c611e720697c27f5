use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::InferenceService;
use crate::rate_limit::RateLimiter;
use crate::store::AnalysisStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable inference backend. Default: `LlmClient` against Groq.
    pub inference: Arc<dyn InferenceService>,
    /// `None` when no database is configured; analyses are then not persisted.
    pub store: Option<Arc<dyn AnalysisStore>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Config,
}
