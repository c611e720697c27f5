//! Axum route handlers for the Analysis API.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, Query, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use bytes::Bytes;
use futures::{future, stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::contract::CanonicalResult;
use crate::analysis::input::AnalysisInput;
use crate::analysis::legacy::{to_legacy, LegacyResult};
use crate::analysis::orchestrator::analyze_with_retries;
use crate::analysis::robustness::audit;
use crate::analysis::streaming::{stream_analysis, AnalysisEvent};
use crate::documents::extract_pdf_text;
use crate::errors::AppError;
use crate::models::analysis::HistoryEntry;
use crate::rate_limit;
use crate::state::AppState;
use crate::store::{history_page, AnalysisStore};

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub resume_text: String,
    pub job_description: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

struct UploadForm {
    resume: Bytes,
    job_description: String,
    user_id: Option<Uuid>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// JSON body with already-extracted resume text. `?stream=true` switches the
/// response to server-sent events.
pub async fn handle_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AnalyzeQuery>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, AppError> {
    enforce_rate_limit(&state, &headers)?;

    let input = AnalysisInput::new(request.resume_text, request.job_description)?;
    respond(state, input, request.user_id, query.stream).await
}

/// POST /api/v1/analyze/upload
///
/// Multipart form: `resume` (PDF), `jobDescription`, optional `userId`.
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AnalyzeQuery>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    enforce_rate_limit(&state, &headers)?;

    let form = read_upload_form(multipart).await?;
    let resume_text = extract_pdf_text(form.resume).await?;
    let input = AnalysisInput::new(resume_text, form.job_description)?;
    respond(state, input, form.user_id, query.stream).await
}

/// GET /api/v1/history
///
/// Saved analyses for a user, newest first. Empty without a user or a database.
pub async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let (Some(user_id), Some(store)) = (query.user_id, state.store.as_ref()) else {
        return Ok(Json(Vec::new()));
    };

    let (limit, offset) = history_page(query.limit, query.offset);
    let entries = store.history(user_id, limit, offset).await?;
    Ok(Json(entries))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn enforce_rate_limit(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let key = rate_limit::identifier(headers);
    let status = state.rate_limiter.check(&key);
    if !status.allowed {
        warn!("Rate limit exceeded for {key}");
        return Err(AppError::RateLimited {
            retry_after_secs: status.retry_after_secs(),
        });
    }
    Ok(())
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut resume = None;
    let mut job_description = None;
    let mut user_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                if let Some(content_type) = field.content_type() {
                    if content_type != "application/pdf" {
                        return Err(AppError::Validation(
                            "Upload a PDF file (.pdf)".to_string(),
                        ));
                    }
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read resume: {e}")))?;
                resume = Some(data);
            }
            "jobDescription" => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read jobDescription: {e}"))
                })?;
                job_description = Some(text);
            }
            "userId" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read userId: {e}")))?;
                let parsed = raw
                    .trim()
                    .parse::<Uuid>()
                    .map_err(|_| AppError::Validation("userId must be a UUID".to_string()))?;
                user_id = Some(parsed);
            }
            _ => {}
        }
    }

    Ok(UploadForm {
        resume: resume.ok_or_else(|| AppError::Validation("Resume file is required".to_string()))?,
        job_description: job_description
            .ok_or_else(|| AppError::Validation("Job description is required".to_string()))?,
        user_id,
    })
}

async fn respond(
    state: AppState,
    input: AnalysisInput,
    user_id: Option<Uuid>,
    stream: bool,
) -> Result<Response, AppError> {
    if stream {
        return Ok(stream_response(state, input, user_id));
    }

    let started = Instant::now();
    let outcome = analyze_with_retries(
        state.inference.as_ref(),
        &input,
        state.config.analysis_max_retries,
    )
    .await;

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            info!(
                "POST /api/v1/analyze failed after {}ms: {e}",
                started.elapsed().as_millis()
            );
            return Err(e.into());
        }
    };

    let legacy = finish(state.store.as_deref(), user_id, &input, &result).await;
    info!(
        "POST /api/v1/analyze completed in {}ms (match_score={}, ats_score={})",
        started.elapsed().as_millis(),
        result.match_score,
        result.ats_score
    );
    Ok(Json(legacy).into_response())
}

/// SSE body: one `processing` event, a `progress` event per partial result,
/// then `complete` with the legacy result or a single `error` event.
fn stream_response(state: AppState, input: AnalysisInput, user_id: Option<Uuid>) -> Response {
    let started = Instant::now();
    let analysis = stream_analysis(state.inference.clone(), &input);
    let store = state.store.clone();
    let input = Arc::new(input);

    let updates = analysis.then(move |item| {
        let store = store.clone();
        let input = input.clone();
        async move {
            match item {
                Ok(AnalysisEvent::Partial(partial)) => {
                    json!({ "status": "progress", "data": partial })
                }
                Ok(AnalysisEvent::Complete(result)) => {
                    let legacy = finish(store.as_deref(), user_id, &input, &result).await;
                    info!(
                        "Streaming analysis completed in {}ms",
                        started.elapsed().as_millis()
                    );
                    json!({ "status": "complete", "data": legacy })
                }
                Err(e) => {
                    let (_, code, message) = AppError::from(e).parts();
                    json!({ "status": "error", "error": code, "message": message })
                }
            }
        }
    });

    let processing = json!({ "status": "processing", "message": "Analyzing resume..." });
    let events = stream::once(future::ready(processing))
        .chain(updates)
        .map(|payload: Value| Event::default().json_data(payload));

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Post-validation steps shared by both response modes: diagnostics,
/// best-effort persistence, legacy conversion.
async fn finish(
    store: Option<&dyn AnalysisStore>,
    user_id: Option<Uuid>,
    input: &AnalysisInput,
    result: &CanonicalResult,
) -> LegacyResult {
    let report = audit(result);
    if !report.valid {
        warn!("Analysis robustness issues: {}", report.issues.join("; "));
    }

    if let (Some(store), Some(user_id)) = (store, user_id) {
        if let Err(e) = store.save(user_id, input, result).await {
            error!("Failed to persist analysis for user {user_id}: {e}");
        }
    }

    to_legacy(result)
}
