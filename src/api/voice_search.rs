//! Voice search endpoints
//!
//! A JSON endpoint for the analyzer-driven search on its own, and the SSE
//! endpoint that runs the whole pipeline: search, spoken answer, audio.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{ApiError, ApiState, EVENT_QUEUE, EventStream, event_stream};
use crate::pipeline::{Pipeline, PipelineRequest, PipelineSettings};
use crate::query;
use crate::search::{SearchOptions, SearchResult};

/// Result count ceiling for voice requests
const MAX_VOICE_RESULTS: usize = 10;

/// Build voice search router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", post(voice_search))
        .route("/stream", post(stream))
        .with_state(state)
}

/// Voice search request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    num_results: Option<usize>,
    #[serde(default)]
    with_contents: bool,
}

/// Voice search response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSearchResponse {
    results: Vec<SearchResult>,
    query: String,
    mode: &'static str,
    has_contents: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    optimized_query: String,
    live_crawl: bool,
}

/// Analyzer-driven search without the answer stages
async fn voice_search(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<VoiceSearchRequest>,
) -> Result<Json<VoiceSearchResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query is required"));
    }
    let provider = state.search.clone().ok_or(ApiError::NotConfigured(
        "Search not configured (missing Exa API key)",
    ))?;

    let plan = query::analyze(&request.query);

    // Quality mode comes from an explicit "auto" request or from the
    // analyzer deciding the query benefits from provider rewriting.
    let quality = request.mode.as_deref() == Some("auto") || plan.autoprompt;

    let options = SearchOptions {
        num_results: request
            .num_results
            .filter(|&n| n > 0)
            .unwrap_or(state.config.search.num_results)
            .min(MAX_VOICE_RESULTS),
        category: plan.category.map(|c| c.as_str().to_string()),
        autoprompt: quality,
        start_published_date: plan.start_published_date.clone(),
        live_crawl: plan.live_crawl,
        max_chars: state.config.search.content_max_chars,
        include_domains: Vec::new(),
    };

    let results = if request.with_contents {
        provider.search_with_contents(&plan.query, &options).await
    } else {
        provider.search(&plan.query, &options).await
    }
    .map_err(|error| {
        tracing::error!(error = %error, query = %plan.query, "voice search failed");
        ApiError::Upstream("Search failed")
    })?;

    Ok(Json(VoiceSearchResponse {
        results,
        query: request.query,
        mode: if quality { "auto" } else { "fast" },
        has_contents: request.with_contents,
        category: plan.category.map(|c| c.as_str().to_string()),
        optimized_query: plan.query,
        live_crawl: plan.live_crawl,
    }))
}

/// Run the full pipeline over one SSE stream
async fn stream(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PipelineRequest>,
) -> Result<EventStream, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query is required"));
    }
    let search = state.search.clone().ok_or(ApiError::NotConfigured(
        "Search not configured (missing Exa API key)",
    ))?;
    let llm = state.llm.clone().ok_or(ApiError::NotConfigured(
        "Answers not configured (missing Gemini API key)",
    ))?;
    let speech = state.speech.clone().ok_or(ApiError::NotConfigured(
        "Speech not configured (missing ElevenLabs API key)",
    ))?;

    let pipeline = Pipeline::new(
        search,
        llm,
        speech,
        PipelineSettings::from(state.config.as_ref()),
    );

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    tokio::spawn(async move { pipeline.run(request, tx).await });
    Ok(event_stream(rx))
}
