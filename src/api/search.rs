//! Domain-pinned text search endpoint

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::search::{SearchOptions, SearchResult};

/// Page text cap per result on this endpoint
const PINNED_TEXT_CHARS: usize = 500;

/// Result count ceiling on this endpoint
const MAX_PINNED_RESULTS: usize = 20;

/// Build search router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/", post(search)).with_state(state)
}

/// Search request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    num_results: Option<usize>,
}

/// Search response
#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
    query: String,
}

/// Full-text search restricted to the configured domains
async fn search(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query is required"));
    }
    let provider = state.search.clone().ok_or(ApiError::NotConfigured(
        "Search not configured (missing Exa API key)",
    ))?;

    let options = SearchOptions {
        num_results: request
            .num_results
            .filter(|&n| n > 0)
            .unwrap_or(state.config.search.num_results)
            .min(MAX_PINNED_RESULTS),
        category: None,
        autoprompt: false,
        start_published_date: None,
        live_crawl: false,
        max_chars: PINNED_TEXT_CHARS,
        include_domains: state.config.search.include_domains.clone(),
    };

    let results = provider
        .search_with_contents(&request.query, &options)
        .await
        .map_err(|error| {
            tracing::error!(error = %error, query = %request.query, "pinned search failed");
            ApiError::Upstream("Search failed")
        })?;

    Ok(Json(SearchResponse {
        results,
        query: request.query,
    }))
}
