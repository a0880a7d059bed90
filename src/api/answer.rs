//! Cited answer endpoint
//!
//! Streams an answer over caller-supplied results, with citation markers
//! resolved against their order. No search and no audio; the voice pipeline
//! has its own route.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{ApiError, ApiState, EVENT_QUEUE, EventStream, event_stream};
use crate::Error;
use crate::answer::AnswerStage;
use crate::events::StreamEvent;
use crate::llm::LlmClient;
use crate::pipeline::{StreamSink, emit};
use crate::search::SearchResult;

/// Build answer router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/", post(answer)).with_state(state)
}

/// Answer request
#[derive(Debug, Deserialize)]
struct AnswerRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Stream a cited answer over the supplied results
async fn answer(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AnswerRequest>,
) -> Result<EventStream, ApiError> {
    if request.query.trim().is_empty() || request.results.is_empty() {
        return Err(ApiError::BadRequest("Query and results are required"));
    }
    let llm = state.llm.clone().ok_or(ApiError::NotConfigured(
        "Answers not configured (missing Gemini API key)",
    ))?;

    let AnswerRequest { query, results } = request;
    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    tokio::spawn(generate(llm, query, results, tx));
    Ok(event_stream(rx))
}

/// Drive the cited answer stage and close the stream with a terminal event
async fn generate(
    llm: Arc<dyn LlmClient>,
    query: String,
    results: Vec<SearchResult>,
    tx: mpsc::Sender<StreamEvent>,
) {
    let stage = AnswerStage::new(llm.as_ref());
    let mut sink = StreamSink::new(&tx, None);

    let outcome = async {
        let output = stage.run_cited(&query, &results, &mut sink).await?;
        emit(
            &tx,
            StreamEvent::TextDone {
                full_text: output.full_text,
                citations: output.citations,
            },
        )
        .await?;
        emit(&tx, StreamEvent::Done {}).await
    }
    .await;

    match outcome {
        Ok(()) => {}
        Err(Error::Disconnected) => {
            tracing::debug!(%query, "client disconnected mid-answer");
        }
        Err(error) => {
            tracing::warn!(error = %error, %query, "answer stream failed");
            let _ = tx.send(StreamEvent::error(error.to_string())).await;
        }
    }
}
