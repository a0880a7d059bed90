//! Speech synthesis endpoints
//!
//! Both routes generate the spoken answer first and then voice it: one
//! returns the whole utterance as base64 JSON, the other streams text and
//! audio as they are produced.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Json, Router, extract::State, routing::post};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{ApiError, ApiState, EVENT_QUEUE, EventStream, event_stream};
use crate::Error;
use crate::answer::{AnswerSink, AnswerStage};
use crate::events::StreamEvent;
use crate::pipeline::answer_and_speak;
use crate::search::SearchResult;

/// Build speech router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", post(speak))
        .route("/stream", post(speak_stream))
        .with_state(state)
}

/// Speech request; `results` may be empty but must be present
#[derive(Debug, Deserialize)]
struct SpeakRequest {
    #[serde(default)]
    query: String,
    results: Option<Vec<SearchResult>>,
}

/// One-shot speech response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeakResponse {
    audio: String,
    text: String,
    content_type: &'static str,
}

/// Generate a spoken answer and synthesize it in one buffered request
async fn speak(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query and results are required"));
    }
    let Some(results) = request.results else {
        return Err(ApiError::BadRequest("Query and results are required"));
    };
    let llm = state.llm.clone().ok_or(ApiError::NotConfigured(
        "Answers not configured (missing Gemini API key)",
    ))?;
    let speech = state.speech.clone().ok_or(ApiError::NotConfigured(
        "Speech not configured (missing ElevenLabs API key)",
    ))?;

    let stage = AnswerStage::new(llm.as_ref());
    let mut sink = DiscardSink;
    let output = stage
        .run_spoken(
            &request.query,
            &results,
            state.config.speech.soft_words,
            state.config.speech.hard_words,
            &mut sink,
        )
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "spoken answer failed");
            ApiError::Upstream("Text-to-speech failed")
        })?;

    let audio = speech.synthesize(&output.full_text).await.map_err(|error| {
        tracing::error!(error = %error, "buffered synthesis failed");
        ApiError::Upstream("Text-to-speech failed")
    })?;

    Ok(Json(SpeakResponse {
        audio: base64::engine::general_purpose::STANDARD.encode(&audio),
        text: output.full_text,
        content_type: "audio/mpeg",
    }))
}

/// Stream the spoken answer and its audio over SSE
async fn speak_stream(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SpeakRequest>,
) -> Result<EventStream, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query and results are required"));
    }
    let Some(results) = request.results else {
        return Err(ApiError::BadRequest("Query and results are required"));
    };
    let llm = state.llm.clone().ok_or(ApiError::NotConfigured(
        "Answers not configured (missing Gemini API key)",
    ))?;
    let speech = state.speech.clone().ok_or(ApiError::NotConfigured(
        "Speech not configured (missing ElevenLabs API key)",
    ))?;

    let query = request.query;
    let soft_words = state.config.speech.soft_words;
    let hard_words = state.config.speech.hard_words;

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    tokio::spawn(async move {
        let run = answer_and_speak(
            llm.as_ref(),
            speech.as_ref(),
            &query,
            &results,
            soft_words,
            hard_words,
            &tx,
        )
        .await;

        match run {
            Ok(()) => {
                let _ = tx.send(StreamEvent::Done {}).await;
            }
            Err(Error::Disconnected) => {
                tracing::debug!(%query, "client disconnected mid-synthesis");
            }
            Err(error) => {
                tracing::warn!(error = %error, %query, "speech stream failed");
                let _ = tx.send(StreamEvent::error("Text-to-speech failed")).await;
            }
        }
    });
    Ok(event_stream(rx))
}

/// Sink for callers that only need the final text
struct DiscardSink;

#[async_trait]
impl AnswerSink for DiscardSink {
    async fn text_chunk(&mut self, _chunk: &str) -> crate::Result<()> {
        Ok(())
    }
}
