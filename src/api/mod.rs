//! HTTP API for the Moltsearch gateway
//!
//! JSON endpoints for direct search and one-shot synthesis, SSE endpoints
//! for everything that streams. Each streaming handler spawns its producer
//! onto the runtime and hands the receiving half of an event channel to the
//! SSE encoder, so a disconnecting client tears the producer down through
//! channel closure rather than cancellation.

pub mod answer;
pub mod health;
pub mod search;
pub mod speech;
pub mod voice_search;

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::Config;
use crate::events::StreamEvent;
use crate::llm::{GeminiClient, LlmClient};
use crate::search::{ExaSearch, SearchProvider};
use crate::speech::{ElevenLabsSpeech, SpeechService};

/// Events buffered between a producer task and the SSE encoder
pub(crate) const EVENT_QUEUE: usize = 64;

/// Shared state for API handlers
///
/// Providers are `None` when their API key is absent; the routes that need
/// them answer 503 instead of failing at startup.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub speech: Option<Arc<dyn SpeechService>>,
}

impl ApiState {
    /// Wire up upstream providers from configuration
    #[must_use]
    pub fn from_config(config: Arc<Config>) -> Self {
        let search = config
            .api_keys
            .exa
            .as_deref()
            .map(|key| ExaSearch::shared(key, &config.search.base_url) as Arc<dyn SearchProvider>);

        let llm = config.api_keys.gemini.as_deref().map(|key| {
            GeminiClient::shared(key, &config.llm.model, &config.llm.base_url) as Arc<dyn LlmClient>
        });

        let speech = config
            .api_keys
            .elevenlabs
            .as_deref()
            .map(|key| ElevenLabsSpeech::shared(key, &config.speech) as Arc<dyn SpeechService>);

        Self {
            config,
            search,
            llm,
            speech,
        }
    }
}

/// API errors, serialized as `{"error": message}` like every endpoint here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// Request body failed validation
    BadRequest(&'static str),

    /// The upstream provider for this route has no API key
    NotConfigured(&'static str),

    /// The upstream call failed; details go to the log, not the client
    Upstream(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: &'static str,
        }

        let (status, error) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotConfigured(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Upstream(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Boxed SSE response shared by the streaming endpoints
pub(crate) type EventStream = Sse<
    KeepAliveStream<Pin<Box<dyn Stream<Item = std::result::Result<Event, Infallible>> + Send>>>,
>;

/// Adapt a stream-event receiver into an SSE response with keepalives
pub(crate) fn event_stream(rx: mpsc::Receiver<StreamEvent>) -> EventStream {
    let stream: Pin<Box<dyn Stream<Item = std::result::Result<Event, Infallible>> + Send>> =
        Box::pin(ReceiverStream::new(rx).map(|event| Ok(event.into_sse())));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let router = Router::new()
        .nest("/api/search", search::router(state.clone()))
        .nest("/api/voice-search", voice_search::router(state.clone()))
        .nest("/api/answer", answer::router(state.clone()))
        .nest("/api/speech", speech::router(state))
        .merge(health::router());

    // CORS layer for cross-origin requests from the web client
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: Arc<ApiState>) -> Self {
        let host = state.config.server.host.clone();
        let port = state.config.server.port;
        Self { state, host, port }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(%addr, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
