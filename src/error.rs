//! Error types for the Moltsearch gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Moltsearch gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Search upstream error
    #[error("search error: {0}")]
    Search(String),

    /// LLM upstream error
    #[error("llm error: {0}")]
    Llm(String),

    /// Speech synthesis error
    #[error("speech error: {0}")]
    Speech(String),

    /// The event stream consumer went away mid-request
    #[error("client disconnected")]
    Disconnected,

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
