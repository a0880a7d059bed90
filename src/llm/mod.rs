//! Answer generation via the Gemini streaming API
//!
//! The gateway only needs one LLM operation: stream a short grounded answer
//! for a search query. [`LlmClient`] keeps that seam narrow so handlers and
//! the pipeline can run against a scripted client in tests.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use crate::{Error, Result};

/// A single generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System framing for the model
    pub system: String,

    /// User-turn prompt, including any source material
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Output token cap
    pub max_output_tokens: u32,
}

/// Streaming text generation
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Stream generated text as it arrives from the model
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream request cannot be started. Errors
    /// after the first token surface as items in the stream.
    async fn stream_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<BoxStream<'static, Result<String>>>;

    /// Generate and collect the full text
    ///
    /// # Errors
    ///
    /// Returns an error if the request or any part of the stream fails.
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let mut stream = self.stream_generate(request).await?;
        let mut full = String::new();
        while let Some(chunk) = stream.next().await {
            full.push_str(&chunk?);
        }
        Ok(full)
    }
}

/// Gemini streaming client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

static SHARED: OnceLock<Arc<GeminiClient>> = OnceLock::new();

impl GeminiClient {
    /// Create a new client
    #[must_use]
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    /// Get or create the shared process-wide client
    #[must_use]
    pub fn shared(api_key: &str, model: &str, base_url: &str) -> Arc<Self> {
        SHARED
            .get_or_init(|| {
                Arc::new(Self::new(
                    api_key.to_string(),
                    model.to_string(),
                    base_url.to_string(),
                ))
            })
            .clone()
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn stream_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        );

        tracing::debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            temperature = request.temperature,
            "starting generation stream"
        );

        let response = self
            .client
            .post(&url)
            .json(&request_body(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Gemini error {status}: {body}")));
        }

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(32);
        tokio::spawn(async move {
            let mut upstream = response.bytes_stream();
            // Carry partial lines across chunk boundaries; a data: line can
            // arrive split anywhere, including inside a multi-byte character.
            let mut carry: Vec<u8> = Vec::new();
            while let Some(next) = upstream.next().await {
                match next {
                    Ok(bytes) => {
                        carry.extend_from_slice(&bytes);
                        while let Some(line) = drain_line(&mut carry) {
                            if let Some(text) = chunk_text(&line) {
                                if tx.send(Ok(text)).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Error::Http(e))).await;
                        return;
                    }
                }
            }
            let trailing = String::from_utf8_lossy(&carry).to_string();
            if let Some(text) = chunk_text(trailing.trim_end_matches(['\r', '\n'])) {
                let _ = tx.send(Ok(text)).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

fn request_body(request: &GenerationRequest) -> GeminiRequest<'_> {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user"),
            parts: vec![GeminiPart {
                text: &request.prompt,
            }],
        }],
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: &request.system,
            }],
        }),
        generation_config: GeminiGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<StreamCandidate>,
}

#[derive(Deserialize)]
struct StreamCandidate {
    #[serde(default)]
    content: Option<StreamContent>,
}

#[derive(Deserialize)]
struct StreamContent {
    #[serde(default)]
    parts: Vec<StreamPart>,
}

#[derive(Deserialize)]
struct StreamPart {
    #[serde(default)]
    text: Option<String>,
}

/// Pop one complete line off the front of the carry buffer
fn drain_line(carry: &mut Vec<u8>) -> Option<String> {
    let pos = carry.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = carry.drain(..=pos).collect();
    Some(
        String::from_utf8_lossy(&line)
            .trim_end_matches(['\r', '\n'])
            .to_string(),
    )
}

/// Extract generated text from one SSE line, if it carries any
fn chunk_text(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let chunk: StreamChunk = serde_json::from_str(payload).ok()?;
    let text: String = chunk
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect();
    if text.is_empty() { None } else { Some(text) }
}
