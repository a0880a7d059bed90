//! Named-event stream wire model
//!
//! Every streaming endpoint speaks the same chunked protocol: one named
//! event per frame, `event: <name>` followed by a `data: <json>` payload.
//! Ordering rules for a well-formed stream:
//!
//! - `searchResults` comes before (or interleaved with) `text`, never after
//!   the terminal event
//! - every `text` precedes `textDone`; `audio` only appears after `textDone`
//! - the stream ends with exactly one `done` or one `error`

use axum::response::sse::Event;
use base64::Engine;
use serde::Serialize;

use crate::search::SearchResult;

/// Which result set fed the answer stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    /// Instant title-only results (or caller-supplied results)
    Fast,
    /// Content-bearing search results
    Content,
}

/// One event on an outbound stream
///
/// Serializes to the `data:` payload only; the event name travels in the
/// SSE `event:` field (see [`StreamEvent::name`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    /// Results ready for display
    SearchResults {
        results: Vec<SearchResult>,
        query: String,
    },

    /// Answer generation started
    LlmStart { source: AnswerSource },

    /// Cleaned partial answer text
    Text { chunk: String },

    /// Answer complete
    #[serde(rename_all = "camelCase")]
    TextDone {
        full_text: String,
        citations: Vec<u32>,
    },

    /// Base64-encoded audio chunk
    Audio { chunk: String },

    /// Terminal failure
    Error { error: String },

    /// Terminal success
    Done {},
}

impl StreamEvent {
    /// SSE event name for this variant
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SearchResults { .. } => "searchResults",
            Self::LlmStart { .. } => "llmStart",
            Self::Text { .. } => "text",
            Self::TextDone { .. } => "textDone",
            Self::Audio { .. } => "audio",
            Self::Error { .. } => "error",
            Self::Done {} => "done",
        }
    }

    /// Build an audio event from raw bytes
    #[must_use]
    pub fn audio(bytes: &[u8]) -> Self {
        Self::Audio {
            chunk: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Build an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Convert into an SSE wire event
    #[must_use]
    pub fn into_sse(self) -> Event {
        let name = self.name();
        Event::default()
            .event(name)
            .json_data(&self)
            .unwrap_or_else(|_| Event::default().event(name).data("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(event: &StreamEvent) -> serde_json::Value {
        serde_json::to_value(event).expect("serializable")
    }

    #[test]
    fn test_event_names() {
        assert_eq!(StreamEvent::Done {}.name(), "done");
        assert_eq!(StreamEvent::error("boom").name(), "error");
        assert_eq!(
            StreamEvent::Text {
                chunk: "hi".to_string()
            }
            .name(),
            "text"
        );
    }

    #[test]
    fn test_text_done_payload_shape() {
        let event = StreamEvent::TextDone {
            full_text: "Answer.".to_string(),
            citations: vec![1, 3],
        };
        let value = payload(&event);
        assert_eq!(value["fullText"], "Answer.");
        assert_eq!(value["citations"], serde_json::json!([1, 3]));
    }

    #[test]
    fn test_done_payload_is_empty_object() {
        assert_eq!(payload(&StreamEvent::Done {}), serde_json::json!({}));
    }

    #[test]
    fn test_audio_chunk_is_base64() {
        let event = StreamEvent::audio(&[0xff, 0x00, 0x10]);
        let StreamEvent::Audio { chunk } = &event else {
            panic!("expected audio event");
        };
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(chunk)
            .expect("valid base64");
        assert_eq!(decoded, vec![0xff, 0x00, 0x10]);
    }

    #[test]
    fn test_llm_start_source_is_lowercase() {
        let value = payload(&StreamEvent::LlmStart {
            source: AnswerSource::Content,
        });
        assert_eq!(value["source"], "content");
    }
}
