//! Buffered HTTP synthesis
//!
//! The fallback transport: one POST carrying the full text. The streaming
//! endpoint variant relays response body chunks as audio frames so the
//! caller still sees incremental delivery; the plain variant returns the
//! whole payload.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

use super::{ElevenLabsSpeech, SpeechChannel, SpeechEvent, SpeechOutcome, VoiceSettings};
use crate::{Error, Result};

#[derive(Serialize)]
struct StreamRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
    output_format: &'a str,
}

#[derive(Serialize)]
struct BufferedRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// Channel that buffers all text and synthesizes once at finish
pub(super) struct BufferedChannel {
    service: ElevenLabsSpeech,
    events: mpsc::Sender<SpeechEvent>,
    text: String,
}

impl BufferedChannel {
    pub(super) fn new(service: ElevenLabsSpeech, events: mpsc::Sender<SpeechEvent>) -> Self {
        Self {
            service,
            events,
            text: String::new(),
        }
    }
}

#[async_trait]
impl SpeechChannel for BufferedChannel {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<SpeechOutcome> {
        let frames = relay_streaming(&self.service, &self.text, &self.events).await?;
        let _ = self.events.send(SpeechEvent::Done).await;
        Ok(SpeechOutcome {
            frames,
            degraded: false,
        })
    }
}

/// Stream synthesized audio for `text`, relaying body chunks as frames
pub(super) async fn relay_streaming(
    service: &ElevenLabsSpeech,
    text: &str,
    events: &mpsc::Sender<SpeechEvent>,
) -> Result<usize> {
    let url = format!(
        "https://{}/v1/text-to-speech/{}/stream",
        service.host, service.voice_id
    );
    let request = StreamRequest {
        text,
        model_id: &service.model_id,
        voice_settings: service.voice_settings,
        output_format: &service.output_format,
    };

    let response = service
        .client
        .post(&url)
        .header("xi-api-key", &service.api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Speech(format!(
            "ElevenLabs streaming error {status}: {body}"
        )));
    }

    let mut body = response.bytes_stream();
    let mut frames = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        frames += 1;
        if events.send(SpeechEvent::Audio(chunk.to_vec())).await.is_err() {
            break;
        }
    }

    tracing::debug!(frames, chars = text.len(), "buffered synthesis relayed");
    Ok(frames)
}

/// Synthesize `text` and return the complete audio payload
pub(super) async fn synthesize_buffered(
    service: &ElevenLabsSpeech,
    text: &str,
) -> Result<Vec<u8>> {
    let url = format!(
        "https://{}/v1/text-to-speech/{}",
        service.host, service.voice_id
    );
    let request = BufferedRequest {
        text,
        model_id: &service.model_id,
        voice_settings: service.voice_settings,
    };

    let response = service
        .client
        .post(&url)
        .header("xi-api-key", &service.api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Speech(format!(
            "ElevenLabs TTS error {status}: {body}"
        )));
    }

    let audio = response.bytes().await?;
    Ok(audio.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeechSettings;

    fn test_service() -> ElevenLabsSpeech {
        ElevenLabsSpeech::new("test-key".to_string(), &SpeechSettings::default())
    }

    #[test]
    fn test_stream_request_shape() {
        let request = StreamRequest {
            text: "hello",
            model_id: "eleven_turbo_v2_5",
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
            output_format: "mp3_22050_32",
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(
            value,
            serde_json::json!({
                "text": "hello",
                "model_id": "eleven_turbo_v2_5",
                "voice_settings": {"stability": 0.5, "similarity_boost": 0.75},
                "output_format": "mp3_22050_32",
            })
        );
    }

    #[test]
    fn test_buffered_request_has_no_output_format() {
        let request = BufferedRequest {
            text: "hello",
            model_id: "eleven_turbo_v2_5",
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert!(value.get("output_format").is_none());
        assert_eq!(value["text"], "hello");
    }

    #[tokio::test]
    async fn test_buffered_channel_accumulates_text() {
        let (tx, _rx) = mpsc::channel(8);
        let mut channel = BufferedChannel::new(test_service(), tx);
        channel.send_text("Hello ").await.expect("send ok");
        channel.send_text("world.").await.expect("send ok");
        assert_eq!(channel.text, "Hello world.");
    }
}
