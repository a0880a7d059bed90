//! Stream-input synthesis over a persistent WebSocket
//!
//! The socket speaks the `ElevenLabs` stream-input protocol: one voice
//! frame up front, then text frames as segments arrive, then an empty
//! text frame to flush. Audio comes back as base64 frames on the same
//! socket, ending with an `isFinal` frame. Reading runs in its own task
//! so audio drains while the caller is still producing text.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use futures::stream::{SplitSink, SplitStream};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{ElevenLabsSpeech, SpeechChannel, SpeechEvent, SpeechOutcome, VoiceSettings, http};
use crate::{Error, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel over the stream-input socket
pub(super) struct StreamChannel {
    service: ElevenLabsSpeech,
    writer: SplitSink<Socket, Message>,
    reader: tokio::task::JoinHandle<()>,
    events: mpsc::Sender<SpeechEvent>,
    frames: Arc<AtomicUsize>,
    /// Everything sent so far, kept for the degraded fallback
    sent: String,
    degraded: bool,
}

impl StreamChannel {
    /// Connect and send the voice frame, bounded by the connect deadline
    pub(super) async fn connect(
        service: &ElevenLabsSpeech,
        events: mpsc::Sender<SpeechEvent>,
    ) -> Result<Self> {
        let url = format!(
            "wss://{}/v1/text-to-speech/{}/stream-input?model_id={}&output_format={}",
            service.host, service.voice_id, service.model_id, service.output_format
        );

        let (socket, _) = tokio::time::timeout(service.connect_timeout, connect_async(&url))
            .await
            .map_err(|_| {
                Error::Speech(format!(
                    "stream-input connect timed out after {}s",
                    service.connect_timeout.as_secs()
                ))
            })??;

        let (mut writer, read_half) = socket.split();
        writer
            .send(Message::text(bos_frame(
                service.voice_settings,
                &service.api_key,
            )))
            .await?;

        let frames = Arc::new(AtomicUsize::new(0));
        let reader = tokio::spawn(relay_frames(read_half, events.clone(), Arc::clone(&frames)));

        tracing::debug!(voice = %service.voice_id, "stream-input channel open");

        Ok(Self {
            service: service.clone(),
            writer,
            reader,
            events,
            frames,
            sent: String::new(),
            degraded: false,
        })
    }
}

#[async_trait]
impl SpeechChannel for StreamChannel {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sent.push_str(text);
        if self.degraded {
            return Ok(());
        }
        if let Err(e) = self.writer.send(Message::text(text_frame(text))).await {
            tracing::warn!(error = %e, "stream-input send failed, degrading to buffered synthesis");
            self.degraded = true;
        }
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<SpeechOutcome> {
        if !self.degraded
            && let Err(e) = self.writer.send(Message::text(eos_frame())).await
        {
            tracing::warn!(error = %e, "stream-input flush failed, degrading to buffered synthesis");
            self.degraded = true;
        }

        if self.degraded {
            self.reader.abort();
            let relayed = self.frames.load(Ordering::Relaxed);
            let fallback = http::relay_streaming(&self.service, &self.sent, &self.events).await?;
            let _ = self.events.send(SpeechEvent::Done).await;
            return Ok(SpeechOutcome {
                frames: relayed + fallback,
                degraded: true,
            });
        }

        match tokio::time::timeout(self.service.synthesis_timeout, &mut self.reader).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Speech(format!("audio relay task failed: {e}"))),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.service.synthesis_timeout.as_secs(),
                    "audio completion signal never arrived, closing channel"
                );
                self.reader.abort();
            }
        }
        let _ = self.writer.close().await;
        Ok(SpeechOutcome {
            frames: self.frames.load(Ordering::Relaxed),
            degraded: false,
        })
    }
}

/// Incoming socket frame
#[derive(Debug, Deserialize)]
struct IncomingFrame {
    #[serde(default)]
    audio: Option<String>,

    #[serde(default, rename = "isFinal")]
    is_final: Option<bool>,

    #[serde(default)]
    message: Option<String>,
}

/// Relay incoming audio frames onto the event sender until final or closed
async fn relay_frames(
    mut read_half: SplitStream<Socket>,
    events: mpsc::Sender<SpeechEvent>,
    frames: Arc<AtomicUsize>,
) {
    while let Some(next) = read_half.next().await {
        match next {
            Ok(Message::Text(payload)) => {
                let frame: IncomingFrame = match serde_json::from_str(payload.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        let _ = events
                            .send(SpeechEvent::Error(format!("malformed frame: {e}")))
                            .await;
                        continue;
                    }
                };
                if let Some(b64) = frame.audio.filter(|a| !a.is_empty()) {
                    match STANDARD.decode(&b64) {
                        Ok(bytes) => {
                            frames.fetch_add(1, Ordering::Relaxed);
                            if events.send(SpeechEvent::Audio(bytes)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = events
                                .send(SpeechEvent::Error(format!("undecodable audio frame: {e}")))
                                .await;
                        }
                    }
                }
                if let Some(message) = frame.message {
                    let _ = events.send(SpeechEvent::Error(message)).await;
                }
                if frame.is_final == Some(true) {
                    let _ = events.send(SpeechEvent::Done).await;
                    return;
                }
            }
            Ok(Message::Close(_)) => return,
            Ok(_) => {}
            Err(e) => {
                let _ = events
                    .send(SpeechEvent::Error(format!("socket read failed: {e}")))
                    .await;
                return;
            }
        }
    }
}

fn bos_frame(settings: VoiceSettings, api_key: &str) -> String {
    serde_json::json!({
        "text": " ",
        "voice_settings": settings,
        "xi_api_key": api_key,
    })
    .to_string()
}

fn text_frame(text: &str) -> String {
    serde_json::json!({
        "text": text,
        "try_trigger_generation": true,
    })
    .to_string()
}

fn eos_frame() -> String {
    serde_json::json!({ "text": "" }).to_string()
}
