//! Speech synthesis over dual transports
//!
//! Text reaches `ElevenLabs` either over a persistent stream-input socket
//! (text flows in as the model produces it, audio flows back concurrently)
//! or as one buffered HTTP request over the final text. [`SpeechChannel`]
//! hides which transport is live: callers send text segments and finish,
//! audio frames arrive on the event sender they provided. A socket that
//! cannot be opened within the connect deadline, or that fails mid
//! utterance, degrades to the buffered transport without surfacing to the
//! caller.

mod http;
mod stream;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::Result;
use crate::config::SpeechSettings;

/// One frame from the synthesis backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Raw audio bytes (mp3)
    Audio(Vec<u8>),

    /// Backend confirmed all audio for the sent text was delivered
    Done,

    /// Malformed or error frame; the channel keeps relaying where possible
    Error(String),
}

/// What a finished channel delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechOutcome {
    /// Audio frames handed to the event sender
    pub frames: usize,

    /// True when the streaming socket failed mid-utterance and the
    /// buffered transport produced the audio instead
    pub degraded: bool,
}

/// Voice parameters sent with every synthesis request
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

/// An open synthesis channel: text in, audio out on the event sender
#[async_trait]
pub trait SpeechChannel: Send {
    /// Queue a text segment for synthesis
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel cannot continue at all;
    /// transport failures degrade internally instead.
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Signal end of text and wait for audio delivery to complete
    ///
    /// # Errors
    ///
    /// Returns an error if no transport could produce audio.
    async fn finish(self: Box<Self>) -> Result<SpeechOutcome>;
}

/// Speech synthesis backend
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Open a synthesis channel; audio frames arrive on `events`
    ///
    /// # Errors
    ///
    /// Returns an error if neither transport is available.
    async fn open_channel(
        &self,
        events: mpsc::Sender<SpeechEvent>,
    ) -> Result<Box<dyn SpeechChannel>>;

    /// Synthesize the full text in one buffered request
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// `ElevenLabs`-backed speech synthesis
#[derive(Clone)]
pub struct ElevenLabsSpeech {
    client: reqwest::Client,
    api_key: String,
    host: String,
    voice_id: String,
    model_id: String,
    output_format: String,
    voice_settings: VoiceSettings,
    connect_timeout: Duration,
    synthesis_timeout: Duration,
}

static SHARED: OnceLock<Arc<ElevenLabsSpeech>> = OnceLock::new();

impl ElevenLabsSpeech {
    /// Create a new service from settings
    #[must_use]
    pub fn new(api_key: String, settings: &SpeechSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            host: settings.base_host.clone(),
            voice_id: settings.voice_id.clone(),
            model_id: settings.model_id.clone(),
            output_format: settings.output_format.clone(),
            voice_settings: VoiceSettings {
                stability: settings.stability,
                similarity_boost: settings.similarity_boost,
            },
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            synthesis_timeout: Duration::from_secs(settings.synthesis_timeout_secs),
        }
    }

    /// Process-wide service: constructed on first use, reused thereafter
    #[must_use]
    pub fn shared(api_key: &str, settings: &SpeechSettings) -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new(api_key.to_string(), settings))))
    }
}

#[async_trait]
impl SpeechService for ElevenLabsSpeech {
    async fn open_channel(
        &self,
        events: mpsc::Sender<SpeechEvent>,
    ) -> Result<Box<dyn SpeechChannel>> {
        match stream::StreamChannel::connect(self, events.clone()).await {
            Ok(channel) => Ok(Box::new(channel)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "stream-input connect failed, using buffered synthesis"
                );
                Ok(Box::new(http::BufferedChannel::new(self.clone(), events)))
            }
        }
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        http::synthesize_buffered(self, text).await
    }
}
