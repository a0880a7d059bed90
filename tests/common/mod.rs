//! Shared test doubles for the upstream provider traits
//!
//! Each stub is scripted at construction and deterministic: no sockets,
//! no timers beyond explicit delays, no shared state between tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use moltsearch_gateway::api::ApiState;
use moltsearch_gateway::llm::{GenerationRequest, LlmClient};
use moltsearch_gateway::search::{SearchOptions, SearchProvider, SearchResult};
use moltsearch_gateway::speech::{SpeechChannel, SpeechEvent, SpeechOutcome, SpeechService};
use moltsearch_gateway::{Config, Error, Result};

/// Build a search result with the given snippet text
#[must_use]
pub fn result(title: &str, url: &str, text: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        url: url.to_string(),
        text: text.to_string(),
        image: None,
        published_date: None,
        score: None,
    }
}

/// A content-bearing result whose snippet clears the substantive threshold
#[must_use]
pub fn full_result(title: &str) -> SearchResult {
    result(
        title,
        "https://moltbook.com/post/1",
        "A long enough snippet about molting to count as real page content.",
    )
}

/// A title-only result, as the fast pass returns them
#[must_use]
pub fn bare_result(title: &str) -> SearchResult {
    result(title, "https://moltbook.com/post/2", "")
}

/// Scripted search provider: each pass returns its canned results, or
/// fails when scripted with `None`
pub struct StubSearch {
    fast: Option<Vec<SearchResult>>,
    content: Option<Vec<SearchResult>>,
    content_delay: Option<Duration>,
}

impl StubSearch {
    #[must_use]
    pub fn new(fast: Vec<SearchResult>, content: Vec<SearchResult>) -> Self {
        Self {
            fast: Some(fast),
            content: Some(content),
            content_delay: None,
        }
    }

    /// Both passes fail
    #[must_use]
    pub fn broken() -> Self {
        Self {
            fast: None,
            content: None,
            content_delay: None,
        }
    }

    /// Fast pass fails, content pass succeeds
    #[must_use]
    pub fn fast_failing(content: Vec<SearchResult>) -> Self {
        Self {
            fast: None,
            content: Some(content),
            content_delay: None,
        }
    }

    /// Delay the content pass, so tests can prove nobody waited for it
    #[must_use]
    pub fn with_content_delay(mut self, delay: Duration) -> Self {
        self.content_delay = Some(delay);
        self
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, _query: &str, _opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.fast
            .clone()
            .ok_or_else(|| Error::Search("scripted fast failure".to_string()))
    }

    async fn search_with_contents(
        &self,
        _query: &str,
        _opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if let Some(delay) = self.content_delay {
            tokio::time::sleep(delay).await;
        }
        self.content
            .clone()
            .ok_or_else(|| Error::Search("scripted content failure".to_string()))
    }
}

/// Scripted LLM: streams its chunks in order, or fails up front
pub struct StubLlm {
    chunks: Vec<String>,
    fail: bool,
}

impl StubLlm {
    #[must_use]
    pub fn speaking(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|chunk| (*chunk).to_string()).collect(),
            fail: false,
        }
    }

    #[must_use]
    pub fn broken() -> Self {
        Self {
            chunks: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn stream_generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        if self.fail {
            return Err(Error::Llm("scripted llm failure".to_string()));
        }
        let chunks = self.chunks.clone();
        Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}

/// Scripted speech backend: the channel emits the canned frames on finish
pub struct StubSpeech {
    frames: Vec<Vec<u8>>,
    fail_open: bool,
    fail_finish: bool,
}

impl StubSpeech {
    #[must_use]
    pub fn with_frames(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames,
            fail_open: false,
            fail_finish: false,
        }
    }

    /// Channel opens but delivers no audio
    #[must_use]
    pub fn silent() -> Self {
        Self::with_frames(Vec::new())
    }

    /// Neither transport is available
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            frames: Vec::new(),
            fail_open: true,
            fail_finish: false,
        }
    }

    /// Channel opens, then synthesis fails at finish
    #[must_use]
    pub fn failing_finish() -> Self {
        Self {
            frames: Vec::new(),
            fail_open: false,
            fail_finish: true,
        }
    }
}

#[async_trait]
impl SpeechService for StubSpeech {
    async fn open_channel(
        &self,
        events: mpsc::Sender<SpeechEvent>,
    ) -> Result<Box<dyn SpeechChannel>> {
        if self.fail_open {
            return Err(Error::Speech("scripted connect failure".to_string()));
        }
        Ok(Box::new(StubChannel {
            events,
            frames: self.frames.clone(),
            fail_finish: self.fail_finish,
        }))
    }

    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        if self.fail_open {
            return Err(Error::Speech("scripted synthesis failure".to_string()));
        }
        Ok(self.frames.concat())
    }
}

struct StubChannel {
    events: mpsc::Sender<SpeechEvent>,
    frames: Vec<Vec<u8>>,
    fail_finish: bool,
}

#[async_trait]
impl SpeechChannel for StubChannel {
    async fn send_text(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<SpeechOutcome> {
        let Self {
            events,
            frames,
            fail_finish,
        } = *self;
        if fail_finish {
            return Err(Error::Speech("scripted finish failure".to_string()));
        }
        let count = frames.len();
        for frame in frames {
            let _ = events.send(SpeechEvent::Audio(frame)).await;
        }
        let _ = events.send(SpeechEvent::Done).await;
        Ok(SpeechOutcome {
            frames: count,
            degraded: false,
        })
    }
}

/// Gateway state with every provider stubbed
#[must_use]
pub fn stub_state(search: StubSearch, llm: StubLlm, speech: StubSpeech) -> Arc<ApiState> {
    Arc::new(ApiState {
        config: Arc::new(Config::default()),
        search: Some(Arc::new(search)),
        llm: Some(Arc::new(llm)),
        speech: Some(Arc::new(speech)),
    })
}

/// Gateway state with no providers configured
#[must_use]
pub fn empty_state() -> Arc<ApiState> {
    Arc::new(ApiState {
        config: Arc::new(Config::default()),
        search: None,
        llm: None,
        speech: None,
    })
}
