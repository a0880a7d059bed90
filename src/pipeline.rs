//! Voice search pipeline
//!
//! One request, one event stream: fast results for instant display, a
//! content-bearing search racing alongside, a spoken answer streamed as it
//! generates, and synthesized audio trailing the text. The orchestrator owns
//! stage progression and the stream ordering rules; the stages themselves
//! live in [`crate::search`], [`crate::answer`], and [`crate::speech`].
//!
//! Failure policy: search failures degrade to empty result sets, LLM
//! failures degrade to a fallback sentence inside the answer stage, and
//! speech failures surface as a terminal `error` event after the text has
//! already been delivered. Only a client disconnect stops the work silently.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::answer::{AnswerSink, AnswerStage};
use crate::config::Config;
use crate::events::{AnswerSource, StreamEvent};
use crate::llm::LlmClient;
use crate::query::{self, QueryPlan};
use crate::search::{MIN_SNIPPET_CHARS, SearchOptions, SearchProvider, SearchResult};
use crate::speech::{SpeechChannel, SpeechEvent, SpeechService};
use crate::{Error, Result};

/// Upper bound on results per voice request
const MAX_RESULTS: usize = 10;

/// Speech frame queue depth. The synthesizer can produce audio while the
/// answer is still streaming, and nothing drains until `textDone` goes out.
const SPEECH_QUEUE: usize = 256;

/// One voice search request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    /// Raw (possibly transcribed) query text
    pub query: String,

    /// Requested result count; zero or missing means the configured default
    #[serde(default)]
    pub num_results: Option<usize>,

    /// Results the client already holds from an earlier fast search,
    /// displayed without a refetch
    #[serde(default)]
    pub fast_results: Option<Vec<SearchResult>>,
}

/// Pipeline tunables lifted out of [`Config`]
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Default result count
    pub num_results: usize,

    /// Page text cap for the content-bearing search
    pub content_max_chars: usize,

    /// Soft word limit for the spoken answer
    pub soft_words: usize,

    /// Hard word limit for the spoken answer
    pub hard_words: usize,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            num_results: config.search.num_results,
            content_max_chars: config.search.content_max_chars,
            soft_words: config.speech.soft_words,
            hard_words: config.speech.hard_words,
        }
    }
}

/// Orchestrates one voice search end to end
pub struct Pipeline {
    search: Arc<dyn SearchProvider>,
    llm: Arc<dyn LlmClient>,
    speech: Arc<dyn SpeechService>,
    settings: PipelineSettings,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        search: Arc<dyn SearchProvider>,
        llm: Arc<dyn LlmClient>,
        speech: Arc<dyn SpeechService>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            search,
            llm,
            speech,
            settings,
        }
    }

    /// Run the pipeline, emitting events on `tx` until a terminal event.
    ///
    /// Failures become a terminal `error` event on the stream; a closed
    /// `tx` means the client went away and stops the work quietly.
    pub async fn run(&self, request: PipelineRequest, tx: mpsc::Sender<StreamEvent>) {
        match self.drive(&request, &tx).await {
            Ok(()) => {}
            Err(Error::Disconnected) => {
                tracing::debug!(query = %request.query, "client disconnected mid-stream");
            }
            Err(error) => {
                tracing::warn!(error = %error, query = %request.query, "pipeline failed");
                let _ = tx.send(StreamEvent::error(error.to_string())).await;
            }
        }
    }

    async fn drive(&self, request: &PipelineRequest, tx: &mpsc::Sender<StreamEvent>) -> Result<()> {
        let plan = query::analyze(&request.query);
        let num_results = request
            .num_results
            .filter(|&n| n > 0)
            .unwrap_or(self.settings.num_results)
            .min(MAX_RESULTS);

        tracing::info!(
            query = %request.query,
            optimized = %plan.query,
            num_results,
            "voice search started"
        );

        // Dispatched before the fast phase so its latency overlaps instant
        // display and answer setup.
        let content_task = self.spawn_content_search(&plan, num_results);

        let fast = self.fast_results(request, &plan, num_results).await;
        if !fast.is_empty() {
            let event = StreamEvent::SearchResults {
                results: fast.clone(),
                query: plan.query.clone(),
            };
            emit(tx, event).await?;
        }

        let mut results = fast;
        let source = if has_snippet_text(&results) {
            content_task.abort();
            AnswerSource::Fast
        } else {
            let content = await_content(content_task).await;
            if content.is_empty() {
                if results.is_empty() {
                    emit(
                        tx,
                        StreamEvent::SearchResults {
                            results: Vec::new(),
                            query: plan.query.clone(),
                        },
                    )
                    .await?;
                    emit(tx, StreamEvent::Done {}).await?;
                    tracing::info!(query = %plan.query, "no results, stream closed early");
                    return Ok(());
                }
                // Title-only grounding; the answer stage copes with it.
                AnswerSource::Fast
            } else {
                let event = StreamEvent::SearchResults {
                    results: content.clone(),
                    query: plan.query.clone(),
                };
                emit(tx, event).await?;
                results = content;
                AnswerSource::Content
            }
        };

        emit(tx, StreamEvent::LlmStart { source }).await?;

        answer_and_speak(
            self.llm.as_ref(),
            self.speech.as_ref(),
            &request.query,
            &results,
            self.settings.soft_words,
            self.settings.hard_words,
            tx,
        )
        .await?;

        emit(tx, StreamEvent::Done {}).await?;
        tracing::info!(query = %plan.query, "voice search complete");
        Ok(())
    }

    /// Caller-supplied fast results when present, else a title-only search.
    /// A search failure degrades to an empty set.
    async fn fast_results(
        &self,
        request: &PipelineRequest,
        plan: &QueryPlan,
        num_results: usize,
    ) -> Vec<SearchResult> {
        if let Some(results) = &request.fast_results
            && !results.is_empty()
        {
            tracing::debug!(count = results.len(), "reusing caller-supplied fast results");
            return results.clone();
        }

        match self
            .search
            .search(&plan.query, &self.search_options(plan, num_results))
            .await
        {
            Ok(results) => results,
            Err(error) => {
                tracing::warn!(error = %error, "fast search failed");
                Vec::new()
            }
        }
    }

    fn spawn_content_search(
        &self,
        plan: &QueryPlan,
        num_results: usize,
    ) -> JoinHandle<Result<Vec<SearchResult>>> {
        let search = Arc::clone(&self.search);
        let options = self.search_options(plan, num_results);
        let query = plan.query.clone();
        tokio::spawn(async move { search.search_with_contents(&query, &options).await })
    }

    fn search_options(&self, plan: &QueryPlan, num_results: usize) -> SearchOptions {
        SearchOptions {
            num_results,
            category: plan.category.map(|c| c.as_str().to_string()),
            autoprompt: plan.autoprompt,
            start_published_date: plan.start_published_date.clone(),
            live_crawl: plan.live_crawl,
            max_chars: self.settings.content_max_chars,
            include_domains: Vec::new(),
        }
    }
}

/// Stream a spoken answer and its audio onto `tx`.
///
/// Emits `text` fragments as they pass the budget gate, `textDone` once the
/// answer is final, then `audio` frames until the synthesizer drains.
/// Terminal events stay with the caller. A speech channel that cannot open
/// degrades to text only; its open error resurfaces after `textDone`, so
/// the delivered text always stands.
pub(crate) async fn answer_and_speak(
    llm: &dyn LlmClient,
    speech: &dyn SpeechService,
    query: &str,
    results: &[SearchResult],
    soft_words: usize,
    hard_words: usize,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<()> {
    let (speech_tx, mut speech_rx) = mpsc::channel(SPEECH_QUEUE);
    let mut channel = speech.open_channel(speech_tx).await.inspect_err(
        |error| tracing::warn!(error = %error, "speech channel unavailable, text only"),
    );

    let stage = AnswerStage::new(llm);
    let mut sink = StreamSink::new(tx, channel.as_mut().ok().map(|channel| &mut **channel));
    let output = stage
        .run_spoken(query, results, soft_words, hard_words, &mut sink)
        .await?;

    tracing::debug!(
        chars = output.full_text.len(),
        citations = output.citations.len(),
        fallback = output.used_fallback,
        "answer stage complete"
    );
    emit(
        tx,
        StreamEvent::TextDone {
            full_text: output.full_text,
            citations: output.citations,
        },
    )
    .await?;

    // From here on the text stands; anything that goes wrong is a
    // speech-stage failure.
    let channel = channel?;

    let drain = async {
        let mut relayed = 0_usize;
        let mut client_gone = false;
        while let Some(event) = speech_rx.recv().await {
            match event {
                SpeechEvent::Audio(bytes) if !client_gone => {
                    if tx.send(StreamEvent::audio(&bytes)).await.is_ok() {
                        relayed += 1;
                    } else {
                        client_gone = true;
                        speech_rx.close();
                    }
                }
                SpeechEvent::Audio(_) | SpeechEvent::Done => {}
                SpeechEvent::Error(message) => {
                    tracing::warn!(%message, "speech transport reported an error");
                }
            }
        }
        (relayed, client_gone)
    };

    let (outcome, (relayed, client_gone)) = tokio::join!(channel.finish(), drain);
    if client_gone {
        return Err(Error::Disconnected);
    }
    let outcome = outcome?;

    tracing::debug!(
        frames = outcome.frames,
        relayed,
        degraded = outcome.degraded,
        "speech synthesis finished"
    );
    if outcome.frames == 0 {
        return Err(Error::Speech("no audio frames received".to_string()));
    }
    Ok(())
}

async fn await_content(task: JoinHandle<Result<Vec<SearchResult>>>) -> Vec<SearchResult> {
    match task.await {
        Ok(Ok(results)) => results,
        Ok(Err(error)) => {
            tracing::warn!(error = %error, "content search failed");
            Vec::new()
        }
        Err(error) => {
            tracing::warn!(error = %error, "content search task failed");
            Vec::new()
        }
    }
}

/// Send one event; a closed channel means the client went away
pub(crate) async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<()> {
    tx.send(event).await.map_err(|_| Error::Disconnected)
}

/// At least one result carries enough snippet text to ground the answer
fn has_snippet_text(results: &[SearchResult]) -> bool {
    results
        .iter()
        .any(|r| r.text.trim().chars().count() >= MIN_SNIPPET_CHARS)
}

/// Fans cleaned answer fragments out to the client and the speech channel
pub(crate) struct StreamSink<'a, 'b> {
    tx: &'a mpsc::Sender<StreamEvent>,
    speech: Option<&'b mut (dyn SpeechChannel + 'static)>,
}

impl<'a, 'b> StreamSink<'a, 'b> {
    pub(crate) fn new(
        tx: &'a mpsc::Sender<StreamEvent>,
        speech: Option<&'b mut (dyn SpeechChannel + 'static)>,
    ) -> Self {
        Self { tx, speech }
    }
}

#[async_trait]
impl AnswerSink for StreamSink<'_, '_> {
    async fn text_chunk(&mut self, chunk: &str) -> Result<()> {
        emit(
            self.tx,
            StreamEvent::Text {
                chunk: chunk.to_string(),
            },
        )
        .await?;

        if let Some(channel) = self.speech.as_mut() {
            // A rejected fragment degrades speech, never the text stream.
            if let Err(error) = channel.send_text(chunk).await {
                tracing::warn!(error = %error, "speech channel rejected fragment");
            }
        }
        Ok(())
    }
}
