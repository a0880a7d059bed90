//! Grounded answer generation
//!
//! Drives the LLM token stream into a bounded, citation-annotated answer.
//! Two variants share the driver: the cited variant writes prose with
//! trailing `[n]` markers for the answer panel, the spoken variant writes
//! a short conversational script for synthesis and is capped by the word
//! budget as it streams. Every fragment passes through the
//! [`CitationBuffer`](citations::CitationBuffer) before anything
//! downstream sees it, so partial markers never leak.
//!
//! The LLM is allowed to fail: any failure substitutes a one-sentence
//! fallback naming the top result, and an empty answer is replaced the
//! same way. Downstream always receives non-empty text.

pub mod budget;
pub mod citations;

use async_trait::async_trait;
use futures::StreamExt;
use url::Url;

use self::budget::{SpeechBudget, Verdict, truncate_words};
use self::citations::{CitationBuffer, clean_answer_text};
use crate::Result;
use crate::llm::{GenerationRequest, LlmClient};
use crate::search::SearchResult;

const CITED_SOURCE_COUNT: usize = 5;
const CITED_EXCERPT_CHARS: usize = 500;
const CITED_TEMPERATURE: f32 = 0.3;
const CITED_MAX_TOKENS: u32 = 300;
// The prompt asks for 100 words; the post-hoc cap allows some slack
// before cutting mid-answer.
const CITED_SOFT_WORDS: usize = 100;
const CITED_HARD_WORDS: usize = 130;

const SPOKEN_SOURCE_COUNT: usize = 3;
const SPOKEN_EXCERPT_CHARS: usize = 200;
const SPOKEN_TEMPERATURE: f32 = 0.8;
const SPOKEN_MAX_TOKENS: u32 = 150;

const CITED_SYSTEM_PROMPT: &str = r#"You are a helpful search assistant for Moltbook, a social network for AI agents. Answer using ONLY the provided SOURCES.

Rules:
- Use ONLY facts from SOURCES. No outside knowledge.
- If SOURCES don't fully answer, summarize what they contain.
- Maximum 100 words. Be concise but informative.
- End on a complete sentence.
- End with citation markers for sources used, like [1] [2].

Style:
- Start with the answer immediately.
- Write natural, clear prose.
- Include specific facts from sources."#;

const SPOKEN_SYSTEM_PROMPT: &str = r#"You are a knowledgeable friend summarizing search results. Speak naturally like you're having a conversation.

CRITICAL RULES:
- ONLY use facts, names, and claims that appear in the search results below. Do NOT add information from your own knowledge.
- If the search results don't contain enough information to answer, say so honestly.
- Cite specifics from the results: mention article titles, sources, or quoted facts.

Style guidelines:
- Start with the answer or insight, not "I found..." or "Based on my search..."
- Talk like a real person - use "So," "Actually," "Looks like," "Interesting—"
- Share 2-3 key findings directly from the results
- Keep it under 60 words (about 12 seconds of speech)
- Sound curious and helpful, not robotic

Bad: "I found 3 results about AI startups. The top results include Anthropic and Mistral."
Good: "So according to TechCrunch, Anthropic just raised another round—they're doubling down on AI safety. And Mistral's going open-source, per The Verge. Pretty competitive space right now.""#;

/// Where cleaned answer fragments go as they are produced
#[async_trait]
pub trait AnswerSink: Send {
    /// Receive one cleaned text fragment
    ///
    /// # Errors
    ///
    /// An error aborts generation; it means the consumer is gone.
    async fn text_chunk(&mut self, chunk: &str) -> Result<()>;
}

/// Final answer produced by a generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutput {
    /// Cleaned full text, markers stripped, whitespace collapsed
    pub full_text: String,

    /// Source indices cited anywhere in the raw output, 1-based
    pub citations: Vec<u32>,

    /// True when the LLM failed or produced nothing and the deterministic
    /// fallback stands in
    pub used_fallback: bool,
}

/// Answer generation over an LLM client
pub struct AnswerStage<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> AnswerStage<'a> {
    #[must_use]
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// Stream a cited answer for the answer panel
    ///
    /// # Errors
    ///
    /// Returns an error only when the sink rejects a fragment; LLM
    /// failures degrade to the fallback answer instead.
    pub async fn run_cited(
        &self,
        query: &str,
        results: &[SearchResult],
        sink: &mut dyn AnswerSink,
    ) -> Result<AnswerOutput> {
        let request = GenerationRequest {
            system: CITED_SYSTEM_PROMPT.to_string(),
            prompt: cited_user_prompt(query, results),
            temperature: CITED_TEMPERATURE,
            max_output_tokens: CITED_MAX_TOKENS,
        };
        let mut output = self.drive(request, query, results, None, sink).await?;
        if !output.used_fallback {
            output.full_text =
                truncate_words(&output.full_text, CITED_SOFT_WORDS, CITED_HARD_WORDS);
        }
        Ok(output)
    }

    /// Stream a short spoken summary, capped by the word budget
    ///
    /// # Errors
    ///
    /// Returns an error only when the sink rejects a fragment; LLM
    /// failures degrade to the fallback answer instead.
    pub async fn run_spoken(
        &self,
        query: &str,
        results: &[SearchResult],
        soft_words: usize,
        hard_words: usize,
        sink: &mut dyn AnswerSink,
    ) -> Result<AnswerOutput> {
        let request = GenerationRequest {
            system: SPOKEN_SYSTEM_PROMPT.to_string(),
            prompt: spoken_user_prompt(query, results),
            temperature: SPOKEN_TEMPERATURE,
            max_output_tokens: SPOKEN_MAX_TOKENS,
        };
        let budget = SpeechBudget::new(soft_words, hard_words);
        self.drive(request, query, results, Some(budget), sink).await
    }

    async fn drive(
        &self,
        request: GenerationRequest,
        query: &str,
        results: &[SearchResult],
        mut budget: Option<SpeechBudget>,
        sink: &mut dyn AnswerSink,
    ) -> Result<AnswerOutput> {
        let spoken = budget.is_some();

        let mut stream = match self.llm.stream_generate(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "generation failed to start, using fallback answer");
                return fallback_answer(query, results, sink).await;
            }
        };

        let mut buffer = CitationBuffer::new();
        let mut emitted = String::new();
        let mut capped = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    let Some(cleaned) = buffer.push(&chunk) else {
                        continue;
                    };
                    if deliver(budget.as_mut(), &cleaned, &mut emitted, sink).await? {
                        capped = true;
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "generation stream failed, using fallback answer");
                    return fallback_answer(query, results, sink).await;
                }
            }
        }

        if !capped && let Some(rest) = buffer.flush() {
            deliver(budget.as_mut(), &rest, &mut emitted, sink).await?;
        }

        let (full, citations) = buffer.finish();
        // The spoken script is what the budget accepted, not everything
        // the model produced past the cap.
        let full_text = if spoken { clean_answer_text(&emitted) } else { full };

        if full_text.is_empty() {
            let fallback = empty_fallback(query);
            sink.text_chunk(&fallback).await?;
            return Ok(AnswerOutput {
                full_text: fallback,
                citations: Vec::new(),
                used_fallback: true,
            });
        }

        Ok(AnswerOutput {
            full_text,
            citations,
            used_fallback: false,
        })
    }
}

/// Route one cleaned fragment through the budget (when present) to the
/// sink; returns true when generation should stop pulling
async fn deliver(
    budget: Option<&mut SpeechBudget>,
    cleaned: &str,
    emitted: &mut String,
    sink: &mut dyn AnswerSink,
) -> Result<bool> {
    let verdict = match budget {
        Some(budget) => budget.offer(cleaned),
        None => Verdict::Take,
    };
    match verdict {
        Verdict::Take => {
            sink.text_chunk(cleaned).await?;
            emitted.push_str(cleaned);
            Ok(false)
        }
        Verdict::TakeAndFinish => {
            sink.text_chunk(cleaned).await?;
            emitted.push_str(cleaned);
            Ok(true)
        }
        Verdict::Discard => Ok(true),
    }
}

async fn fallback_answer(
    query: &str,
    results: &[SearchResult],
    sink: &mut dyn AnswerSink,
) -> Result<AnswerOutput> {
    let text = unavailable_fallback(query, results);
    sink.text_chunk(&text).await?;
    Ok(AnswerOutput {
        full_text: text,
        citations: Vec::new(),
        used_fallback: true,
    })
}

fn unavailable_fallback(query: &str, results: &[SearchResult]) -> String {
    let top_title = results
        .first()
        .map(|r| r.title.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or(query);
    format!("Here's what came up for that. {top_title} looks relevant—check it out below.")
}

fn empty_fallback(query: &str) -> String {
    format!("Looks like there's some interesting stuff on \"{query}\". Check out the results below.")
}

fn cited_user_prompt(query: &str, results: &[SearchResult]) -> String {
    format!(
        "Question: \"{query}\"\n\nSOURCES (use ONLY these):\n{}\n\nRespond in plain text. End with citation markers like [1] [2].",
        cited_sources_block(results)
    )
}

fn spoken_user_prompt(query: &str, results: &[SearchResult]) -> String {
    format!(
        "Someone asked: \"{query}\"\n\nHere are the search results from Exa (use ONLY these as your source of truth):\n{}\n\nRespond naturally in under 60 words, grounding every claim in the results above:",
        spoken_sources_block(results)
    )
}

/// Indexed source blocks for the cited prompt; marker indices refer to
/// these positions
fn cited_sources_block(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(CITED_SOURCE_COUNT)
        .enumerate()
        .map(|(i, r)| {
            let title = if r.title.is_empty() { "Untitled" } else { &r.title };
            let text = if r.text.is_empty() {
                "No excerpt available".to_string()
            } else {
                excerpt(&r.text, CITED_EXCERPT_CHARS)
            };
            format!(
                "[{}] title: {title}\n    domain: {}\n    url: {}\n    date: {}\n    excerpt: {text}",
                i + 1,
                source_domain(&r.url),
                r.url,
                r.published_date.as_deref().unwrap_or("unknown"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn spoken_sources_block(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(SPOKEN_SOURCE_COUNT)
        .enumerate()
        .map(|(i, r)| {
            let text = if r.text.is_empty() {
                "No description".to_string()
            } else {
                excerpt(&r.text, SPOKEN_EXCERPT_CHARS)
            };
            format!("{}. \"{}\"\n   {text}", i + 1, r.title)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn source_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
