//! End-to-end pipeline tests over stubbed upstreams
//!
//! Each test runs one request through [`Pipeline::run`] and asserts on the
//! resulting event sequence: which events appear, in what order, and what
//! the terminal event is.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use common::{StubLlm, StubSearch, StubSpeech, bare_result, full_result};
use moltsearch_gateway::events::{AnswerSource, StreamEvent};
use moltsearch_gateway::{Pipeline, PipelineRequest, PipelineSettings};

fn settings() -> PipelineSettings {
    PipelineSettings {
        num_results: 5,
        content_max_chars: 1000,
        soft_words: 60,
        hard_words: 90,
    }
}

fn request(query: &str) -> PipelineRequest {
    PipelineRequest {
        query: query.to_string(),
        num_results: None,
        fast_results: None,
    }
}

/// Run one request through the pipeline and collect every emitted event
async fn run_pipeline(
    search: StubSearch,
    llm: StubLlm,
    speech: StubSpeech,
    request: PipelineRequest,
) -> Vec<StreamEvent> {
    let pipeline = Pipeline::new(
        Arc::new(search),
        Arc::new(llm),
        Arc::new(speech),
        settings(),
    );
    let (tx, mut rx) = mpsc::channel(16);
    let task = tokio::spawn(async move { pipeline.run(request, tx).await });

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    task.await.expect("pipeline task panicked");
    events
}

fn names(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(StreamEvent::name).collect()
}

fn answer_source(events: &[StreamEvent]) -> Option<AnswerSource> {
    events.iter().find_map(|event| match event {
        StreamEvent::LlmStart { source } => Some(*source),
        _ => None,
    })
}

fn text_done(events: &[StreamEvent]) -> Option<&str> {
    events.iter().find_map(|event| match event {
        StreamEvent::TextDone { full_text, .. } => Some(full_text.as_str()),
        _ => None,
    })
}

#[tokio::test]
async fn test_no_results_closes_the_stream_early() {
    let events = run_pipeline(
        StubSearch::new(Vec::new(), Vec::new()),
        StubLlm::speaking(&["never called"]),
        StubSpeech::silent(),
        request("soft shell recovery tips"),
    )
    .await;

    assert_eq!(names(&events), ["searchResults", "done"]);
    let StreamEvent::SearchResults { results, .. } = &events[0] else {
        panic!("expected searchResults first");
    };
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_substantive_fast_results_skip_the_content_wait() {
    let search = StubSearch::new(vec![full_result("Molt guide")], vec![full_result("Unused")])
        .with_content_delay(Duration::from_secs(30));

    let events = tokio::time::timeout(
        Duration::from_secs(5),
        run_pipeline(
            search,
            StubLlm::speaking(&["Molting works in stages. "]),
            StubSpeech::with_frames(vec![vec![1, 2, 3]]),
            request("soft shell recovery tips"),
        ),
    )
    .await
    .expect("pipeline must not wait out the content pass");

    let names = names(&events);
    assert_eq!(names.first(), Some(&"searchResults"));
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(names.iter().filter(|&&name| name == "searchResults").count(), 1);
    assert_eq!(answer_source(&events), Some(AnswerSource::Fast));
}

#[tokio::test]
async fn test_title_only_fast_results_upgrade_to_content() {
    let events = run_pipeline(
        StubSearch::new(vec![bare_result("Fast title")], vec![full_result("Content post")]),
        StubLlm::speaking(&["Grounded answer. "]),
        StubSpeech::with_frames(vec![vec![1]]),
        request("soft shell recovery tips"),
    )
    .await;

    let names = names(&events);
    assert_eq!(names[0], "searchResults");
    assert_eq!(names[1], "searchResults");
    assert_eq!(names[2], "llmStart");
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(answer_source(&events), Some(AnswerSource::Content));

    let StreamEvent::SearchResults { results, .. } = &events[1] else {
        panic!("expected second searchResults");
    };
    assert_eq!(results[0].title, "Content post");
}

#[tokio::test]
async fn test_fast_failure_degrades_to_the_content_pass() {
    let events = run_pipeline(
        StubSearch::fast_failing(vec![full_result("Content post")]),
        StubLlm::speaking(&["Recovered answer. "]),
        StubSpeech::with_frames(vec![vec![1]]),
        request("soft shell recovery tips"),
    )
    .await;

    let names = names(&events);
    assert_eq!(names.first(), Some(&"searchResults"));
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(names.iter().filter(|&&name| name == "searchResults").count(), 1);
    assert_eq!(answer_source(&events), Some(AnswerSource::Content));
    assert!(!names.contains(&"error"));
}

#[tokio::test]
async fn test_caller_supplied_results_skip_the_fast_search() {
    let mut req = request("soft shell recovery tips");
    req.fast_results = Some(vec![full_result("Given post")]);

    let events = run_pipeline(
        StubSearch::broken(),
        StubLlm::speaking(&["Answer from given results. "]),
        StubSpeech::with_frames(vec![vec![1]]),
        req,
    )
    .await;

    let StreamEvent::SearchResults { results, .. } = &events[0] else {
        panic!("expected searchResults first");
    };
    assert_eq!(results[0].title, "Given post");
    assert_eq!(answer_source(&events), Some(AnswerSource::Fast));
    assert_eq!(names(&events).last(), Some(&"done"));
}

#[tokio::test]
async fn test_llm_failure_speaks_a_fallback_line() {
    let events = run_pipeline(
        StubSearch::new(vec![full_result("Molt guide")], Vec::new()),
        StubLlm::broken(),
        StubSpeech::with_frames(vec![vec![1]]),
        request("soft shell recovery tips"),
    )
    .await;

    let names = names(&events);
    assert_eq!(names.last(), Some(&"done"));
    assert!(!names.contains(&"error"));
    let full_text = text_done(&events).expect("textDone event");
    assert!(full_text.contains("Molt guide"), "fallback names the top result: {full_text}");
}

#[tokio::test]
async fn test_audio_arrives_only_after_text_done() {
    let events = run_pipeline(
        StubSearch::new(vec![full_result("Molt guide")], Vec::new()),
        StubLlm::speaking(&["First sentence. ", "Second sentence. "]),
        StubSpeech::with_frames(vec![vec![1], vec![2], vec![3]]),
        request("soft shell recovery tips"),
    )
    .await;

    let names = names(&events);
    let text_done_at = names.iter().position(|name| *name == "textDone").expect("textDone");
    let first_audio = names.iter().position(|name| *name == "audio").expect("audio");
    let last_text = names.iter().rposition(|name| *name == "text").expect("text");

    assert!(last_text < text_done_at, "all text precedes textDone: {names:?}");
    assert!(text_done_at < first_audio, "audio follows textDone: {names:?}");
    assert_eq!(names.iter().filter(|&&name| name == "audio").count(), 3);
    assert_eq!(names.last(), Some(&"done"));
}

#[tokio::test]
async fn test_zero_audio_frames_end_in_error() {
    let events = run_pipeline(
        StubSearch::new(vec![full_result("Molt guide")], Vec::new()),
        StubLlm::speaking(&["Answer text. "]),
        StubSpeech::silent(),
        request("soft shell recovery tips"),
    )
    .await;

    let names = names(&events);
    assert!(names.contains(&"textDone"), "text is delivered before the failure");
    assert!(!names.contains(&"done"));
    let StreamEvent::Error { error } = events.last().expect("terminal event") else {
        panic!("expected terminal error, got {names:?}");
    };
    assert_eq!(error, "speech error: no audio frames received");
}

#[tokio::test]
async fn test_unavailable_speech_keeps_the_text() {
    let events = run_pipeline(
        StubSearch::new(vec![full_result("Molt guide")], Vec::new()),
        StubLlm::speaking(&["Answer text. "]),
        StubSpeech::unavailable(),
        request("soft shell recovery tips"),
    )
    .await;

    let names = names(&events);
    assert!(names.contains(&"text"));
    assert!(names.contains(&"textDone"));
    assert!(!names.contains(&"audio"));
    assert_eq!(names.last(), Some(&"error"));
}

#[tokio::test]
async fn test_synthesis_failure_surfaces_after_text_done() {
    let events = run_pipeline(
        StubSearch::new(vec![full_result("Molt guide")], Vec::new()),
        StubLlm::speaking(&["Answer text. "]),
        StubSpeech::failing_finish(),
        request("soft shell recovery tips"),
    )
    .await;

    let names = names(&events);
    let text_done_at = names.iter().position(|name| *name == "textDone").expect("textDone");
    let error_at = names.iter().position(|name| *name == "error").expect("error");
    assert!(text_done_at < error_at);
    assert_eq!(names.last(), Some(&"error"));
}
