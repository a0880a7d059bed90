//! Moltsearch Gateway - Voice and text search for Moltbook
//!
//! This library turns one spoken (or typed) query into a single server-sent
//! event stream: search results for instant display, a spoken answer
//! generated over them, and synthesized audio of that answer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP API (SSE)                     │
//! │  /api/search │ /api/voice-search │ /api/speech │ ... │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Pipeline                          │
//! │   Query Analysis │ Search Race │ Answer │ Speech    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Upstreams                          │
//! │      Exa Search  │  Gemini LLM  │  ElevenLabs       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod answer;
pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod pipeline;
pub mod query;
pub mod search;
pub mod speech;

pub use config::Config;
pub use error::{Error, Result};
pub use events::StreamEvent;
pub use pipeline::{Pipeline, PipelineRequest, PipelineSettings};
pub use query::{QueryCategory, QueryPlan};
pub use search::{SearchOptions, SearchProvider, SearchResult};
