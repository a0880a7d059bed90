//! Configuration management for the Moltsearch gateway

pub mod file;

use std::path::Path;

use crate::Result;

/// Gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// API keys for upstream services
    pub api_keys: ApiKeys,

    /// Search configuration
    pub search: SearchSettings,

    /// LLM configuration
    pub llm: LlmSettings,

    /// Speech synthesis configuration
    pub speech: SpeechSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

/// API keys for upstream services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Exa search API key
    pub exa: Option<String>,

    /// Gemini API key (answer generation)
    pub gemini: Option<String>,

    /// `ElevenLabs` API key (speech synthesis)
    pub elevenlabs: Option<String>,
}

/// Search configuration
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Search API base URL
    pub base_url: String,

    /// Default result count when the client doesn't ask for one
    pub num_results: usize,

    /// Max characters of page text fetched per content-bearing result
    pub content_max_chars: usize,

    /// Domains the pinned `/api/search` endpoint is restricted to
    pub include_domains: Vec<String>,
}

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Model identifier
    pub model: String,

    /// Generative API base URL
    pub base_url: String,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    /// API base host (HTTPS and WSS endpoints are derived from it)
    pub base_host: String,

    /// Voice identifier
    pub voice_id: String,

    /// Synthesis model
    pub model_id: String,

    /// Audio output format
    pub output_format: String,

    /// Voice stability (0.0 to 1.0)
    pub stability: f32,

    /// Voice similarity boost (0.0 to 1.0)
    pub similarity_boost: f32,

    /// WebSocket connect deadline in seconds
    pub connect_timeout_secs: u64,

    /// Synthesis completion deadline in seconds
    pub synthesis_timeout_secs: u64,

    /// Soft word limit for spoken summaries
    pub soft_words: usize,

    /// Hard word limit for spoken summaries
    pub hard_words: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.exa.ai".to_string(),
            num_results: 10,
            content_max_chars: 1000,
            include_domains: vec!["moltbook.com".to_string()],
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            base_host: "api.elevenlabs.io".to_string(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_turbo_v2_5".to_string(),
            output_format: "mp3_22050_32".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            connect_timeout_secs: 5,
            synthesis_timeout_secs: 30,
            soft_words: 60,
            hard_words: 90,
        }
    }
}

impl Config {
    /// Load configuration with layering: env > toml file > defaults
    ///
    /// # Errors
    ///
    /// Returns error if an env override fails to parse (e.g. a non-numeric
    /// port)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path);

        let env_port = match std::env::var("MOLTSEARCH_PORT").or_else(|_| std::env::var("PORT")) {
            Ok(s) => Some(
                s.parse::<u16>()
                    .map_err(|e| crate::Error::Config(format!("invalid port '{s}': {e}")))?,
            ),
            Err(_) => None,
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            exa: std::env::var("EXA_API_KEY").ok().or(fc.api_keys.exa),
            gemini: std::env::var("GEMINI_API_KEY").ok().or(fc.api_keys.gemini),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
        };

        // Server config (env > toml > default)
        let server_default = ServerConfig::default();
        let server = ServerConfig {
            host: std::env::var("MOLTSEARCH_HOST")
                .ok()
                .or(fc.server.host)
                .unwrap_or(server_default.host),
            port: env_port.or(fc.server.port).unwrap_or(server_default.port),
        };

        // Search config (env > toml > default)
        let search_default = SearchSettings::default();
        let search = SearchSettings {
            base_url: std::env::var("EXA_BASE_URL")
                .ok()
                .or(fc.search.base_url)
                .unwrap_or(search_default.base_url),
            num_results: std::env::var("MOLTSEARCH_NUM_RESULTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.search.num_results)
                .unwrap_or(search_default.num_results),
            content_max_chars: fc
                .search
                .content_max_chars
                .unwrap_or(search_default.content_max_chars),
            include_domains: std::env::var("MOLTSEARCH_INCLUDE_DOMAINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|d| d.trim().to_string())
                        .filter(|d| !d.is_empty())
                        .collect()
                })
                .or(fc.search.include_domains)
                .unwrap_or(search_default.include_domains),
        };

        // LLM config (env > toml > default)
        let llm_default = LlmSettings::default();
        let llm = LlmSettings {
            model: std::env::var("MOLTSEARCH_LLM_MODEL")
                .ok()
                .or(fc.llm.model)
                .unwrap_or(llm_default.model),
            base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .or(fc.llm.base_url)
                .unwrap_or(llm_default.base_url),
        };

        // Speech config (env > toml > default)
        let speech_default = SpeechSettings::default();
        let speech = SpeechSettings {
            base_host: std::env::var("ELEVENLABS_HOST")
                .ok()
                .unwrap_or(speech_default.base_host),
            voice_id: std::env::var("MOLTSEARCH_VOICE_ID")
                .ok()
                .or(fc.speech.voice_id)
                .unwrap_or(speech_default.voice_id),
            model_id: std::env::var("MOLTSEARCH_SPEECH_MODEL")
                .ok()
                .or(fc.speech.model_id)
                .unwrap_or(speech_default.model_id),
            output_format: fc
                .speech
                .output_format
                .unwrap_or(speech_default.output_format),
            stability: fc.speech.stability.unwrap_or(speech_default.stability),
            similarity_boost: fc
                .speech
                .similarity_boost
                .unwrap_or(speech_default.similarity_boost),
            connect_timeout_secs: fc
                .speech
                .connect_timeout_secs
                .unwrap_or(speech_default.connect_timeout_secs),
            synthesis_timeout_secs: fc
                .speech
                .synthesis_timeout_secs
                .unwrap_or(speech_default.synthesis_timeout_secs),
            soft_words: fc.speech.soft_words.unwrap_or(speech_default.soft_words),
            hard_words: fc.speech.hard_words.unwrap_or(speech_default.hard_words),
        };

        Ok(Self {
            server,
            api_keys,
            search,
            llm,
            speech,
        })
    }
}
