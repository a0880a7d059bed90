//! TOML configuration file loading
//!
//! Supports `~/.config/moltsearch/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MoltsearchConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// API keys for upstream services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Bind address (e.g. "127.0.0.1")
    pub host: Option<String>,

    /// API server port
    pub port: Option<u16>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub exa: Option<String>,
    pub gemini: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Search configuration
#[derive(Debug, Default, Deserialize)]
pub struct SearchFileConfig {
    /// Search API base URL
    pub base_url: Option<String>,

    /// Default result count when the client doesn't ask for one
    pub num_results: Option<usize>,

    /// Max characters of page text fetched per content-bearing result
    pub content_max_chars: Option<usize>,

    /// Domains the pinned `/api/search` endpoint is restricted to
    pub include_domains: Option<Vec<String>>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gemini-2.0-flash")
    pub model: Option<String>,

    /// Generative API base URL
    pub base_url: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Voice identifier
    pub voice_id: Option<String>,

    /// Synthesis model (e.g. "eleven_turbo_v2_5")
    pub model_id: Option<String>,

    /// Audio output format (e.g. "mp3_22050_32")
    pub output_format: Option<String>,

    /// Voice stability (0.0 to 1.0)
    pub stability: Option<f32>,

    /// Voice similarity boost (0.0 to 1.0)
    pub similarity_boost: Option<f32>,

    /// WebSocket connect deadline in seconds
    pub connect_timeout_secs: Option<u64>,

    /// Synthesis completion deadline in seconds
    pub synthesis_timeout_secs: Option<u64>,

    /// Soft word limit for spoken summaries
    pub soft_words: Option<usize>,

    /// Hard word limit for spoken summaries
    pub hard_words: Option<usize>,
}

/// Load the TOML config file from an explicit path or the standard location
///
/// Returns `MoltsearchConfigFile::default()` if the file doesn't exist or
/// can't be parsed.
pub fn load_config_file(override_path: Option<&Path>) -> MoltsearchConfigFile {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Some(p) => p,
            None => return MoltsearchConfigFile::default(),
        },
    };

    if !path.exists() {
        return MoltsearchConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MoltsearchConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MoltsearchConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/moltsearch/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("moltsearch").join("config.toml"))
}
