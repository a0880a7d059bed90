//! Search upstream client
//!
//! Two-stage search against an Exa-style semantic index: a fast title-only
//! pass for instant display, and a content-bearing pass that fetches page
//! text (optionally live-crawled). Raw provider results are normalized in
//! [`normalize`] before anything downstream sees them.

pub mod normalize;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Minimum cleaned-snippet length for the filtered content pass
pub const MIN_SNIPPET_CHARS: usize = 40;

/// A display-ready search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Display title (derived from the URL when the page title is junk)
    pub title: String,

    /// Result URL
    pub url: String,

    /// Cleaned snippet text (empty for title-only results)
    #[serde(default)]
    pub text: String,

    /// Preview image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Publication date (ISO 8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,

    /// Provider relevance score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Options shared by both search stages
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Number of results to request
    pub num_results: usize,

    /// Provider category hint (e.g. "news", "tweet")
    pub category: Option<String>,

    /// Let the provider rewrite the query
    pub autoprompt: bool,

    /// Only results published on/after this date (YYYY-MM-DD)
    pub start_published_date: Option<String>,

    /// Force a live crawl instead of index content (content stage only)
    pub live_crawl: bool,

    /// Max characters of page text per result (content stage only)
    pub max_chars: usize,

    /// Restrict results to these domains
    pub include_domains: Vec<String>,
}

/// Search upstream interface
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Fast title-only search (no content fetch)
    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>>;

    /// Content-bearing search with per-result page text
    async fn search_with_contents(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>>;
}

/// Raw result as the provider returns it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResult {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub highlights: Option<Vec<String>>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Exa `/search` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    search_type: &'static str,
    num_results: usize,
    use_autoprompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_published_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<ExaContents>,
}

#[derive(Debug, Serialize)]
struct ExaContents {
    text: ExaTextOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    livecrawl: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaTextOptions {
    max_characters: usize,
    /// Zero forces fresh page text; paired with `livecrawl: "always"`
    #[serde(skip_serializing_if = "Option::is_none")]
    max_age_hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

/// Exa search client
pub struct ExaSearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

static SHARED: OnceLock<Arc<ExaSearch>> = OnceLock::new();

impl ExaSearch {
    /// Create a new client
    #[must_use]
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// Process-wide client: constructed on first use, reused thereafter.
    /// Later calls with different arguments return the original instance.
    #[must_use]
    pub fn shared(api_key: &str, base_url: &str) -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| {
            Arc::new(Self::new(api_key.to_string(), base_url.to_string()))
        }))
    }

    async fn execute(&self, request: &ExaRequest<'_>) -> Result<Vec<RawResult>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;
        let body: ExaResponse = response.json().await?;
        Ok(body.results)
    }
}

/// Map analyzer categories onto the provider's vocabulary
fn provider_category(category: &str) -> &str {
    if category == "research" {
        "research paper"
    } else {
        category
    }
}

/// Search type for the title-only pass: the provider's latency-optimized
/// mode, unless the query benefits from autoprompt rewriting
const fn fast_search_type(autoprompt: bool) -> &'static str {
    if autoprompt { "auto" } else { "fast" }
}

#[async_trait]
impl SearchProvider for ExaSearch {
    async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        tracing::debug!(query, num_results = opts.num_results, "fast search");

        let request = ExaRequest {
            query,
            search_type: fast_search_type(opts.autoprompt),
            num_results: opts.num_results,
            use_autoprompt: opts.autoprompt,
            category: opts.category.as_deref().map(provider_category),
            start_published_date: opts.start_published_date.as_deref(),
            include_domains: (!opts.include_domains.is_empty()).then_some(&opts.include_domains[..]),
            contents: None,
        };

        let raw = self.execute(&request).await?;
        Ok(normalize::normalize_results(raw))
    }

    async fn search_with_contents(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        tracing::debug!(
            query,
            num_results = opts.num_results,
            live_crawl = opts.live_crawl,
            "content search"
        );

        let request = ExaRequest {
            query,
            search_type: "auto",
            num_results: opts.num_results,
            use_autoprompt: opts.autoprompt,
            category: opts.category.as_deref().map(provider_category),
            start_published_date: opts.start_published_date.as_deref(),
            include_domains: (!opts.include_domains.is_empty()).then_some(&opts.include_domains[..]),
            contents: Some(ExaContents {
                text: ExaTextOptions {
                    max_characters: opts.max_chars,
                    max_age_hours: opts.live_crawl.then_some(0),
                },
                livecrawl: opts.live_crawl.then_some("always"),
            }),
        };

        let raw = self.execute(&request).await?;
        Ok(normalize::normalize_results_filtered(raw, MIN_SNIPPET_CHARS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(provider_category("research"), "research paper");
        assert_eq!(provider_category("news"), "news");
        assert_eq!(provider_category("tweet"), "tweet");
    }

    #[test]
    fn test_fast_type_upgrades_with_autoprompt() {
        assert_eq!(fast_search_type(false), "fast");
        assert_eq!(fast_search_type(true), "auto");
    }

    #[test]
    fn test_request_omits_empty_fields() {
        let request = ExaRequest {
            query: "molting",
            search_type: "auto",
            num_results: 5,
            use_autoprompt: false,
            category: None,
            start_published_date: None,
            include_domains: None,
            contents: None,
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(value["query"], "molting");
        assert_eq!(value["type"], "auto");
        assert!(value.get("category").is_none());
        assert!(value.get("contents").is_none());
    }

    #[test]
    fn test_content_request_shape() {
        let domains = vec!["moltbook.com".to_string()];
        let request = ExaRequest {
            query: "molting",
            search_type: "auto",
            num_results: 10,
            use_autoprompt: true,
            category: Some("news"),
            start_published_date: Some("2026-08-17"),
            include_domains: Some(&domains),
            contents: Some(ExaContents {
                text: ExaTextOptions {
                    max_characters: 1000,
                    max_age_hours: Some(0),
                },
                livecrawl: Some("always"),
            }),
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(value["contents"]["text"]["maxCharacters"], 1000);
        assert_eq!(value["contents"]["text"]["maxAgeHours"], 0);
        assert_eq!(value["contents"]["livecrawl"], "always");
        assert_eq!(value["includeDomains"][0], "moltbook.com");
        assert_eq!(value["startPublishedDate"], "2026-08-17");
    }

    #[test]
    fn test_result_wire_shape() {
        let result = SearchResult {
            title: "Molt cycles".to_string(),
            url: "https://moltbook.com/post/1".to_string(),
            text: "Snippet".to_string(),
            image: None,
            published_date: Some("2026-08-01".to_string()),
            score: Some(0.9),
        };
        let value = serde_json::to_value(&result).expect("serializable");
        assert_eq!(value["publishedDate"], "2026-08-01");
        assert!(value.get("image").is_none());
    }
}
