//! Search result normalization
//!
//! Index pages come back with boilerplate titles ("Moltbook - The Front
//! Page Of The Agent Internet" on every community page) and snippets full
//! of image markdown and loading placeholders. This module turns raw
//! provider results into something worth displaying: junk titles become
//! URL-derived labels (`m/agentethics`), snippets get scrubbed, and a
//! filtered variant drops results with nothing to show at all.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::{RawResult, SearchResult};

/// Titles that are site boilerplate wherever they appear (substring match)
const GENERIC_TITLE_MARKERS: &[&str] = &[
    "the front page of the agent internet",
    "page not found",
    "just a moment",
    "untitled",
];

/// Titles that are boilerplate only as the whole title
const GENERIC_TITLE_EXACT: &[&str] = &["moltbook", "log in", "sign in", "404", "loading"];

/// Snippet placeholders that mean the page hadn't rendered yet
const LOADING_PLACEHOLDERS: &[&str] = &["loading", "loading...", "loading…"];

/// Inline image markdown: `![alt](url)`
static IMAGE_MARKDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));

/// Snippet boilerplate phrases worth scrubbing
static SNIPPET_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:skip to main content|log in to continue|sign up to (?:comment|continue)|share this post|copy link|loading\.{3}|loading…)",
    )
    .expect("valid regex")
});

/// Community path: `/s/name`, `/m/name`, `/submolt/name`
static COMMUNITY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(?:s|m|submolt)/([^/]+)").expect("valid regex"));

/// User path: `/u/name`, `/user/name`
static USER_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(?:u|user)/([^/]+)").expect("valid regex"));

/// Post path: `/post/id`
static POST_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/post/([^/]+)").expect("valid regex"));

/// Is this title site boilerplate rather than a page title?
#[must_use]
pub fn is_generic_title(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    GENERIC_TITLE_EXACT.contains(&lower.as_str())
        || GENERIC_TITLE_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
}

/// Display label for a URL: community/user/post slug, else the last path
/// segment, else the bare domain
#[must_use]
pub fn url_slug(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "Untitled".to_string();
    };
    let path = parsed.path();

    if let Some(captures) = COMMUNITY_PATH.captures(path) {
        return format!("m/{}", &captures[1]);
    }
    if let Some(captures) = USER_PATH.captures(path) {
        return format!("u/{}", &captures[1]);
    }
    if let Some(captures) = POST_PATH.captures(path) {
        return format!("post/{}", &captures[1]);
    }

    if let Some(segment) = path.split('/').rev().find(|s| !s.is_empty()) {
        return segment.to_string();
    }

    display_domain(url)
}

/// Host with the leading `www.` removed
#[must_use]
pub fn display_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
        .map_or_else(
            || "Untitled".to_string(),
            |host| host.trim_start_matches("www.").to_string(),
        )
}

/// Title for display: the page title when it's real, otherwise a
/// URL-derived label
#[must_use]
pub fn display_title(title: Option<&str>, url: &str) -> String {
    match title {
        Some(t) if !t.trim().is_empty() && !is_generic_title(t) => t.trim().to_string(),
        _ => url_slug(url),
    }
}

/// Scrub a snippet: substitute highlights for loading placeholders, drop
/// image markdown and boilerplate phrases, collapse whitespace
#[must_use]
pub fn clean_snippet(text: Option<&str>, highlights: Option<&[String]>) -> String {
    let trimmed = text.unwrap_or_default().trim();

    let source = if is_loading_placeholder(trimmed) {
        match highlights {
            Some(h) if !h.is_empty() => h.join(" "),
            _ => String::new(),
        }
    } else {
        trimmed.to_string()
    };

    let no_images = IMAGE_MARKDOWN.replace_all(&source, " ");
    let no_boilerplate = SNIPPET_BOILERPLATE.replace_all(&no_images, " ");
    no_boilerplate
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_loading_placeholder(text: &str) -> bool {
    let lower = text.to_lowercase();
    LOADING_PLACEHOLDERS.contains(&lower.as_str())
}

/// Does this raw result carry anything worth keeping? True when it has a
/// real title or at least `min_snippet_chars` of cleaned snippet text.
#[must_use]
pub fn is_substantive(raw: &RawResult, min_snippet_chars: usize) -> bool {
    let has_real_title = raw
        .title
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty() && !is_generic_title(t));
    if has_real_title {
        return true;
    }
    let snippet = clean_snippet(raw.text.as_deref(), raw.highlights.as_deref());
    snippet.chars().count() >= min_snippet_chars
}

/// Normalize one raw result for display
#[must_use]
pub fn normalize_result(raw: RawResult) -> SearchResult {
    let title = display_title(raw.title.as_deref(), &raw.url);
    let text = clean_snippet(raw.text.as_deref(), raw.highlights.as_deref());
    SearchResult {
        title,
        url: raw.url,
        text,
        image: raw.image,
        published_date: raw.published_date,
        score: raw.score,
    }
}

/// Normalize a result list for display
#[must_use]
pub fn normalize_results(raw: Vec<RawResult>) -> Vec<SearchResult> {
    raw.into_iter().map(normalize_result).collect()
}

/// Normalize a result list, dropping results with neither a real title
/// nor a usable snippet
#[must_use]
pub fn normalize_results_filtered(
    raw: Vec<RawResult>,
    min_snippet_chars: usize,
) -> Vec<SearchResult> {
    raw.into_iter()
        .filter(|r| is_substantive(r, min_snippet_chars))
        .map(normalize_result)
        .collect()
}
