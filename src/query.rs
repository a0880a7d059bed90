//! Query analysis for voice search
//!
//! Voice transcripts arrive padded with filler ("hey, can you find me...")
//! and carry intent that maps onto search options: news phrasing wants a
//! recency window, "right now" wants a live crawl, conceptual questions
//! benefit from provider query rewriting. Analysis is a pure function over
//! the raw transcript; detection runs on the lowercased raw text, cleanup
//! on the original.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::{Regex, RegexSet};

/// Detected query intent, mapped to a provider category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCategory {
    Company,
    News,
    Research,
    Tweet,
    Github,
}

impl QueryCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::News => "news",
            Self::Research => "research",
            Self::Tweet => "tweet",
            Self::Github => "github",
        }
    }
}

/// Search plan derived from a raw query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Cleaned query text
    pub query: String,

    /// Detected category, if any
    pub category: Option<QueryCategory>,

    /// Let the provider rewrite the query
    pub autoprompt: bool,

    /// Recency window start (YYYY-MM-DD)
    pub start_published_date: Option<String>,

    /// Results should come from a live crawl, not the index
    pub live_crawl: bool,
}

static NEWS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(latest|recent|news|today|this week|yesterday|breaking|update|announcement)\b",
        r"\bwhat('s| is) (happening|new|going on)\b",
        r"\b(2024|2025|2026)\b",
    ])
    .expect("valid regex")
});

static NEWS_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(latest|today|this week|breaking)\b").expect("valid regex"));

static NEWS_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(recent|news)\b").expect("valid regex"));

static COMPANY: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(company|companies|startup|startups|business|businesses|firm|firms)\b",
        r"\b(founded|funding|raised|valuation|ipo|acquisition)\b",
        r"\bwho (is|are) (building|making|creating|working on)\b",
    ])
    .expect("valid regex")
});

static RESEARCH: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(research|paper|study|academic|scientific|journal|arxiv)\b",
        r"\b(how does|how do|explain|what is the)\b.*\b(work|algorithm|method|technique)\b",
    ])
    .expect("valid regex")
});

static GITHUB: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(github|repo|repository|open source|code|library|framework|package)\b",
        r"\b(implementation|example|tutorial|sample)\b",
    ])
    .expect("valid regex")
});

static TWEET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(twitter|tweet|x\.com|people (saying|think|talking))\b",
        r"\bwhat (do|are) people\b",
    ])
    .expect("valid regex")
});

static CONCEPTUAL: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bwhat('s| is) (the |that |a )?(term|word|name|phrase|concept|effect|fallacy|bias|principle|law)\b",
        r"\bwhat('s| is) it called\b",
        r"\bthere's a (quote|saying|term|word|concept|principle)\b",
        r"\b(can't|cannot) remember (the |that )?(name|word|term|phrase)\b",
        r"\b(difference between|compare|explain|how does|why does)\b",
        r"\bfind (a |an )?(good |best )?(explanation|source|definition)\b",
        r"\b(alternatives to|similar to|like .+ but)\b",
    ])
    .expect("valid regex")
});

static LIVE_CRAWL: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(weather|temperature|forecast|rain|sunny|cloudy|humidity|wind)\b",
        r"\b(stock|stocks|price|prices|market|nasdaq|dow|s&p|crypto|bitcoin|btc|eth|trading)\b",
        r"\b(score|scores|game|match|playing|live|vs|versus)\b.*\b(today|tonight|now|current)\b",
        r"\b(nba|nfl|mlb|nhl|fifa|premier league|world cup)\b.*\b(score|game|today)\b",
        r"\b(traffic|commute|transit|delay|delays|road conditions)\b",
        r"\b(flight|flights)\b.*\b(status|delayed|on time|arriving|departing)\b",
        r"\b(right now|currently|at the moment|as of now|live)\b",
        r"\b(election|vote|votes|voting|results|polls)\b.*\b(today|live|current|count)\b",
    ])
    .expect("valid regex")
});

static LEADING_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:hey|hi|hello|ok|okay|um|uh|so|well|please|can you|could you|I want to|I'd like to|help me|find me|show me|search for|look up|tell me about|what about|how about)\b[,.!]?\s*",
    )
    .expect("valid regex")
});

static TRAILING_POLITENESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(please|thanks|thank you)\.?$").expect("valid regex"));

static DISFLUENCIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(um|uh|er|ah|like|you know|I mean|sort of|kind of)\b").expect("valid regex")
});

static DASHED_CORRECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)—(wait|actually|sorry|no|never mind)—?").expect("valid regex"));

static SPOKEN_CORRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(wait|actually|sorry|never mind),?\s*").expect("valid regex")
});

static NEGATION: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?i)not (?:the |a )?['"]?[\w\s]+['"]?[—\-,]\s*(the one (?:where|that|when).+)"#)
            .expect("valid regex"),
        Regex::new(r#"(?i)not (?:the |a )?['"]?[\w\s]+['"]?[—\-,]\s*((?:where|when|that) .+)"#)
            .expect("valid regex"),
    ]
});

/// Analyze a raw query into a search plan
#[must_use]
pub fn analyze(raw: &str) -> QueryPlan {
    analyze_at(raw, Utc::now())
}

/// Analysis with an explicit clock, for deterministic date windows
#[must_use]
pub fn analyze_at(raw: &str, now: DateTime<Utc>) -> QueryPlan {
    let q = raw.to_lowercase().trim().to_string();

    let mut category = None;
    let mut autoprompt = false;
    let mut start_published_date = None;

    if NEWS.is_match(&q) {
        category = Some(QueryCategory::News);
        if NEWS_WEEK.is_match(&q) {
            start_published_date = Some(days_ago(now, 7));
        } else if NEWS_MONTH.is_match(&q) {
            start_published_date = Some(days_ago(now, 30));
        }
    }
    if COMPANY.is_match(&q) {
        category = Some(QueryCategory::Company);
        autoprompt = true;
    }
    if RESEARCH.is_match(&q) {
        category = Some(QueryCategory::Research);
        autoprompt = true;
    }
    if GITHUB.is_match(&q) {
        category = Some(QueryCategory::Github);
    }
    if TWEET.is_match(&q) {
        category = Some(QueryCategory::Tweet);
    }
    if CONCEPTUAL.is_match(&q) {
        autoprompt = true;
    }

    let live_crawl = LIVE_CRAWL.is_match(&q);
    let query = clean_query(raw);

    QueryPlan {
        query,
        category,
        autoprompt,
        start_published_date,
        live_crawl,
    }
}

/// Strip filler words, disfluencies, and self-corrections from a transcript
#[must_use]
pub fn clean_query(raw: &str) -> String {
    // Fillers stack ("hey, can you find me..."); strip until none remain
    let mut cleaned = raw.trim().to_string();
    loop {
        let next = LEADING_FILLER.replace(&cleaned, "");
        if next == cleaned {
            break;
        }
        cleaned = next.into_owned();
    }
    let cleaned = TRAILING_POLITENESS.replace(&cleaned, "");
    let cleaned = DISFLUENCIES.replace_all(&cleaned, "");
    let cleaned = DASHED_CORRECTION.replace_all(&cleaned, " ");
    let cleaned = SPOKEN_CORRECTION.replace_all(&cleaned, " ");
    let cleaned = cleaned.replace("...", " ");
    let mut cleaned = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    // "not X, the one where Y" keeps only the description of what's wanted
    for pattern in NEGATION.iter() {
        if let Some(captures) = pattern.captures(&cleaned) {
            cleaned = captures[1].to_string();
            break;
        }
    }

    if cleaned.len() < 3 {
        return raw.trim().to_string();
    }
    cleaned
}

/// Format `now - days` as YYYY-MM-DD
fn days_ago(now: DateTime<Utc>, days: i64) -> String {
    (now - Duration::days(days)).format("%Y-%m-%d").to_string()
}
