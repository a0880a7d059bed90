//! Citation-aware token buffering
//!
//! LLM answers carry bracket citation markers (`[1]`, `[1, 2]`) that index
//! into the source list. Markers arrive split across token fragments, so a
//! naive per-fragment strip would leak partial markers like `[1` to the
//! client or the speech channel. [`CitationBuffer`] withholds a trailing
//! fragment that could still grow into a marker, strips complete markers
//! from everything it emits, and collects the cited indices.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Trailing text that may still grow into a citation marker: whitespace,
/// `[`, digits, optional comma-separated digit groups, unterminated
static PARTIAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*\[\d*(?:\s*,\s*\d*)*)$").expect("valid regex"));

/// A complete citation marker: `[1]`, `[12]`, `[1, 2]`, `[1,2,3]`
static COMPLETE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+(?:\s*,\s*\d+)*\]").expect("valid regex"));

/// Like [`COMPLETE_MARKER`] but absorbing leading whitespace, for the
/// final cosmetic pass over the whole answer
static MARKER_WITH_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[\d+(?:\s*,\s*\d+)*\]").expect("valid regex"));

/// Remove complete citation markers, touching nothing else.
///
/// Exactly the marker bytes are removed: surrounding whitespace stays, so
/// two words separated only by a marker can never merge, and the output is
/// identical whether the input arrives whole or split at arbitrary points.
#[must_use]
pub fn strip_complete_markers(text: &str) -> String {
    COMPLETE_MARKER.replace_all(text, "").into_owned()
}

/// Produce the display form of a finished answer: markers removed with
/// their leading whitespace, remaining whitespace collapsed, ends trimmed.
#[must_use]
pub fn clean_answer_text(text: &str) -> String {
    let stripped = MARKER_WITH_SPACE.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract cited source indices from answer text.
///
/// Multi-number markers are flattened (`[1, 2]` yields 1 and 2); the result
/// is deduplicated and sorted ascending. Indices are 1-based positions in
/// the source list.
#[must_use]
pub fn extract_citations(text: &str) -> Vec<u32> {
    static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

    let mut seen = BTreeSet::new();
    for marker in COMPLETE_MARKER.find_iter(text) {
        for group in DIGITS.find_iter(marker.as_str()) {
            if let Ok(n) = group.as_str().parse::<u32>() {
                seen.insert(n);
            }
        }
    }
    seen.into_iter().collect()
}

/// Streaming buffer that keeps partial citation markers off the wire
#[derive(Debug, Default)]
pub struct CitationBuffer {
    /// Window still eligible for emission
    pending: String,

    /// Everything seen, markers included
    raw: String,
}

impl CitationBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token fragment, returning cleaned text that is now safe to
    /// emit (or `None` while a possible marker is still growing).
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        if fragment.is_empty() {
            return None;
        }
        self.raw.push_str(fragment);
        self.pending.push_str(fragment);

        let head = match PARTIAL_MARKER.find(&self.pending) {
            Some(m) if m.start() == 0 => return None,
            Some(m) => {
                let tail = self.pending.split_off(m.start());
                std::mem::replace(&mut self.pending, tail)
            }
            None => std::mem::take(&mut self.pending),
        };

        let cleaned = strip_complete_markers(&head);
        (!cleaned.is_empty()).then_some(cleaned)
    }

    /// Emit any residual text at end of stream.
    ///
    /// An unterminated marker fragment (`[1`) is no longer a marker once
    /// the stream ends, so it passes through as plain text.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        let cleaned = strip_complete_markers(&tail);
        (!cleaned.is_empty()).then_some(cleaned)
    }

    /// Raw accumulated text, markers included
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Finish the stream: display-ready full text plus the citation set
    #[must_use]
    pub fn finish(self) -> (String, Vec<u32>) {
        let citations = extract_citations(&self.raw);
        (clean_answer_text(&self.raw), citations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed fragments through a fresh buffer, returning the concatenated
    /// emissions (push + flush) and the finish output.
    fn run(fragments: &[&str]) -> (String, String, Vec<u32>) {
        let mut buffer = CitationBuffer::new();
        let mut emitted = String::new();
        for fragment in fragments {
            if let Some(chunk) = buffer.push(fragment) {
                emitted.push_str(&chunk);
            }
        }
        if let Some(chunk) = buffer.flush() {
            emitted.push_str(&chunk);
        }
        let (full, citations) = buffer.finish();
        (emitted, full, citations)
    }

    // ---- stripping ----

    #[test]
    fn test_strip_single_marker() {
        assert_eq!(strip_complete_markers("clear [1] enough"), "clear  enough");
    }

    #[test]
    fn test_strip_multi_number_marker() {
        assert_eq!(strip_complete_markers("done [1, 2]."), "done .");
        assert_eq!(strip_complete_markers("done [1,2,3]."), "done .");
    }

    #[test]
    fn test_strip_ignores_non_citation_brackets() {
        assert_eq!(strip_complete_markers("see [note] here"), "see [note] here");
        assert_eq!(strip_complete_markers("array[0] access"), "array[0] access");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = strip_complete_markers("fact [1]. more [2].");
        assert_eq!(strip_complete_markers(&once), once);

        let cleaned = clean_answer_text("fact [1]. more [2].");
        assert_eq!(clean_answer_text(&cleaned), cleaned);
    }

    #[test]
    fn test_clean_answer_text() {
        assert_eq!(
            clean_answer_text("The answer is clear [1, 2]. More text follows [3]."),
            "The answer is clear. More text follows."
        );
    }

    // ---- citation extraction ----

    #[test]
    fn test_extract_flattens_dedupes_sorts() {
        assert_eq!(extract_citations("a [3] b [1, 2] c [2]"), vec![1, 2, 3]);
    }

    #[test]
    fn test_extract_ignores_partial_and_non_citation() {
        assert_eq!(extract_citations("a [1 b [note] c"), Vec::<u32>::new());
    }

    // ---- streaming buffer ----

    #[test]
    fn test_marker_split_across_fragments() {
        let mut buffer = CitationBuffer::new();

        assert_eq!(
            buffer.push("The answer is clear ").as_deref(),
            Some("The answer is clear ")
        );
        // "[1" could still grow into a marker
        assert_eq!(buffer.push("[1"), None);
        // marker completes as [1, 2] and is stripped
        assert_eq!(
            buffer.push(", 2]. More text follows [3].").as_deref(),
            Some(". More text follows .")
        );
        assert_eq!(buffer.flush(), None);

        let (full, citations) = buffer.finish();
        assert_eq!(full, "The answer is clear. More text follows.");
        assert_eq!(citations, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_fragment_emits_nothing() {
        let mut buffer = CitationBuffer::new();
        assert_eq!(buffer.push(""), None);
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_marker_only_fragment() {
        let mut buffer = CitationBuffer::new();
        assert_eq!(buffer.push("[1]"), None);
        let (full, citations) = buffer.finish();
        assert_eq!(full, "");
        assert_eq!(citations, vec![1]);
    }

    #[test]
    fn test_unterminated_marker_flushes_as_text() {
        let mut buffer = CitationBuffer::new();
        assert_eq!(buffer.push("see [12"), Some("see".to_string()));
        assert_eq!(buffer.flush().as_deref(), Some(" [12"));
    }

    #[test]
    fn test_trailing_comma_partial_is_held() {
        let mut buffer = CitationBuffer::new();
        assert_eq!(buffer.push("done [1, "), Some("done".to_string()));
        assert_eq!(buffer.push("2] next").as_deref(), Some("  next"));

        let (full, citations) = buffer.finish();
        assert_eq!(full, "done next");
        assert_eq!(citations, vec![1, 2]);
    }

    #[test]
    fn test_emissions_invariant_under_chunking() {
        let text = "Molts molt [1, 2]. Some stay [3], others go [4]. End [5].";
        let whole = strip_complete_markers(text);

        // split at every byte boundary pair
        for i in 0..=text.len() {
            for j in i..=text.len() {
                if !text.is_char_boundary(i) || !text.is_char_boundary(j) {
                    continue;
                }
                let (emitted, full, citations) = run(&[&text[..i], &text[i..j], &text[j..]]);
                assert_eq!(emitted, whole, "split at {i}/{j}");
                assert_eq!(full, clean_answer_text(text), "split at {i}/{j}");
                assert_eq!(citations, vec![1, 2, 3, 4, 5], "split at {i}/{j}");
            }
        }
    }

    #[test]
    fn test_words_never_merge_across_stripped_marker() {
        // "word1 " already emitted; marker strip must not glue word2 on
        let (emitted, full, _) = run(&["word1 ", "[1] word2"]);
        assert!(emitted.contains("word1  word2") || emitted.contains("word1 word2"));
        assert!(!emitted.contains("word1word2"));
        assert_eq!(full, "word1 word2");
    }
}
