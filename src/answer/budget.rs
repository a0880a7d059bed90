//! Word-budget enforcement for spoken answers
//!
//! The summarizer prompt asks for a short answer, but prompts are advice,
//! not guarantees. For speech output the budget is enforced here: a soft
//! limit where we stop at the next sentence boundary, and a hard limit
//! that is never exceeded.

/// Default soft word limit for spoken summaries
pub const DEFAULT_SOFT_WORDS: usize = 60;

/// Default hard word limit for spoken summaries
pub const DEFAULT_HARD_WORDS: usize = 90;

/// Outcome of offering a chunk to a [`SpeechBudget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Chunk accepted, keep streaming
    Take,
    /// Chunk accepted and the text now ends a sentence past the soft
    /// limit; stop pulling
    TakeAndFinish,
    /// Chunk would cross the hard limit and was discarded; stop pulling
    Discard,
}

/// Streaming word counter with soft/hard stop signals.
///
/// Chunks may split words at arbitrary byte positions; the count is kept
/// exact by detecting when a chunk continues the previous word.
#[derive(Debug)]
pub struct SpeechBudget {
    soft: usize,
    hard: usize,
    count: usize,
    text: String,
}

impl SpeechBudget {
    /// Create a budget with the given limits (`soft` must not exceed `hard`)
    #[must_use]
    pub const fn new(soft: usize, hard: usize) -> Self {
        Self {
            soft,
            hard,
            count: 0,
            text: String::new(),
        }
    }

    /// Words accepted so far
    #[must_use]
    pub const fn words(&self) -> usize {
        self.count
    }

    /// Offer a chunk. `Take`/`TakeAndFinish` mean the chunk was appended;
    /// `Discard` means it was dropped because it would cross the hard limit.
    pub fn offer(&mut self, chunk: &str) -> Verdict {
        let projected = self.words_if_appended(chunk);
        if projected > self.hard {
            return Verdict::Discard;
        }

        self.text.push_str(chunk);
        self.count = projected;

        if self.count >= self.soft && ends_sentence(&self.text) {
            Verdict::TakeAndFinish
        } else {
            Verdict::Take
        }
    }

    /// Word count after appending `chunk`, accounting for a chunk that
    /// continues the word the accumulated text ends with.
    fn words_if_appended(&self, chunk: &str) -> usize {
        let chunk_words = count_words(chunk);
        if chunk_words == 0 {
            return self.count;
        }
        let continues_word = !self.text.is_empty()
            && !self.text.ends_with(char::is_whitespace)
            && !chunk.starts_with(char::is_whitespace);
        self.count + chunk_words - usize::from(continues_word)
    }
}

/// Count whitespace-separated words
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Does the text end at a sentence boundary (ignoring trailing whitespace
/// and closing quotes/brackets)?
#[must_use]
pub fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .trim_end_matches(['"', '\'', ')', ']'])
        .ends_with(['.', '!', '?'])
}

/// Is this word a sentence ending?
fn is_sentence_word(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']'])
        .ends_with(['.', '!', '?'])
}

/// Cap already-complete text at the word budget.
///
/// Text within the soft limit is returned unchanged. Longer text is cut at
/// the latest sentence boundary between the soft and hard limits; if no
/// boundary exists there, text still within the hard limit is returned
/// whole, and anything longer is cut at exactly `hard` words with trailing
/// non-terminal punctuation trimmed.
#[must_use]
pub fn truncate_words(text: &str, soft: usize, hard: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= soft {
        return text.to_string();
    }

    let upper = hard.min(words.len());
    for end in (soft..=upper).rev() {
        if is_sentence_word(words[end - 1]) {
            return words[..end].join(" ");
        }
    }

    if words.len() <= hard {
        return text.to_string();
    }

    let cut = words[..hard].join(" ");
    cut.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(words: usize) -> String {
        let mut s = vec!["word"; words].join(" ");
        s.push('.');
        s
    }

    // ---- streaming budget ----

    #[test]
    fn test_takes_chunks_below_soft_limit() {
        let mut budget = SpeechBudget::new(60, 90);
        assert_eq!(budget.offer("Short sentence."), Verdict::Take);
        assert_eq!(budget.words(), 2);
    }

    #[test]
    fn test_finishes_at_sentence_boundary_past_soft_limit() {
        let mut budget = SpeechBudget::new(10, 30);
        assert_eq!(budget.offer(&sentence(8)), Verdict::Take);
        // crosses soft=10 and ends with "."
        assert_eq!(budget.offer(&format!(" {}", sentence(4))), Verdict::TakeAndFinish);
        assert_eq!(budget.words(), 12);
    }

    #[test]
    fn test_mid_sentence_chunk_past_soft_keeps_going() {
        let mut budget = SpeechBudget::new(5, 90);
        assert_eq!(budget.offer("one two three four five six"), Verdict::Take);
    }

    #[test]
    fn test_discards_chunk_crossing_hard_limit() {
        let mut budget = SpeechBudget::new(5, 10);
        assert_eq!(budget.offer("one two three four five six seven eight"), Verdict::Take);
        // 8 + 5 > 10: dropped, count unchanged
        assert_eq!(budget.offer(" nine ten eleven twelve thirteen"), Verdict::Discard);
        assert_eq!(budget.words(), 8);
    }

    #[test]
    fn test_chunk_landing_exactly_on_hard_limit_is_taken() {
        let mut budget = SpeechBudget::new(2, 4);
        assert_eq!(budget.offer("one two"), Verdict::Take);
        assert_eq!(budget.offer(" three four."), Verdict::TakeAndFinish);
        assert_eq!(budget.words(), 4);
    }

    #[test]
    fn test_split_word_is_counted_once() {
        let mut budget = SpeechBudget::new(60, 90);
        budget.offer("Hel");
        budget.offer("lo world");
        assert_eq!(budget.words(), 2);
    }

    #[test]
    fn test_whitespace_only_chunk_changes_nothing() {
        let mut budget = SpeechBudget::new(2, 4);
        budget.offer("one two.");
        let before = budget.words();
        assert_eq!(budget.offer("   "), Verdict::TakeAndFinish);
        assert_eq!(budget.words(), before);
    }

    // ---- sentence detection ----

    #[test]
    fn test_sentence_end_detection() {
        assert!(ends_sentence("Done."));
        assert!(ends_sentence("Done!  "));
        assert!(ends_sentence("Really?"));
        assert!(ends_sentence("He said \"stop.\""));
        assert!(!ends_sentence("trailing comma,"));
        assert!(!ends_sentence("mid word"));
    }

    // ---- post-hoc truncation ----

    #[test]
    fn test_short_text_is_unchanged() {
        let text = sentence(40);
        assert_eq!(truncate_words(&text, 60, 90), text);
    }

    #[test]
    fn test_cuts_at_latest_boundary_in_range() {
        // 70-word sentence then a 30-word sentence: boundary at word 70
        let text = format!("{} {}", sentence(70), sentence(30));
        let cut = truncate_words(&text, 60, 90);
        assert_eq!(count_words(&cut), 70);
        assert!(cut.ends_with('.'));
    }

    #[test]
    fn test_mid_sentence_text_within_hard_limit_is_kept_whole() {
        // 85 words, no sentence boundary anywhere
        let text = vec!["word"; 85].join(" ");
        assert_eq!(truncate_words(&text, 60, 90), text);
    }

    #[test]
    fn test_hard_cut_when_no_boundary_in_range() {
        let text = vec!["word,"; 120].join(" ");
        let cut = truncate_words(&text, 60, 90);
        assert_eq!(count_words(&cut), 90);
        // trailing comma from the cut word is trimmed
        assert!(cut.ends_with("word"));
    }

    #[test]
    fn test_output_never_exceeds_hard_limit() {
        for len in [50, 89, 90, 91, 150, 400] {
            let text = vec!["w"; len].join(" ");
            assert!(count_words(&truncate_words(&text, 60, 90)) <= 90, "len {len}");
        }
        for len in [50, 120] {
            let text = format!("{} {}", sentence(65), vec!["w"; len].join(" "));
            assert!(count_words(&truncate_words(&text, 60, 90)) <= 90, "len {len}");
        }
    }
}
