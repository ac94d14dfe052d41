//! Text chunking for synthesis.
//!
//! Splits arbitrary-length input into pieces the model can synthesize in a
//! single call. Sentence boundaries are preferred, then word boundaries. A hard
//! character split is only used when a single word is longer than `max_chars`.
//!
//! Lengths are measured in Unicode scalar values so multi-byte text is never
//! cut in the middle of a character.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Sentence terminator run, optional closing quotes/brackets, then whitespace.
static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]+["'”’)\]]*\s+"#).expect("sentence boundary pattern is valid")
});

/// Errors raised while validating a [`ChunkingSpec`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Invalid chunking spec: {0}")]
    InvalidSpec(String),
}

/// Chunk size limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingSpec {
    /// Hard ceiling on characters per chunk
    pub max_chars: usize,
    /// Soft ceiling on words per chunk
    pub max_words: usize,
    /// A trailing chunk shorter than this is folded into its predecessor when it fits
    pub min_chars: usize,
    /// Split on sentence boundaries before falling back to words
    pub preserve_sentence_boundaries: bool,
}

impl Default for ChunkingSpec {
    fn default() -> Self {
        // XTTS v2 warns at 250 characters
        Self {
            max_chars: 200,
            max_words: 60,
            min_chars: 40,
            preserve_sentence_boundaries: true,
        }
    }
}

impl ChunkingSpec {
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.max_chars == 0 {
            return Err(ChunkingError::InvalidSpec(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.max_words == 0 {
            return Err(ChunkingError::InvalidSpec(
                "max_words must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn effective_min_chars(&self) -> usize {
        self.min_chars.min(self.max_chars)
    }
}

/// One unit of synthesis work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Position in the chunk sequence, contiguous from 0
    pub index: usize,
    /// Non-empty text, at most `max_chars` characters
    pub text: String,
    /// Whether this is the final chunk of the sequence
    pub is_last: bool,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split text into sentences at `.`, `!` and `?` followed by whitespace.
///
/// Returned slices are trimmed and never empty.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        let sentence = text[start..boundary.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Split `text` into chunks no longer than `spec.max_chars`.
///
/// Empty or whitespace-only input yields no chunks. Input that already fits in
/// one chunk is returned trimmed and otherwise untouched. The function is
/// total: any spec that passes [`ChunkingSpec::validate`] terminates with a
/// valid sequence. A spec with `max_chars == 0` is treated as `max_chars == 1`.
pub fn chunk(text: &str, spec: &ChunkingSpec) -> Vec<TextChunk> {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return Vec::new();
    }

    let max_chars = spec.max_chars.max(1);
    if cleaned.chars().count() <= max_chars {
        return vec![TextChunk {
            index: 0,
            text: cleaned.to_string(),
            is_last: true,
        }];
    }

    let sentences = if spec.preserve_sentence_boundaries {
        split_sentences(cleaned)
    } else {
        vec![cleaned]
    };

    let mut builder = ChunkBuilder::new(max_chars, spec.max_words.max(1));
    for sentence in sentences {
        builder.add_sentence(sentence);
    }
    let mut texts = builder.finish();

    merge_short_tail(&mut texts, max_chars, spec.effective_min_chars());

    let total = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk {
            index,
            text,
            is_last: index + 1 == total,
        })
        .collect()
}

/// Fold a short final chunk into the previous one if the result still fits.
fn merge_short_tail(texts: &mut Vec<String>, max_chars: usize, min_chars: usize) {
    if texts.len() < 2 {
        return;
    }

    let last_len = texts[texts.len() - 1].chars().count();
    let prev_len = texts[texts.len() - 2].chars().count();
    if last_len >= min_chars || prev_len + 1 + last_len > max_chars {
        return;
    }

    if let Some(last) = texts.pop() {
        if let Some(prev) = texts.last_mut() {
            prev.push(' ');
            prev.push_str(&last);
        }
    }
}

/// Split a single word into pieces of at most `max_chars` characters.
fn hard_split(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Greedy accumulator that packs sentences and words into chunks.
struct ChunkBuilder {
    max_chars: usize,
    max_words: usize,
    chunks: Vec<String>,
    current: String,
    current_chars: usize,
    current_words: usize,
}

impl ChunkBuilder {
    fn new(max_chars: usize, max_words: usize) -> Self {
        Self {
            max_chars,
            max_words,
            chunks: Vec::new(),
            current: String::new(),
            current_chars: 0,
            current_words: 0,
        }
    }

    fn fits(&self, chars: usize, words: usize) -> bool {
        if self.current.is_empty() {
            return true;
        }
        self.current_chars + 1 + chars <= self.max_chars
            && self.current_words + words <= self.max_words
    }

    fn push(&mut self, piece: &str, chars: usize, words: usize) {
        if !self.current.is_empty() {
            self.current.push(' ');
            self.current_chars += 1;
        }
        self.current.push_str(piece);
        self.current_chars += chars;
        self.current_words += words;
    }

    fn flush(&mut self) {
        let text = self.current.trim();
        if !text.is_empty() {
            self.chunks.push(text.to_string());
        }
        self.current.clear();
        self.current_chars = 0;
        self.current_words = 0;
    }

    fn add_sentence(&mut self, sentence: &str) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.is_empty() {
            return;
        }

        let normalized = words.join(" ");
        let chars = normalized.chars().count();

        if chars <= self.max_chars {
            if !self.fits(chars, words.len()) {
                self.flush();
            }
            self.push(&normalized, chars, words.len());
            return;
        }

        // Sentence alone is over the ceiling: pack its words instead
        for word in words {
            self.add_word(word);
        }
    }

    fn add_word(&mut self, word: &str) {
        let chars = word.chars().count();

        if chars > self.max_chars {
            self.flush();
            let mut pieces = hard_split(word, self.max_chars);
            let tail = pieces.pop();
            self.chunks.extend(pieces);
            if let Some(tail) = tail {
                let tail_chars = tail.chars().count();
                self.push(&tail, tail_chars, 1);
            }
            return;
        }

        if !self.fits(chars, 1) {
            self.flush();
        }
        self.push(word, chars, 1);
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(max_chars: usize) -> ChunkingSpec {
        ChunkingSpec {
            max_chars,
            ..Default::default()
        }
    }

    fn words_of(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn assert_well_formed(chunks: &[TextChunk], max_chars: usize) {
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i, "indices must be contiguous");
            assert!(!chunk.text.is_empty(), "chunk {i} is empty");
            assert!(
                chunk.char_len() <= max_chars,
                "chunk {i} has {} chars, limit {max_chars}",
                chunk.char_len()
            );
            assert_eq!(chunk.is_last, i + 1 == chunks.len());
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk("", &ChunkingSpec::default()).is_empty());
        assert!(chunk("   \n\t  ", &ChunkingSpec::default()).is_empty());
    }

    #[test]
    fn test_short_text_is_single_trimmed_chunk() {
        let chunks = chunk("  Hello there.  How are you?  ", &spec(200));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello there.  How are you?");
        assert!(chunks[0].is_last);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One. Two!  Three?\nFour \"five.\" six");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "Four \"five.\"", "six"]);
    }

    #[test]
    fn test_split_sentences_ignores_inline_periods() {
        let sentences = split_sentences("Version 2.5 is out. Go.");
        assert_eq!(sentences, vec!["Version 2.5 is out.", "Go."]);
    }

    #[test]
    fn test_five_hundred_chars_yield_three_chunks() {
        // Ten 49-character sentences separated by spaces
        let sentence = "This sentence is exactly forty-nine chars longer.";
        assert_eq!(sentence.len(), 49);
        let text = vec![sentence; 10].join(" ");
        assert_eq!(text.len(), 499);

        let chunks = chunk(&text, &spec(200));
        assert_eq!(chunks.len(), 3);
        assert_well_formed(&chunks, 200);
    }

    #[test]
    fn test_sentences_are_packed_up_to_the_limit() {
        let text = "Aaaa bbbb. Cccc dddd. Eeee ffff. Gggg hhhh.";
        let chunks = chunk(text, &ChunkingSpec {
            max_chars: 22,
            min_chars: 0,
            ..Default::default()
        });
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["Aaaa bbbb. Cccc dddd.", "Eeee ffff. Gggg hhhh."]
        );
    }

    #[test]
    fn test_long_sentence_falls_back_to_word_split() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunks = chunk(text, &ChunkingSpec {
            max_chars: 20,
            min_chars: 0,
            ..Default::default()
        });
        assert!(chunks.len() > 1);
        assert_well_formed(&chunks, 20);

        // No word is ever broken on this path
        let original = words_of(text);
        for chunk in &chunks {
            for word in chunk.text.split_whitespace() {
                assert!(original.iter().any(|w| w == word), "{word} was broken");
            }
        }
        let rebuilt = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(words_of(&rebuilt), original);
    }

    #[test]
    fn test_undelimited_text_is_character_split() {
        let text = "x".repeat(450);
        let chunks = chunk(&text, &spec(200));
        assert_well_formed(&chunks, 200);
        assert_eq!(chunks.len(), 3);
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_oversized_word_inside_sentence() {
        let long_word = "y".repeat(30);
        let text = format!("short words then {long_word} and more words after it.");
        let chunks = chunk(&text, &ChunkingSpec {
            max_chars: 12,
            min_chars: 0,
            ..Default::default()
        });
        assert_well_formed(&chunks, 12);
        let squashed: String = chunks
            .iter()
            .flat_map(|c| c.text.split_whitespace())
            .collect();
        let expected: String = text.split_whitespace().collect();
        assert_eq!(squashed, expected);
    }

    #[test]
    fn test_max_words_limits_sentence_packing() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = chunk(text, &ChunkingSpec {
            max_chars: 40,
            max_words: 4,
            min_chars: 0,
            preserve_sentence_boundaries: true,
        });
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "One two three.");
    }

    #[test]
    fn test_short_tail_is_merged_when_it_fits() {
        // "Go." is split off by max_words, then folded back since it fits
        let text = "Alpha beta gamma delta. One two three. Go.";
        let chunks = chunk(text, &ChunkingSpec {
            max_chars: 30,
            max_words: 3,
            min_chars: 10,
            preserve_sentence_boundaries: true,
        });
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Alpha beta gamma delta.");
        assert_eq!(chunks[1].text, "One two three. Go.");
        assert!(chunks[1].is_last);
    }

    #[test]
    fn test_short_tail_is_kept_when_merge_would_overflow() {
        let text = "The first sentence is fairly long here. Ok.";
        let chunks = chunk(text, &ChunkingSpec {
            max_chars: 40,
            min_chars: 10,
            ..Default::default()
        });
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "Ok.");
        assert_well_formed(&chunks, 40);
    }

    #[test]
    fn test_sentence_boundaries_disabled() {
        let text = "Aaaa. Bbbb. Cccc. Dddd. Eeee. Ffff.";
        let chunks = chunk(text, &ChunkingSpec {
            max_chars: 12,
            min_chars: 0,
            preserve_sentence_boundaries: false,
            ..Default::default()
        });
        assert_well_formed(&chunks, 12);
        assert_eq!(chunks[0].text, "Aaaa. Bbbb.");
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "ééééé ééééé. ñññññ ñññññ.";
        let chunks = chunk(text, &ChunkingSpec {
            max_chars: 12,
            min_chars: 0,
            ..Default::default()
        });
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "ééééé ééééé.");
        assert_well_formed(&chunks, 12);
    }

    #[test]
    fn test_repeated_whitespace_never_produces_empty_chunks() {
        let text = format!("First.{}Second sentence here.{}Third.", " ".repeat(50), "\n".repeat(30));
        let chunks = chunk(&text, &ChunkingSpec {
            max_chars: 25,
            min_chars: 0,
            ..Default::default()
        });
        assert_well_formed(&chunks, 25);
        let rebuilt = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(words_of(&rebuilt), words_of(&text));
    }

    #[test]
    fn test_invariants_hold_across_limits() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Sed do eiusmod \
                    tempor incididunt ut labore et dolore magna aliqua! Ut enim ad minim veniam? \
                    Quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo \
                    consequat. Supercalifragilisticexpialidocious antidisestablishmentarianism.";
        for max_chars in [1, 5, 13, 40, 80, 150] {
            let chunks = chunk(text, &spec(max_chars));
            assert_well_formed(&chunks, max_chars);
            let squashed: String = chunks
                .iter()
                .flat_map(|c| c.text.split_whitespace())
                .collect();
            let expected: String = text.split_whitespace().collect();
            assert_eq!(squashed, expected, "content changed at max_chars={max_chars}");
        }
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(ChunkingSpec::default().validate().is_ok());
        assert!(spec(0).validate().is_err());
        assert!(
            ChunkingSpec {
                max_words: 0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }
}
