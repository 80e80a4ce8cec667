//! Deterministic word tokenizer.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// English stop words removed by the default tokenizer configuration.
///
/// A small list is enough for short command phrases; function words carry no
/// signal for intent labels.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "will", "with",
];

/// Tokenizer configuration.
///
/// Splits on Unicode word boundaries, lowercases, and optionally drops stop
/// words. The struct is plain data so it can be serialized into a model
/// artifact and reproduce the exact training-time token stream at prediction
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenizer {
    /// Lowercase tokens before further processing.
    pub lowercase: bool,
    /// Drop common English stop words.
    pub filter_stop_words: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer {
            lowercase: true,
            filter_stop_words: true,
        }
    }
}

impl Tokenizer {
    /// Tokenizer that keeps stop words. Used where every word matters, such
    /// as rule-pattern matching.
    pub fn keep_stop_words() -> Self {
        Tokenizer {
            lowercase: true,
            filter_stop_words: false,
        }
    }

    /// Split `text` into tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(|word| {
                if self.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .filter(|token| !self.filter_stop_words || !STOP_WORDS.contains(&token.as_str()))
            .collect()
    }
}
