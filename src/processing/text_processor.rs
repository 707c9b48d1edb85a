//! Text tokenization and a dictionary-based English heuristic

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

const ENGLISH_WORDS: &str = include_str!("english_words.txt");

/// Classifies text as English when enough of its words are in a reference dictionary.
///
/// This is an approximation: short texts, code-heavy descriptions and mixed-language
/// postings can be misclassified.
pub struct TextProcessor {
    dictionary: HashSet<String>,
    english_threshold: f64,
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl TextProcessor {
    pub fn new(english_threshold: f64) -> Self {
        let dictionary = ENGLISH_WORDS
            .lines()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        Self {
            dictionary,
            english_threshold,
        }
    }

    pub fn with_dictionary<I, S>(words: I, english_threshold: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            dictionary: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
            english_threshold,
        }
    }

    /// Case-folded word tokens; punctuation and whitespace are dropped
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words().map(|w| w.to_lowercase()).collect()
    }

    /// Fraction of tokens found in the dictionary, `None` for text without words
    pub fn english_ratio(&self, text: &str) -> Option<f64> {
        let tokens = self.tokenize(text);
        if tokens.is_empty() {
            return None;
        }
        let known = tokens.iter().filter(|t| self.dictionary.contains(t.as_str())).count();
        Some(known as f64 / tokens.len() as f64)
    }

    pub fn is_english(&self, text: &str) -> bool {
        self.is_english_with_threshold(text, self.english_threshold)
    }

    pub fn is_english_with_threshold(&self, text: &str, threshold: f64) -> bool {
        self.english_ratio(text).map_or(false, |ratio| ratio >= threshold)
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }
}
