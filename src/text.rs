//! Deterministic text normalization shared by the indexer and the searcher.
//!
//! Tokenization, stopword filtering, and stemming must behave identically
//! at index time and query time — see `normalize` below. Grounded on
//! `search_engine/text.py` from the original implementation; stemming is
//! delegated to `rust-stemmers`, the same Porter-stemmer crate used by the
//! `stract` search engine.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

/// Built-in English stopword list, canonical unless `stopwords_file` is set.
/// Verbatim from the original implementation's `FALLBACK_STOPWORDS`.
const FALLBACK_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Output of normalizing a piece of text: the filtered, stemmed tokens in
/// order, and the same tokens joined with single spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub tokens: Vec<String>,
    pub joined: String,
}

struct Inner {
    stopwords: HashSet<String>,
    word_pattern: Regex,
}

/// Pure, deterministic, thread-safe text normalizer. Cheap to clone: all
/// state lives behind an `Arc` and is built once.
#[derive(Clone)]
pub struct TextPipeline {
    inner: Arc<Inner>,
}

impl TextPipeline {
    /// Build the pipeline with the built-in stopword list.
    pub fn new() -> Self {
        Self::with_stopwords(FALLBACK_STOPWORDS.iter().map(|s| s.to_string()).collect())
    }

    /// Build the pipeline, loading stopwords from `path` (one word per
    /// non-empty line) if it exists, falling back to the built-in list.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            if let Ok(text) = fs::read_to_string(path) {
                let words: HashSet<String> = text
                    .lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect();
                if !words.is_empty() {
                    return Self::with_stopwords(words);
                }
            }
        }
        Self::new()
    }

    fn with_stopwords(stopwords: HashSet<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                stopwords,
                word_pattern: Regex::new(r"[A-Za-z][A-Za-z\-']+").expect("valid regex"),
            }),
        }
    }

    /// Lowercase and extract maximal runs matching `[A-Za-z][A-Za-z\-']+`.
    /// Positions in the returned vector are token positions.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.inner
            .word_pattern
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Tokenize, drop stopwords and single-character tokens, then stem with
    /// Porter's algorithm. The same code path is used for indexing and for
    /// queries — that equivalence is what makes retrieval sound.
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let stemmer = Stemmer::create(Algorithm::English);
        let tokens: Vec<String> = self
            .tokenize(text)
            .into_iter()
            .filter(|t| t.len() > 1 && !self.inner.stopwords.contains(t.as_str()))
            .map(|t| stemmer.stem(&t).into_owned())
            .collect();
        let joined = tokens.join(" ");
        NormalizedText { tokens, joined }
    }

    /// Normalize a single raw token, returning `None` if it is filtered out
    /// (stopword or too short). Used by the indexer to align postings
    /// positions with the raw (pre-filter) token stream.
    pub fn normalize_token(&self, raw: &str) -> Option<String> {
        if raw.len() <= 1 || self.inner.stopwords.contains(raw) {
            return None;
        }
        let stemmer = Stemmer::create(Algorithm::English);
        Some(stemmer.stem(raw).into_owned())
    }
}

impl Default for TextPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse whitespace, trim, and truncate to `max_chars`, appending an
/// ellipsis if the input was longer.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let collapsed: String = {
        let mut out = String::with_capacity(text.len());
        let mut last_was_space = false;
        for c in text.trim().chars() {
            if c.is_whitespace() {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            } else {
                out.push(c);
                last_was_space = false;
            }
        }
        out.trim().to_string()
    };

    let char_count = collapsed.chars().count();
    if char_count <= max_chars {
        return collapsed;
    }
    if max_chars == 0 {
        return String::new();
    }
    let truncated: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}
