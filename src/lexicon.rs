//! Slop lexicon: weighted cliché phrases and overused words.
//!
//! The tables ship inside the crate (`data/slop_phrases.json`,
//! `data/slop_words.json`) and can be overridden from disk. Both are parsed
//! once per process through [`Lexicon::shared`]; analyzers borrow the result.
//!
//! Wire formats:
//! - phrases: `[[phrase, probability], ...]`, weight = `1 - probability`
//! - words: `[[word, count], ...]`, weight = `count / max_count`

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::text_analysis::round_to;

const BUNDLED_PHRASES: &str = include_str!("../data/slop_phrases.json");
const BUNDLED_WORDS: &str = include_str!("../data/slop_words.json");

static SHARED: OnceCell<Lexicon> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub enum LexiconError {
    #[error("failed to read {table} table at {path}: {source}")]
    Io {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {table} table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{table} table entry {index} is invalid: {reason}")]
    Invalid {
        table: &'static str,
        index: usize,
        reason: String,
    },
}

/// A lexicon term with its severity weight in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
}

/// Read-only slop lexicon, sorted by weight descending.
#[derive(Debug, Clone)]
pub struct Lexicon {
    phrases: Vec<WeightedTerm>,
    words: Vec<WeightedTerm>,
}

impl Lexicon {
    /// Process-wide lexicon built from the bundled tables on first use.
    pub fn shared() -> Result<&'static Lexicon, LexiconError> {
        SHARED.get_or_try_init(Self::bundled)
    }

    pub fn bundled() -> Result<Self, LexiconError> {
        Self::from_json(BUNDLED_PHRASES, BUNDLED_WORDS)
    }

    pub fn from_paths(phrases: &Path, words: &Path) -> Result<Self, LexiconError> {
        let read = |table: &'static str, path: &Path| {
            std::fs::read_to_string(path).map_err(|source| LexiconError::Io {
                table,
                path: path.to_path_buf(),
                source,
            })
        };
        let phrases_raw = read("phrase", phrases)?;
        let words_raw = read("word", words)?;
        Self::from_json(&phrases_raw, &words_raw)
    }

    pub fn from_json(phrases_json: &str, words_json: &str) -> Result<Self, LexiconError> {
        let raw_phrases: Vec<(String, f64)> = serde_json::from_str(phrases_json)
            .map_err(|source| LexiconError::Parse {
                table: "phrase",
                source,
            })?;
        let raw_words: Vec<(String, f64)> =
            serde_json::from_str(words_json).map_err(|source| LexiconError::Parse {
                table: "word",
                source,
            })?;

        let mut phrases = Vec::with_capacity(raw_phrases.len());
        for (index, (phrase, prob)) in raw_phrases.into_iter().enumerate() {
            if phrase.trim().is_empty() {
                return Err(invalid("phrase", index, "empty phrase"));
            }
            if !(0.0..=1.0).contains(&prob) {
                return Err(invalid(
                    "phrase",
                    index,
                    format!("probability {prob} outside [0, 1]"),
                ));
            }
            phrases.push(WeightedTerm {
                term: phrase,
                weight: round_to(1.0 - prob, 4),
            });
        }

        let max_count = raw_words.iter().map(|(_, c)| *c).fold(0.0_f64, f64::max);
        let mut words = Vec::with_capacity(raw_words.len());
        for (index, (word, count)) in raw_words.into_iter().enumerate() {
            if word.trim().is_empty() {
                return Err(invalid("word", index, "empty word"));
            }
            if count < 0.0 || !count.is_finite() {
                return Err(invalid("word", index, format!("count {count} is negative")));
            }
            if max_count <= 0.0 {
                return Err(invalid("word", index, "all word counts are zero"));
            }
            words.push(WeightedTerm {
                term: word,
                weight: round_to(count / max_count, 4),
            });
        }

        sort_by_weight(&mut phrases);
        sort_by_weight(&mut words);
        Ok(Self { phrases, words })
    }

    /// Phrases with weight `>= min_severity`, heaviest first.
    pub fn phrases(&self, min_severity: f64) -> impl Iterator<Item = &WeightedTerm> {
        self.phrases
            .iter()
            .filter(move |t| t.weight >= min_severity)
    }

    /// Words with weight `>= min_severity`, heaviest first.
    pub fn words(&self, min_severity: f64) -> impl Iterator<Item = &WeightedTerm> {
        self.words.iter().filter(move |t| t.weight >= min_severity)
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

fn invalid(table: &'static str, index: usize, reason: impl Into<String>) -> LexiconError {
    LexiconError::Invalid {
        table,
        index,
        reason: reason.into(),
    }
}

fn sort_by_weight(terms: &mut [WeightedTerm]) {
    terms.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.term.cmp(&b.term))
    });
}
