//! Word count tolerance and narration tense consistency.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::round_to;
use super::tagger::LinguisticTagger;
use crate::config::{TenseConfig, WordCountConfig};

// =============================================================================
// Word count
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCountResult {
    pub actual: usize,
    pub target: i64,
    pub within_tolerance: bool,
    /// Signed fractional deviation, e.g. `0.15` is 15% over target.
    pub deviation: f64,
}

/// Whitespace-token word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Compare the actual word count with `target`. A non-positive target is
/// always within tolerance. The tolerance bound is inclusive.
pub fn check_word_count(text: &str, target: i64, config: &WordCountConfig) -> WordCountResult {
    let actual = word_count(text);
    if target <= 0 {
        return WordCountResult {
            actual,
            target,
            within_tolerance: true,
            deviation: 0.0,
        };
    }

    let deviation = (actual as f64 - target as f64) / target as f64;
    WordCountResult {
        actual,
        target,
        within_tolerance: deviation.abs() <= config.tolerance,
        deviation: round_to(deviation, 3),
    }
}

// =============================================================================
// Tense
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tense {
    Past,
    Present,
    Unknown,
}

impl Tense {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tense::Past => "past",
            Tense::Present => "present",
            Tense::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenseResult {
    pub dominant_tense: Tense,
    pub past_ratio: f64,
    pub present_ratio: f64,
    pub consistent: bool,
    pub minority_ratio: f64,
}

impl Default for TenseResult {
    fn default() -> Self {
        Self {
            dominant_tense: Tense::Unknown,
            past_ratio: 0.0,
            present_ratio: 0.0,
            consistent: true,
            minority_ratio: 0.0,
        }
    }
}

static STRAIGHT_DOUBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*""#).expect("Invalid dialogue regex"));
static CURLY_DOUBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{201c}[^\u{201d}]*\u{201d}").expect("Invalid dialogue regex"));
// A capital after the opening quote keeps contractions like "she's" intact.
static STRAIGHT_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'[A-Z][^']*'").expect("Invalid dialogue regex"));
static CURLY_SINGLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("\u{2018}[A-Z][^\u{2019}]*\u{2019}").expect("Invalid dialogue regex")
});

/// Remove quoted dialogue, leaving narration.
pub fn strip_dialogue(text: &str) -> String {
    let s = STRAIGHT_DOUBLE.replace_all(text, "");
    let s = CURLY_DOUBLE.replace_all(&s, "");
    let s = STRAIGHT_SINGLE.replace_all(&s, "");
    CURLY_SINGLE.replace_all(&s, "").into_owned()
}

/// Past (`VBD`, `VBN`) vs present (`VBP`, `VBZ`) verb distribution in the
/// narration. Without a tagger, or with no finite verbs, the result is
/// `unknown` and consistent.
pub fn check_tense_consistency(
    text: &str,
    tagger: Option<&dyn LinguisticTagger>,
    config: &TenseConfig,
) -> TenseResult {
    let Some(tagger) = tagger else {
        tracing::debug!("no tagger available; tense check skipped");
        return TenseResult::default();
    };

    let narration = strip_dialogue(text);
    let doc = tagger.tag(&narration);

    let (mut past, mut present) = (0usize, 0usize);
    for token in doc.tokens() {
        match token.tag {
            "VBD" | "VBN" => past += 1,
            "VBP" | "VBZ" => present += 1,
            _ => {}
        }
    }

    let total = past + present;
    if total == 0 {
        return TenseResult::default();
    }

    let past_ratio = past as f64 / total as f64;
    let present_ratio = present as f64 / total as f64;
    let (dominant, minority) = if past_ratio >= present_ratio {
        (Tense::Past, present_ratio)
    } else {
        (Tense::Present, past_ratio)
    };

    TenseResult {
        dominant_tense: dominant,
        past_ratio: round_to(past_ratio, 3),
        present_ratio: round_to(present_ratio, 3),
        consistent: minority <= config.minority_threshold,
        minority_ratio: round_to(minority, 3),
    }
}
