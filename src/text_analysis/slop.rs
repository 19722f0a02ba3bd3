//! Cliché phrase and overused word detection.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::round_to;
use crate::config::SlopConfig;
use crate::lexicon::{Lexicon, LexiconError};

/// Phrases shorter than this (after trimming) never match; they produce too
/// many false positives inside ordinary words.
const MIN_PHRASE_LEN: usize = 3;

/// Characters trimmed from whitespace tokens before word lookup.
const WORD_TRIM: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '-'];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopResult {
    /// Display strings, heaviest first: `"\"a testament to\" x2 (weight: 0.97)"`.
    pub found_phrases: Vec<String>,
    pub total_words: usize,
    /// 1.0 is clean, 0.0 is saturated.
    pub slop_ratio: f64,
    /// Total phrase matches, counting repeats.
    pub phrase_count: usize,
    pub unique_phrase_count: usize,
    /// Overused word -> occurrences beyond the free allowance.
    pub found_words: BTreeMap<String, usize>,
    pub weighted_penalty: f64,
}

impl Default for SlopResult {
    fn default() -> Self {
        Self {
            found_phrases: Vec::new(),
            total_words: 0,
            slop_ratio: 1.0,
            phrase_count: 0,
            unique_phrase_count: 0,
            found_words: BTreeMap::new(),
            weighted_penalty: 0.0,
        }
    }
}

impl SlopResult {
    pub fn is_clean(&self) -> bool {
        self.phrase_count == 0 && self.found_words.is_empty()
    }
}

#[derive(Debug)]
struct CompiledPhrase {
    pattern: Regex,
    weight: f64,
}

/// Lexicon compiled into case-insensitive word-boundary patterns.
#[derive(Debug)]
pub struct SlopDetector {
    phrases: Vec<CompiledPhrase>,
    words: Vec<(String, f64)>,
}

struct PhraseGroup {
    example: String,
    count: usize,
    weight: f64,
}

impl SlopDetector {
    pub fn new(lexicon: &Lexicon) -> Self {
        let phrases = lexicon
            .phrases(0.0)
            .filter(|t| t.term.trim().chars().count() >= MIN_PHRASE_LEN)
            .filter_map(|t| {
                let source = format!(r"(?i)\b{}\b", regex::escape(t.term.trim()));
                match Regex::new(&source) {
                    Ok(pattern) => Some(CompiledPhrase {
                        pattern,
                        weight: t.weight,
                    }),
                    Err(e) => {
                        tracing::warn!(phrase = %t.term, error = %e, "skipping uncompilable slop phrase");
                        None
                    }
                }
            })
            .collect();
        let words = lexicon
            .words(0.0)
            .map(|t| (t.term.to_lowercase(), t.weight))
            .collect();
        Self { phrases, words }
    }

    /// Detector over the process-wide bundled lexicon.
    pub fn bundled() -> Result<Self, LexiconError> {
        Ok(Self::new(Lexicon::shared()?))
    }

    pub fn phrase_pattern_count(&self) -> usize {
        self.phrases.len()
    }

    /// Score `text`. Matches whose lowercase form is in `allowlist` are
    /// ignored, as are allowlisted overused words.
    pub fn score(&self, text: &str, allowlist: &HashSet<String>, config: &SlopConfig) -> SlopResult {
        let total_words = text.split_whitespace().count();
        if text.trim().is_empty() || total_words == 0 {
            return SlopResult::default();
        }

        // Overlapping phrases each count; grouping is by lowercase match text.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, PhraseGroup> = HashMap::new();
        for phrase in &self.phrases {
            for m in phrase.pattern.find_iter(text) {
                let key = m.as_str().to_lowercase();
                if allowlist.contains(&key) {
                    continue;
                }
                match groups.get_mut(&key) {
                    Some(group) => {
                        group.count += 1;
                        group.weight = group.weight.max(phrase.weight);
                    }
                    None => {
                        order.push(key.clone());
                        groups.insert(
                            key,
                            PhraseGroup {
                                example: m.as_str().to_string(),
                                count: 1,
                                weight: phrase.weight,
                            },
                        );
                    }
                }
            }
        }

        let mut ranked: Vec<&PhraseGroup> = order.iter().filter_map(|k| groups.get(k)).collect();
        ranked.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut penalty = 0.0;
        let mut phrase_count = 0;
        let mut found_phrases = Vec::with_capacity(ranked.len());
        for group in &ranked {
            phrase_count += group.count;
            penalty += group.count as f64 * group.weight;
            found_phrases.push(if group.count > 1 {
                format!(
                    "\"{}\" x{} (weight: {:.2})",
                    group.example, group.count, group.weight
                )
            } else {
                format!("\"{}\" (weight: {:.2})", group.example, group.weight)
            });
        }

        let mut word_counts: HashMap<String, usize> = HashMap::new();
        for raw in text.split_whitespace() {
            let lower = raw.to_lowercase();
            let word = lower.trim_matches(WORD_TRIM);
            if !word.is_empty() {
                *word_counts.entry(word.to_string()).or_default() += 1;
            }
        }

        let mut found_words = BTreeMap::new();
        for (word, weight) in &self.words {
            if *weight < config.word_min_severity || allowlist.contains(word) {
                continue;
            }
            let count = word_counts.get(word).copied().unwrap_or(0);
            if count > config.word_free_occurrences {
                let excess = count - config.word_free_occurrences;
                found_words.insert(word.clone(), excess);
                penalty += excess as f64 * config.word_excess_weight * weight;
            }
        }

        let ratio = (1.0 - penalty / total_words as f64 * config.phrase_penalty_scale).max(0.0);

        SlopResult {
            unique_phrase_count: found_phrases.len(),
            found_phrases,
            total_words,
            slop_ratio: round_to(ratio, 2),
            phrase_count,
            found_words,
            weighted_penalty: round_to(penalty, 3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(phrases: &str, words: &str) -> SlopDetector {
        SlopDetector::new(&Lexicon::from_json(phrases, words).unwrap())
    }

    fn filler(n: usize) -> String {
        vec!["stone"; n].join(" ")
    }

    #[test]
    fn empty_text_is_clean() {
        let d = detector(r#"[["delve into", 0.0]]"#, r#"[["delve", 1]]"#);
        let r = d.score("   ", &HashSet::new(), &SlopConfig::default());
        assert_eq!(r.slop_ratio, 1.0);
        assert_eq!(r.total_words, 0);
        assert!(r.is_clean());
    }

    #[test]
    fn repeated_phrase_is_grouped_case_insensitively() {
        let d = detector(r#"[["a testament to", 0.0]]"#, r#"[["zzz", 1]]"#);
        let text = format!(
            "It was a testament to grit. A Testament To patience. {}",
            filler(90)
        );
        let r = d.score(&text, &HashSet::new(), &SlopConfig::default());
        assert_eq!(r.phrase_count, 2);
        assert_eq!(r.unique_phrase_count, 1);
        assert_eq!(r.found_phrases, vec!["\"a testament to\" x2 (weight: 1.00)"]);
        assert_eq!(r.weighted_penalty, 2.0);
        // 1 - 2/100 * 10
        assert_eq!(r.total_words, 100);
        assert_eq!(r.slop_ratio, 0.8);
    }

    #[test]
    fn phrase_requires_word_boundaries() {
        let d = detector(r#"[["the anomaly", 0.0]]"#, "[[\"zzz\", 1]]");
        let r = d.score("breathe anomaly", &HashSet::new(), &SlopConfig::default());
        assert_eq!(r.phrase_count, 0);
    }

    #[test]
    fn overlapping_phrases_both_count() {
        let d = detector(
            r#"[["a sense of", 0.5], ["sense of dread", 0.0]]"#,
            r#"[["zzz", 1]]"#,
        );
        let r = d.score("She felt a sense of dread.", &HashSet::new(), &SlopConfig::default());
        assert_eq!(r.phrase_count, 2);
        assert_eq!(r.unique_phrase_count, 2);
        assert!(r.found_phrases[0].starts_with("\"sense of dread\""));
    }

    #[test]
    fn short_phrases_are_skipped() {
        let d = detector(r#"[["ok", 0.0]]"#, r#"[["zzz", 1]]"#);
        assert_eq!(d.phrase_pattern_count(), 0);
    }

    #[test]
    fn allowlisted_matches_are_ignored() {
        let d = detector(
            r#"[["elara", 0.0]]"#,
            r#"[["elara", 10], ["zzz", 1]]"#,
        );
        let allow: HashSet<String> = ["elara".to_string()].into_iter().collect();
        let r = d.score("Elara ran. Elara hid. Elara waited.", &allow, &SlopConfig::default());
        assert!(r.is_clean());
        assert_eq!(r.slop_ratio, 1.0);
    }

    #[test]
    fn overused_word_counts_excess_beyond_first() {
        let d = detector("[]", r#"[["delve", 10], ["very", 1]]"#);
        let text = format!("Delve, delve; (delve) very very very. {}", filler(94));
        let r = d.score(&text, &HashSet::new(), &SlopConfig::default());
        assert_eq!(r.found_words.get("delve"), Some(&2));
        // "very" has weight 0.1, below the severity floor.
        assert!(!r.found_words.contains_key("very"));
        assert_eq!(r.weighted_penalty, 0.6);
        assert_eq!(r.slop_ratio, 0.94);
    }

    #[test]
    fn ratio_floors_at_zero() {
        let d = detector(r#"[["delve into", 0.0]]"#, r#"[["zzz", 1]]"#);
        let r = d.score("delve into delve into", &HashSet::new(), &SlopConfig::default());
        assert_eq!(r.slop_ratio, 0.0);
    }

    #[test]
    fn bundled_detector_flags_common_cliches() {
        let d = SlopDetector::bundled().unwrap();
        let r = d.score(
            "Her silence was a testament to years of grief, and she chose to delve into the past.",
            &HashSet::new(),
            &SlopConfig::default(),
        );
        assert!(r.phrase_count >= 2);
        assert!(r.slop_ratio < 1.0);
    }
}
