//! Verbatim phrase reuse across scenes.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::frequency::FrequencyTable;
use crate::config::RepetitionConfig;

const NGRAM_TRIM: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '-', '\u{2014}', '\u{2013}',
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossSceneRepetitionResult {
    /// Longest first; no entry is a substring of another.
    pub repeated_phrases: Vec<String>,
    pub repeated_count: usize,
}

fn extract_ngrams(text: &str, min_n: usize, max_n: usize) -> HashSet<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(NGRAM_TRIM))
        .filter(|w| !w.is_empty())
        .collect();

    let mut ngrams = HashSet::new();
    for n in min_n..=max_n {
        if n == 0 || n > words.len() {
            continue;
        }
        for window in words.windows(n) {
            ngrams.insert(window.join(" "));
        }
    }
    ngrams
}

/// An n-gram made only of very frequent words is an ordinary collocation.
fn is_common_collocation(ngram: &str, frequencies: &FrequencyTable, cutoff: f64) -> bool {
    ngram.split(' ').all(|w| frequencies.zipf(w) > cutoff)
}

/// Find n-grams of the current scene that already appeared in any prior scene.
pub fn detect_cross_scene_repetition<S: AsRef<str>>(
    current: &str,
    prior_scenes: &[S],
    frequencies: &FrequencyTable,
    config: &RepetitionConfig,
) -> CrossSceneRepetitionResult {
    if prior_scenes.is_empty() || current.trim().is_empty() {
        return CrossSceneRepetitionResult::default();
    }

    let current_ngrams = extract_ngrams(current, config.min_ngram, config.max_ngram);
    let mut prior_ngrams = HashSet::new();
    for prior in prior_scenes.iter().map(AsRef::as_ref) {
        if !prior.trim().is_empty() {
            prior_ngrams.extend(extract_ngrams(prior, config.min_ngram, config.max_ngram));
        }
    }

    let shared: BTreeSet<&String> = current_ngrams.intersection(&prior_ngrams).collect();
    let mut repeated: Vec<&String> = shared
        .into_iter()
        .filter(|ng| !is_common_collocation(ng, frequencies, config.common_zipf_cutoff))
        .collect();
    repeated.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut kept: Vec<String> = Vec::new();
    for phrase in repeated {
        if !kept.iter().any(|longer| longer.contains(phrase.as_str())) {
            kept.push(phrase.clone());
        }
    }

    CrossSceneRepetitionResult {
        repeated_count: kept.len(),
        repeated_phrases: kept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(current: &str, prior: &[&str]) -> CrossSceneRepetitionResult {
        detect_cross_scene_repetition(
            current,
            prior,
            FrequencyTable::bundled(),
            &RepetitionConfig::default(),
        )
    }

    #[test]
    fn no_priors_or_blank_current_is_empty() {
        assert_eq!(detect("anything at all here", &[]), CrossSceneRepetitionResult::default());
        assert_eq!(detect("   ", &["x y z w"]), CrossSceneRepetitionResult::default());
    }

    #[test]
    fn shared_phrase_is_reported_once_at_its_longest() {
        let prior = "The lighthouse keeper polished brass lanterns every dusk.";
        let current = "At noon the lighthouse keeper polished brass lanterns again.";
        let r = detect(current, &[prior]);
        assert_eq!(r.repeated_count, 1);
        assert_eq!(
            r.repeated_phrases,
            vec!["the lighthouse keeper polished brass lanterns"]
        );
    }

    #[test]
    fn punctuation_and_case_are_normalized() {
        let prior = "\"Crimson lanterns swayed gently,\" she noted.";
        let current = "Crimson lanterns swayed gently — above.";
        let r = detect(current, &[prior]);
        assert_eq!(r.repeated_phrases, vec!["crimson lanterns swayed gently"]);
    }

    #[test]
    fn common_collocations_are_ignored() {
        let prior = "and then she said that it was in the";
        let current = "so she said that it was in the end";
        let r = detect(current, &[prior]);
        assert!(r.repeated_phrases.is_empty());
    }

    #[test]
    fn blank_priors_are_skipped() {
        let r = detect("crimson lanterns swayed gently", &["", "crimson lanterns swayed gently"]);
        assert_eq!(r.repeated_count, 1);
    }
}
