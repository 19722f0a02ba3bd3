//! Vocabulary diversity, word rarity and readability.
//!
//! Diversity uses MTLD (mean length of word runs that keep the type-token
//! ratio above a threshold, averaged over forward and backward passes) and
//! moving-average TTR. Rarity is the mean Zipf frequency of content words.
//! Flesch reading ease and Gunning fog are informational only.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::frequency::FrequencyTable;
use super::round_to;
use super::tagger::split_sentences;
use crate::config::VocabularyConfig;

/// Below this many whitespace tokens every metric is left at its default.
const MIN_WORDS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyResult {
    pub mtld: f64,
    pub mattr: f64,
    pub low_diversity: bool,
    pub avg_zipf_frequency: f64,
    pub vocabulary_basic: bool,
    pub flesch_reading_ease: f64,
    pub gunning_fog: f64,
}

impl VocabularyResult {
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.low_diversity {
            flags.push("low_diversity");
        }
        if self.vocabulary_basic {
            flags.push("basic_vocabulary");
        }
        flags
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.low_diversity {
            lines.push(format!("Lexical diversity MTLD: {:.1} — low variety", self.mtld));
        }
        if self.vocabulary_basic {
            lines.push(format!(
                "Avg Zipf frequency: {:.2} — overly common vocabulary",
                self.avg_zipf_frequency
            ));
        }
        lines
    }
}

pub fn compute_vocabulary_metrics(
    text: &str,
    frequencies: &FrequencyTable,
    config: &VocabularyConfig,
) -> VocabularyResult {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < MIN_WORDS {
        return VocabularyResult::default();
    }

    let tokens = diversity_tokens(text);
    let mtld = mtld(&tokens, config.mtld_factor_threshold);
    let mattr = mattr(&tokens, config.mattr_window.min(words.len()));

    let content: Vec<String> = words
        .iter()
        .filter(|w| w.chars().count() > 3 && w.chars().all(char::is_alphabetic))
        .map(|w| w.to_lowercase())
        .collect();
    let avg_zipf = if content.is_empty() {
        0.0
    } else {
        content.iter().map(|w| frequencies.zipf(w)).sum::<f64>() / content.len() as f64
    };

    let readability = Readability::measure(text);

    VocabularyResult {
        mtld: round_to(mtld, 1),
        mattr: round_to(mattr, 3),
        low_diversity: mtld < config.mtld_threshold,
        avg_zipf_frequency: round_to(avg_zipf, 2),
        vocabulary_basic: avg_zipf > config.zipf_threshold,
        flesch_reading_ease: round_to(readability.flesch_reading_ease(), 1),
        gunning_fog: round_to(readability.gunning_fog(), 1),
    }
}

// =============================================================================
// Lexical diversity
// =============================================================================

/// Lowercased tokens with punctuation removed; bare numbers are dropped.
fn diversity_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty() && !w.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// MTLD averaged over the forward and reversed token streams.
pub fn mtld(tokens: &[String], threshold: f64) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let forward = mtld_pass(tokens.iter(), tokens.len(), threshold);
    let backward = mtld_pass(tokens.iter().rev(), tokens.len(), threshold);
    (forward + backward) / 2.0
}

fn mtld_pass<'a>(tokens: impl Iterator<Item = &'a String>, n: usize, threshold: f64) -> f64 {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut run = 0usize;
    let mut factors = 0.0;
    let mut ttr = 1.0;

    for token in tokens {
        run += 1;
        seen.insert(token.as_str());
        ttr = seen.len() as f64 / run as f64;
        if ttr <= threshold {
            factors += 1.0;
            run = 0;
            seen.clear();
        }
    }
    if run > 0 {
        factors += (1.0 - ttr) / (1.0 - threshold);
    }
    if factors == 0.0 {
        // Every token distinct: the whole text is one unfinished factor.
        factors = 1.0;
    }
    n as f64 / factors
}

/// Mean type-token ratio over every window of `window` consecutive tokens.
pub fn mattr(tokens: &[String], window: usize) -> f64 {
    if tokens.is_empty() || window == 0 {
        return 0.0;
    }
    let window = window.min(tokens.len());

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in &tokens[..window] {
        *counts.entry(t.as_str()).or_default() += 1;
    }
    let mut total = counts.len() as f64 / window as f64;
    let windows = tokens.len() - window + 1;

    for i in window..tokens.len() {
        let leaving = tokens[i - window].as_str();
        if let Some(c) = counts.get_mut(leaving) {
            *c -= 1;
            if *c == 0 {
                counts.remove(leaving);
            }
        }
        *counts.entry(tokens[i].as_str()).or_default() += 1;
        total += counts.len() as f64 / window as f64;
    }
    total / windows as f64
}

// =============================================================================
// Readability
// =============================================================================

struct Readability {
    words: usize,
    sentences: usize,
    syllables: usize,
    complex_words: usize,
}

impl Readability {
    fn measure(text: &str) -> Self {
        let mut words = 0;
        let mut syllables = 0;
        let mut complex_words = 0;
        for raw in text.split_whitespace() {
            let word: String = raw
                .chars()
                .filter(|c| c.is_alphabetic())
                .flat_map(char::to_lowercase)
                .collect();
            if word.is_empty() {
                continue;
            }
            let n = count_syllables(&word);
            words += 1;
            syllables += n;
            if n >= 3 {
                complex_words += 1;
            }
        }
        Self {
            words,
            sentences: split_sentences(text).len().max(1),
            syllables,
            complex_words,
        }
    }

    fn words_per_sentence(&self) -> f64 {
        self.words as f64 / self.sentences as f64
    }

    fn flesch_reading_ease(&self) -> f64 {
        if self.words == 0 {
            return 0.0;
        }
        206.835
            - 1.015 * self.words_per_sentence()
            - 84.6 * (self.syllables as f64 / self.words as f64)
    }

    fn gunning_fog(&self) -> f64 {
        if self.words == 0 {
            return 0.0;
        }
        0.4 * (self.words_per_sentence() + 100.0 * self.complex_words as f64 / self.words as f64)
    }
}

/// Vowel-group syllable estimate for a lowercase alphabetic word. A silent
/// final `e` is dropped unless it ends in `le` after a consonant.
pub fn count_syllables(word: &str) -> usize {
    let chars: Vec<char> = word.chars().collect();
    if chars.is_empty() {
        return 0;
    }
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');

    let mut groups = 0;
    let mut prev_vowel = false;
    for &c in &chars {
        let v = is_vowel(c);
        if v && !prev_vowel {
            groups += 1;
        }
        prev_vowel = v;
    }

    let n = chars.len();
    if n > 2 && chars[n - 1] == 'e' && !is_vowel(chars[n - 2]) {
        let consonant_le = chars[n - 2] == 'l' && !is_vowel(chars[n - 3]);
        if !consonant_le && groups > 1 {
            groups -= 1;
        }
    }
    groups.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        diversity_tokens(s)
    }

    #[test]
    fn short_text_returns_defaults() {
        let r = compute_vocabulary_metrics(
            "Too short to say much.",
            FrequencyTable::bundled(),
            &VocabularyConfig::default(),
        );
        assert_eq!(r, VocabularyResult::default());
        assert!(r.summary_lines().is_empty());
    }

    #[test]
    fn syllable_estimates() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("stone"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("beautiful"), 3);
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("rhythm"), 1);
    }

    #[test]
    fn mattr_of_distinct_tokens_is_one() {
        let t = toks("a b c d e f g h i j");
        assert_eq!(mattr(&t, 5), 1.0);
        let rep = toks("a a a a");
        assert_eq!(mattr(&rep, 2), 0.5);
    }

    #[test]
    fn mtld_all_distinct_is_length() {
        let t = toks("one two three four five six seven eight nine ten eleven");
        assert_eq!(mtld(&t, 0.72), 11.0);
    }

    #[test]
    fn repetitive_text_has_low_diversity() {
        let text = "the cat sat on the mat and the cat sat on the mat ".repeat(10);
        let r = compute_vocabulary_metrics(
            &text,
            FrequencyTable::bundled(),
            &VocabularyConfig::default(),
        );
        assert!(r.mtld < 60.0);
        assert!(r.low_diversity);
        assert!(r.mattr < 0.5);
        assert_eq!(
            r.summary_lines()[0],
            format!("Lexical diversity MTLD: {:.1} — low variety", r.mtld)
        );
    }

    #[test]
    fn common_content_words_are_flagged_basic() {
        let text = "they said that they were there with them when they said that they \
                    were there with them";
        let cfg = VocabularyConfig::default();
        let table = FrequencyTable::from_pairs([
            ("they", 6.5),
            ("said", 6.0),
            ("that", 7.0),
            ("were", 6.6),
            ("there", 6.4),
            ("with", 6.9),
            ("them", 6.3),
            ("when", 6.4),
        ]);
        let r = compute_vocabulary_metrics(text, &table, &cfg);
        assert!(r.avg_zipf_frequency > 5.5);
        assert!(r.vocabulary_basic);
        assert!(r.flags().contains(&"basic_vocabulary"));
    }

    #[test]
    fn readability_is_reported() {
        let text = "The cat sat. The dog ran. The bird flew away. The fish swam fast.";
        let r = compute_vocabulary_metrics(
            text,
            FrequencyTable::bundled(),
            &VocabularyConfig::default(),
        );
        assert!(r.flesch_reading_ease > 90.0);
        assert!(r.gunning_fog < 5.0);
    }
}
