//! Deterministic prose metrics.
//!
//! Each analyzer is a pure function of its input text plus configuration.
//! Shared read-only resources (compiled slop lexicon, word frequencies,
//! linguistic tagger) are owned by a [`TextAnalyzer`] constructed once and
//! passed to whoever needs them.

pub mod allowlist;
pub mod basics;
pub mod frequency;
pub mod repetition;
pub mod slop;
pub mod structure;
pub mod tagger;
pub mod vocabulary;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::lexicon::{Lexicon, LexiconError};

pub use allowlist::build_story_allowlist;
pub use basics::{
    check_tense_consistency, check_word_count, strip_dialogue, word_count, Tense, TenseResult,
    WordCountResult,
};
pub use frequency::FrequencyTable;
pub use repetition::{detect_cross_scene_repetition, CrossSceneRepetitionResult};
pub use slop::{SlopDetector, SlopResult};
pub use structure::{compute_prose_structure, ProseStructureResult};
pub use tagger::{HeuristicTagger, LinguisticTagger, Pos, TaggedDoc, TaggedSentence, Token};
pub use vocabulary::{compute_vocabulary_metrics, VocabularyResult};

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(x: f64, places: i32) -> f64 {
    let m = 10f64.powi(places);
    (x * m).round() / m
}

/// Mean and population standard deviation; `(0, 0)` for no values.
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Every deterministic signal for one piece of prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterministicReport {
    pub word_count: WordCountResult,
    pub tense: TenseResult,
    pub slop: SlopResult,
    pub structure: ProseStructureResult,
    pub vocabulary: VocabularyResult,
    pub repetition: CrossSceneRepetitionResult,
}

impl DeterministicReport {
    /// Structural then vocabulary explanation lines for raised flags.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = self.structure.summary_lines();
        lines.extend(self.vocabulary.summary_lines());
        lines
    }
}

/// Owner of the analyzers' shared resources.
pub struct TextAnalyzer {
    detector: SlopDetector,
    frequencies: Arc<FrequencyTable>,
    tagger: Option<Box<dyn LinguisticTagger>>,
}

impl std::fmt::Debug for TextAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextAnalyzer")
            .field("phrase_patterns", &self.detector.phrase_pattern_count())
            .field("frequencies", &self.frequencies.len())
            .field("tagger", &self.tagger.as_ref().map(|t| t.name()))
            .finish()
    }
}

impl TextAnalyzer {
    pub fn new(
        lexicon: &Lexicon,
        frequencies: Arc<FrequencyTable>,
        tagger: Option<Box<dyn LinguisticTagger>>,
    ) -> Self {
        Self {
            detector: SlopDetector::new(lexicon),
            frequencies,
            tagger,
        }
    }

    /// Bundled lexicon and frequency table with the heuristic tagger.
    pub fn bundled() -> Result<Self, LexiconError> {
        Ok(Self::new(
            Lexicon::shared()?,
            Arc::new(FrequencyTable::bundled().clone()),
            Some(Box::new(HeuristicTagger)),
        ))
    }

    pub fn with_tagger(mut self, tagger: Option<Box<dyn LinguisticTagger>>) -> Self {
        self.tagger = tagger;
        self
    }

    pub fn tagger(&self) -> Option<&dyn LinguisticTagger> {
        self.tagger.as_deref()
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.frequencies
    }

    pub fn slop(&self, text: &str, allowlist: &HashSet<String>, config: &PipelineConfig) -> SlopResult {
        self.detector.score(text, allowlist, &config.slop)
    }

    /// Run every analyzer over `text`. `prior_texts` are the finalized texts of
    /// earlier units, used for cross-unit repetition.
    pub fn analyze<S: AsRef<str>>(
        &self,
        text: &str,
        target_word_count: i64,
        allowlist: &HashSet<String>,
        prior_texts: &[S],
        config: &PipelineConfig,
    ) -> DeterministicReport {
        let tagger = self.tagger();
        let report = DeterministicReport {
            word_count: check_word_count(text, target_word_count, &config.word_count),
            tense: check_tense_consistency(text, tagger, &config.tense),
            slop: self.detector.score(text, allowlist, &config.slop),
            structure: compute_prose_structure(text, tagger, &config.structure),
            vocabulary: compute_vocabulary_metrics(text, &self.frequencies, &config.vocabulary),
            repetition: detect_cross_scene_repetition(
                text,
                prior_texts,
                &self.frequencies,
                &config.repetition,
            ),
        };
        tracing::debug!(
            words = report.word_count.actual,
            slop_ratio = report.slop.slop_ratio,
            mtld = report.vocabulary.mtld,
            repeats = report.repetition.repeated_count,
            "deterministic analysis complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_half_away_from_zero() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.25, 1), -0.3);
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);
    }

    #[test]
    fn mean_std_is_population() {
        assert_eq!(mean_std(&[]), (0.0, 0.0));
        assert_eq!(mean_std(&[4.0]), (4.0, 0.0));
        assert_eq!(mean_std(&[2.0, 4.0]), (3.0, 1.0));
    }

    #[test]
    fn analyze_without_tagger_fails_open() {
        let analyzer = TextAnalyzer::bundled().unwrap().with_tagger(None);
        let text = "She walked to the door and opened it slowly. The hall was dark.";
        let report = analyzer.analyze(text, 13, &HashSet::new(), &[] as &[&str], &PipelineConfig::default());
        assert_eq!(report.word_count.actual, 13);
        assert!(report.word_count.within_tolerance);
        assert_eq!(report.tense.dominant_tense, Tense::Unknown);
        assert!(report.tense.consistent);
        assert_eq!(report.structure, ProseStructureResult::default());
        assert_eq!(report.repetition.repeated_count, 0);
    }

    #[test]
    fn analyze_with_priors_finds_repeats() {
        let analyzer = TextAnalyzer::bundled().unwrap();
        let prior = vec!["The brass lantern swung above the harbor at night.".to_string()];
        let text = "Again the brass lantern swung above the harbor, and she watched it.";
        let report = analyzer.analyze(text, 0, &HashSet::new(), &prior, &PipelineConfig::default());
        assert_eq!(report.repetition.repeated_count, 1);
        assert_eq!(
            report.repetition.repeated_phrases[0],
            "the brass lantern swung above the harbor"
        );
        assert!(format!("{analyzer:?}").contains("heuristic"));
    }
}
