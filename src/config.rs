//! Pipeline configuration.
//!
//! Every threshold, weight and model knob lives here so that a run can be
//! tuned from a single TOML file. All sections default sensibly; a config file
//! only needs the values it overrides:
//!
//! ```toml
//! [revisions]
//! max_revisions = 3
//! min_revisions = 1
//!
//! [scoring]
//! approve_threshold = 0.75
//!
//! [slop]
//! phrase_penalty_scale = 12.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::control::RevisionLimits;
use crate::rubric::{RubricError, ScoreCapConfig, ScoringPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid scoring policy: {0}")]
    Scoring(#[from] RubricError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// Analyzer sections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WordCountConfig {
    /// Acceptable fractional deviation from the target, inclusive.
    pub tolerance: f64,
}

impl Default for WordCountConfig {
    fn default() -> Self {
        Self { tolerance: 0.25 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenseConfig {
    /// Largest share of the non-dominant tense still considered consistent.
    pub minority_threshold: f64,
}

impl Default for TenseConfig {
    fn default() -> Self {
        Self {
            minority_threshold: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlopConfig {
    pub phrase_penalty_scale: f64,
    pub word_excess_weight: f64,
    pub word_min_severity: f64,
    pub word_free_occurrences: usize,
}

impl Default for SlopConfig {
    fn default() -> Self {
        Self {
            phrase_penalty_scale: 10.0,
            word_excess_weight: 0.3,
            word_min_severity: 0.5,
            word_free_occurrences: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProseStructureConfig {
    pub opener_monotony_threshold: f64,
    pub length_cv_threshold: f64,
    pub passive_ratio_threshold: f64,
    pub dep_distance_std_threshold: f64,
}

impl Default for ProseStructureConfig {
    fn default() -> Self {
        Self {
            opener_monotony_threshold: 0.30,
            length_cv_threshold: 0.30,
            passive_ratio_threshold: 0.20,
            dep_distance_std_threshold: 0.50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VocabularyConfig {
    pub mtld_threshold: f64,
    pub zipf_threshold: f64,
    pub mattr_window: usize,
    /// Type-token ratio at which an MTLD factor is closed.
    pub mtld_factor_threshold: f64,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            mtld_threshold: 60.0,
            zipf_threshold: 5.5,
            mattr_window: 50,
            mtld_factor_threshold: 0.72,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepetitionConfig {
    pub min_ngram: usize,
    pub max_ngram: usize,
    /// N-grams made only of words above this Zipf value are ignored.
    pub common_zipf_cutoff: f64,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            min_ngram: 4,
            max_ngram: 7,
            common_zipf_cutoff: 5.0,
        }
    }
}

// =============================================================================
// Generation sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub planning_model: String,
    pub writing_model: String,
    pub judge_model: String,
    pub planning_temperature: f32,
    pub writing_temperature: f32,
    pub judge_temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            planning_model: "openai/gpt-5-mini".to_string(),
            writing_model: "openai/gpt-5-mini".to_string(),
            judge_model: "openai/gpt-5-mini".to_string(),
            planning_temperature: 0.3,
            writing_temperature: 0.8,
            judge_temperature: 0.3,
            max_tokens: 8192,
        }
    }
}

/// Knobs that shape the agent system prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    pub num_acts: u32,
    pub scenes_per_act: String,
    pub num_themes: String,
    pub min_word_count: u32,
    pub max_word_count: u32,
    pub prose_style: String,

    pub story_brief_role: String,
    pub character_roster_role: String,
    pub world_context_role: String,
    pub outliner_role: String,
    pub scene_writer_role: String,
    pub judge_role: String,

    pub story_brief_motivation: String,
    pub character_roster_motivation: String,
    pub world_context_motivation: String,
    pub outliner_motivation: String,
    pub scene_writer_motivation: String,

    /// Calibration text placed ahead of the judge rubric.
    pub normalization_guidance: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            num_acts: 1,
            scenes_per_act: "2-3".to_string(),
            num_themes: "2-4".to_string(),
            min_word_count: 800,
            max_word_count: 1200,
            prose_style: "natural and engaging".to_string(),
            story_brief_role: "Plot Architect".to_string(),
            character_roster_role: "Casting Director".to_string(),
            world_context_role: "Lore Master".to_string(),
            outliner_role: "Beat Outliner".to_string(),
            scene_writer_role: "Scene Writer".to_string(),
            judge_role: "Style Editor".to_string(),
            story_brief_motivation:
                "Be specific and creative. The brief drives all downstream writing.".to_string(),
            character_roster_motivation: "Make characters feel real and distinct from each other."
                .to_string(),
            world_context_motivation: "The world should feel consistent and lived-in.".to_string(),
            outliner_motivation: "Be extremely specific. Scene Writers should make ZERO plot \
                decisions; everything should be predetermined in this outline."
                .to_string(),
            scene_writer_motivation: "Output ONLY the scene prose. No headers, no meta-commentary."
                .to_string(),
            normalization_guidance: "Score STRICTLY. A score of 3 means 'competent but with \
                clear weaknesses' and is the expected score for a typical first draft. Score 4 \
                ONLY when the criterion is met with zero weaknesses. Most first drafts should \
                score 2-3 on most dimensions."
                .to_string(),
        }
    }
}

// =============================================================================
// Top level
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub revisions: RevisionLimits,
    pub scoring: ScoringPolicy,
    pub caps: ScoreCapConfig,
    pub word_count: WordCountConfig,
    pub tense: TenseConfig,
    pub slop: SlopConfig,
    pub structure: ProseStructureConfig,
    pub vocabulary: VocabularyConfig,
    pub repetition: RepetitionConfig,
    pub models: ModelConfig,
    pub prompts: PromptConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.caps.validate()?;

        if self.word_count.tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "word_count.tolerance must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tense.minority_threshold) {
            return Err(ConfigError::Invalid(
                "tense.minority_threshold must be within [0, 1]".into(),
            ));
        }
        if self.vocabulary.mattr_window == 0 {
            return Err(ConfigError::Invalid(
                "vocabulary.mattr_window must be positive".into(),
            ));
        }
        let r = &self.repetition;
        if r.min_ngram == 0 || r.min_ngram > r.max_ngram {
            return Err(ConfigError::Invalid(format!(
                "repetition n-gram range {}..={} is empty",
                r.min_ngram, r.max_ngram
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_overrides_only_named_values() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [revisions]
            min_revisions = 1

            [slop]
            phrase_penalty_scale = 12.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.revisions.min_revisions, 1);
        assert_eq!(cfg.revisions.max_revisions, 2);
        assert_eq!(cfg.slop.phrase_penalty_scale, 12.0);
        assert_eq!(cfg.slop.word_excess_weight, 0.3);
        assert_eq!(cfg.structure, ProseStructureConfig::default());
    }

    #[test]
    fn weights_that_do_not_sum_to_one_are_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [scoring.weights]
            style = 0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("weights sum"));
    }

    #[test]
    fn zero_slop_cap_threshold_is_rejected() {
        let err = PipelineConfig::from_toml_str("[caps]\ncap_prose_on_slop_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Scoring(_)));
    }

    #[test]
    fn cap_keys_override_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [caps]
            cap_pacing_on_monotony = 3
            cap_prose_on_slop_count = 5
            cap_prose_on_slop_value = 1
            cap_prose_on_low_diversity = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.caps.cap_pacing_on_monotony.get(), 3);
        assert_eq!(cfg.caps.cap_prose_on_slop_count, 5);
        assert_eq!(cfg.caps.cap_prose_on_slop_value.get(), 1);
        assert_eq!(cfg.caps.cap_prose_on_low_diversity.get(), 2);
    }

    #[test]
    fn misspelled_keys_are_rejected() {
        for raw in [
            "[scoring]\napprove_treshold = 0.9\n",
            "[caps]\npacing_monotony_cap = 3\n",
            "[scoring.penalties]\nopener_monotonyy = 0.1\n",
            "[revisions]\nmax_revision = 4\n",
            "[slop]\nphrase_penalty = 2.0\n",
            "[unknown_section]\nx = 1\n",
        ] {
            let err = PipelineConfig::from_toml_str(raw).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn empty_ngram_range_is_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [repetition]
            min_ngram = 8
            max_ngram = 4
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyloom.toml");
        std::fs::write(&path, "[scoring]\napprove_threshold = 0.8\n").unwrap();
        let cfg = PipelineConfig::load(&path).unwrap();
        assert_eq!(cfg.scoring.approve_threshold, 0.8);
    }
}
