//! Composite scene rubric.
//!
//! A [`SceneRubric`] holds the deterministic gates, the five judged dimensions
//! (1–4), the six advisory flags and the cross-scene repetition count, plus the
//! [`ScoringPolicy`] it is scored under, so the composite score is a pure
//! function of the record. Approval requires the score to clear the policy
//! threshold, no dimension at the minimum and both deterministic gates.
//!
//! ```text
//! normalized = (Σ weight_d · score_d − 1) / 3
//! score      = round2(clamp01(normalized − advisory_penalty))
//! ```

use serde::{Deserialize, Serialize};

use crate::text_analysis::{round_to, DeterministicReport};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RubricError {
    #[error("dimension score {0} outside 1..=4")]
    InvalidScore(i64),
    #[error("{field} = {value} outside [0, 1]")]
    InvalidRatio { field: &'static str, value: f64 },
    #[error("dimension weights sum to {0}, expected 1.0")]
    WeightSum(f64),
    #[error("{0} must be non-negative")]
    Negative(&'static str),
    #[error("scene id must not be empty")]
    EmptySceneId,
}

// =============================================================================
// Validated scalars
// =============================================================================

/// A judged dimension score, always within `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct DimensionScore(u8);

impl DimensionScore {
    pub const MIN: DimensionScore = DimensionScore(1);
    pub const MAX: DimensionScore = DimensionScore(4);

    pub fn new(value: u8) -> Result<Self, RubricError> {
        Self::try_from(i64::from(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Lower to `ceiling` if above it; never raises.
    pub fn capped(self, ceiling: DimensionScore) -> Self {
        self.min(ceiling)
    }
}

impl TryFrom<i64> for DimensionScore {
    type Error = RubricError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (1..=4).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(RubricError::InvalidScore(value))
        }
    }
}

impl From<DimensionScore> for u8 {
    fn from(s: DimensionScore) -> u8 {
        s.0
    }
}

impl std::fmt::Display for DimensionScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A finite value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct UnitInterval(f64);

impl UnitInterval {
    pub const ONE: UnitInterval = UnitInterval(1.0);

    pub fn new(field: &'static str, value: f64) -> Result<Self, RubricError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RubricError::InvalidRatio { field, value })
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for UnitInterval {
    type Error = RubricError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new("ratio", value)
    }
}

impl From<UnitInterval> for f64 {
    fn from(v: UnitInterval) -> f64 {
        v.0
    }
}

// =============================================================================
// Dimensions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    StyleAdherence,
    CharacterVoice,
    OutlineAdherence,
    Pacing,
    ProseQuality,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::StyleAdherence,
        Dimension::CharacterVoice,
        Dimension::OutlineAdherence,
        Dimension::Pacing,
        Dimension::ProseQuality,
    ];

    /// Short label used in one-line summaries.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::StyleAdherence => "style",
            Dimension::CharacterVoice => "voice",
            Dimension::OutlineAdherence => "outline",
            Dimension::Pacing => "pacing",
            Dimension::ProseQuality => "prose",
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Dimension::StyleAdherence => "style_adherence",
            Dimension::CharacterVoice => "character_voice",
            Dimension::OutlineAdherence => "outline_adherence",
            Dimension::Pacing => "pacing",
            Dimension::ProseQuality => "prose_quality",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub style_adherence: DimensionScore,
    pub character_voice: DimensionScore,
    pub outline_adherence: DimensionScore,
    pub pacing: DimensionScore,
    pub prose_quality: DimensionScore,
}

impl DimensionScores {
    pub fn uniform(score: DimensionScore) -> Self {
        Self {
            style_adherence: score,
            character_voice: score,
            outline_adherence: score,
            pacing: score,
            prose_quality: score,
        }
    }

    pub fn get(&self, dimension: Dimension) -> DimensionScore {
        match dimension {
            Dimension::StyleAdherence => self.style_adherence,
            Dimension::CharacterVoice => self.character_voice,
            Dimension::OutlineAdherence => self.outline_adherence,
            Dimension::Pacing => self.pacing,
            Dimension::ProseQuality => self.prose_quality,
        }
    }

    pub fn set(&mut self, dimension: Dimension, score: DimensionScore) {
        let slot = match dimension {
            Dimension::StyleAdherence => &mut self.style_adherence,
            Dimension::CharacterVoice => &mut self.character_voice,
            Dimension::OutlineAdherence => &mut self.outline_adherence,
            Dimension::Pacing => &mut self.pacing,
            Dimension::ProseQuality => &mut self.prose_quality,
        };
        *slot = score;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, DimensionScore)> + '_ {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    pub fn lowest(&self) -> DimensionScore {
        self.iter()
            .map(|(_, s)| s)
            .min()
            .unwrap_or(DimensionScore::MIN)
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Per-dimension weights; non-negative and summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimensionWeights {
    pub style: f64,
    pub voice: f64,
    pub outline: f64,
    pub pacing: f64,
    pub prose: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            style: 0.20,
            voice: 0.20,
            outline: 0.20,
            pacing: 0.20,
            prose: 0.20,
        }
    }
}

impl DimensionWeights {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::StyleAdherence => self.style,
            Dimension::CharacterVoice => self.voice,
            Dimension::OutlineAdherence => self.outline,
            Dimension::Pacing => self.pacing,
            Dimension::ProseQuality => self.prose,
        }
    }

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.weight(*d)).sum()
    }

    pub fn validate(&self) -> Result<(), RubricError> {
        for d in Dimension::ALL {
            let w = self.weight(d);
            if !w.is_finite() || w < 0.0 {
                return Err(RubricError::Negative(d.field_name()));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(RubricError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Soft score deductions for advisory signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdvisoryPenalties {
    pub opener_monotony: f64,
    pub length_monotony: f64,
    pub passive_heavy: f64,
    pub structural_monotony: f64,
    pub low_diversity: f64,
    pub vocabulary_basic: f64,
    pub cross_scene_per_repeat: f64,
    pub cross_scene_max_repeats: usize,
}

impl Default for AdvisoryPenalties {
    fn default() -> Self {
        Self {
            opener_monotony: 0.04,
            length_monotony: 0.04,
            passive_heavy: 0.02,
            structural_monotony: 0.02,
            low_diversity: 0.04,
            vocabulary_basic: 0.02,
            cross_scene_per_repeat: 0.02,
            cross_scene_max_repeats: 3,
        }
    }
}

impl AdvisoryPenalties {
    pub fn validate(&self) -> Result<(), RubricError> {
        for (name, v) in [
            ("penalties.opener_monotony", self.opener_monotony),
            ("penalties.length_monotony", self.length_monotony),
            ("penalties.passive_heavy", self.passive_heavy),
            ("penalties.structural_monotony", self.structural_monotony),
            ("penalties.low_diversity", self.low_diversity),
            ("penalties.vocabulary_basic", self.vocabulary_basic),
            ("penalties.cross_scene_per_repeat", self.cross_scene_per_repeat),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(RubricError::Negative(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScoringPolicyRecord {
    weights: DimensionWeights,
    penalties: AdvisoryPenalties,
    approve_threshold: f64,
}

impl Default for ScoringPolicyRecord {
    fn default() -> Self {
        let p = ScoringPolicy::default();
        Self {
            weights: p.weights,
            penalties: p.penalties,
            approve_threshold: p.approve_threshold,
        }
    }
}

/// Weights, penalties and approval threshold. Deserialization validates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScoringPolicyRecord")]
pub struct ScoringPolicy {
    pub weights: DimensionWeights,
    pub penalties: AdvisoryPenalties,
    pub approve_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weights: DimensionWeights::default(),
            penalties: AdvisoryPenalties::default(),
            approve_threshold: 0.70,
        }
    }
}

impl TryFrom<ScoringPolicyRecord> for ScoringPolicy {
    type Error = RubricError;

    fn try_from(r: ScoringPolicyRecord) -> Result<Self, Self::Error> {
        let policy = Self {
            weights: r.weights,
            penalties: r.penalties,
            approve_threshold: r.approve_threshold,
        };
        policy.validate()?;
        Ok(policy)
    }
}

impl ScoringPolicy {
    pub fn validate(&self) -> Result<(), RubricError> {
        self.weights.validate()?;
        self.penalties.validate()?;
        UnitInterval::new("approve_threshold", self.approve_threshold)?;
        Ok(())
    }
}

/// Ceilings applied to judged scores when automated signals contradict them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreCapConfig {
    /// Pacing ceiling under opener or length monotony.
    pub cap_pacing_on_monotony: DimensionScore,
    /// Confirmed clichés needed before the prose ceiling applies.
    pub cap_prose_on_slop_count: usize,
    pub cap_prose_on_slop_value: DimensionScore,
    /// Prose ceiling under low lexical diversity.
    pub cap_prose_on_low_diversity: DimensionScore,
}

impl Default for ScoreCapConfig {
    fn default() -> Self {
        Self {
            cap_pacing_on_monotony: DimensionScore(2),
            cap_prose_on_slop_value: DimensionScore(2),
            cap_prose_on_slop_count: 3,
            cap_prose_on_low_diversity: DimensionScore(3),
        }
    }
}

impl ScoreCapConfig {
    pub fn validate(&self) -> Result<(), RubricError> {
        if self.cap_prose_on_slop_count == 0 {
            return Err(RubricError::Negative("caps.cap_prose_on_slop_count"));
        }
        Ok(())
    }
}

/// Lower judged scores that the automated analysis contradicts.
pub fn apply_score_caps(
    mut scores: DimensionScores,
    flags: &AdvisoryFlags,
    confirmed_slop: usize,
    caps: &ScoreCapConfig,
) -> DimensionScores {
    if flags.opener_monotony || flags.length_monotony {
        scores.pacing = scores.pacing.capped(caps.cap_pacing_on_monotony);
    }
    if confirmed_slop >= caps.cap_prose_on_slop_count {
        scores.prose_quality = scores.prose_quality.capped(caps.cap_prose_on_slop_value);
    }
    if flags.low_diversity {
        scores.prose_quality = scores.prose_quality.capped(caps.cap_prose_on_low_diversity);
    }
    scores
}

// =============================================================================
// Rubric
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryFlags {
    pub opener_monotony: bool,
    pub length_monotony: bool,
    pub passive_heavy: bool,
    pub structural_monotony: bool,
    pub low_diversity: bool,
    pub vocabulary_basic: bool,
}

impl AdvisoryFlags {
    pub fn from_report(report: &DeterministicReport) -> Self {
        Self {
            opener_monotony: report.structure.opener_monotony,
            length_monotony: report.structure.length_monotony,
            passive_heavy: report.structure.passive_heavy,
            structural_monotony: report.structure.structural_monotony,
            low_diversity: report.vocabulary.low_diversity,
            vocabulary_basic: report.vocabulary.vocabulary_basic,
        }
    }

    pub fn structural(&self) -> Vec<&'static str> {
        [
            (self.opener_monotony, "opener_monotony"),
            (self.length_monotony, "length_monotony"),
            (self.passive_heavy, "passive_heavy"),
            (self.structural_monotony, "structural_monotony"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }

    pub fn vocabulary(&self) -> Vec<&'static str> {
        [
            (self.low_diversity, "low_diversity"),
            (self.vocabulary_basic, "basic_vocabulary"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

/// The scoring record for one evaluation of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRubric {
    pub word_count_in_range: bool,
    pub tense_consistent: bool,
    /// 1.0 clean, 0.0 saturated.
    pub slop_ratio: UnitInterval,
    pub scores: DimensionScores,
    #[serde(default)]
    pub flags: AdvisoryFlags,
    #[serde(default)]
    pub cross_scene_repetitions: usize,
    #[serde(default)]
    pub dimension_reasoning: String,
    #[serde(default)]
    pub policy: ScoringPolicy,
}

impl SceneRubric {
    /// Rubric with clean deterministic signals and the given scores.
    pub fn new(scores: DimensionScores, policy: ScoringPolicy) -> Self {
        Self {
            word_count_in_range: true,
            tense_consistent: true,
            slop_ratio: UnitInterval::ONE,
            scores,
            flags: AdvisoryFlags::default(),
            cross_scene_repetitions: 0,
            dimension_reasoning: String::new(),
            policy,
        }
    }

    /// Combine deterministic analysis with (already capped) judged scores.
    pub fn from_analysis(
        report: &DeterministicReport,
        scores: DimensionScores,
        reasoning: impl Into<String>,
        policy: ScoringPolicy,
    ) -> Result<Self, RubricError> {
        Ok(Self {
            word_count_in_range: report.word_count.within_tolerance,
            tense_consistent: report.tense.consistent,
            slop_ratio: UnitInterval::new("slop_ratio", report.slop.slop_ratio)?,
            scores,
            flags: AdvisoryFlags::from_report(report),
            cross_scene_repetitions: report.repetition.repeated_count,
            dimension_reasoning: reasoning.into(),
            policy,
        })
    }

    /// Total soft deduction from the advisory flags and repetitions.
    pub fn advisory_penalty(&self) -> f64 {
        let p = &self.policy.penalties;
        let f = &self.flags;
        let mut penalty = 0.0;
        for (on, amount) in [
            (f.opener_monotony, p.opener_monotony),
            (f.length_monotony, p.length_monotony),
            (f.passive_heavy, p.passive_heavy),
            (f.structural_monotony, p.structural_monotony),
            (f.low_diversity, p.low_diversity),
            (f.vocabulary_basic, p.vocabulary_basic),
        ] {
            if on {
                penalty += amount;
            }
        }
        let repeats = self.cross_scene_repetitions.min(p.cross_scene_max_repeats);
        penalty + p.cross_scene_per_repeat * repeats as f64
    }

    pub fn compute_quality_score(&self) -> f64 {
        let weighted: f64 = self
            .scores
            .iter()
            .map(|(d, s)| self.policy.weights.weight(d) * f64::from(s.get()))
            .sum();
        let normalized = (weighted - 1.0) / 3.0;
        round_to((normalized - self.advisory_penalty()).clamp(0.0, 1.0), 2)
    }

    pub fn has_critical_failure(&self) -> bool {
        self.scores.iter().any(|(_, s)| s <= DimensionScore::MIN)
    }

    pub fn compute_approved(&self) -> bool {
        self.compute_quality_score() >= self.policy.approve_threshold
            && !self.has_critical_failure()
            && self.word_count_in_range
            && self.tense_consistent
    }

    /// `style=X/4 voice=X/4 outline=X/4 pacing=X/4 prose=X/4`
    pub fn dimension_summary(&self) -> String {
        self.scores
            .iter()
            .map(|(d, s)| format!("{}={}/4", d.label(), s))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =============================================================================
// Judge output and feedback
// =============================================================================

/// What the judge model returns. Reasoning comes first so the model argues
/// before it scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    #[serde(default)]
    pub dimension_reasoning: String,
    pub style_adherence: DimensionScore,
    pub character_voice: DimensionScore,
    pub outline_adherence: DimensionScore,
    pub pacing: DimensionScore,
    pub prose_quality: DimensionScore,
    /// Flagged candidates the judge agrees are clichés in context.
    #[serde(default)]
    pub confirmed_slop: Vec<String>,
    #[serde(default)]
    pub revision_instructions: String,
    #[serde(default)]
    pub overall_assessment: String,
}

impl JudgeVerdict {
    pub fn scores(&self) -> DimensionScores {
        DimensionScores {
            style_adherence: self.style_adherence,
            character_voice: self.character_voice,
            outline_adherence: self.outline_adherence,
            pacing: self.pacing,
            prose_quality: self.prose_quality,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FeedbackRecord {
    scene_id: String,
    #[serde(default = "default_editor")]
    editor_name: String,
    rubric: SceneRubric,
    #[serde(default)]
    revision_instructions: String,
    #[serde(default)]
    overall_assessment: String,
    #[serde(default)]
    confirmed_slop: Vec<String>,
}

fn default_editor() -> String {
    "style_editor".to_string()
}

/// Outcome of one evaluation. Score and approval are derived from the rubric
/// at construction and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeedbackRecord")]
pub struct Feedback {
    scene_id: String,
    editor_name: String,
    rubric: SceneRubric,
    quality_score: f64,
    approved: bool,
    revision_instructions: String,
    overall_assessment: String,
    confirmed_slop: Vec<String>,
}

impl TryFrom<FeedbackRecord> for Feedback {
    type Error = RubricError;

    fn try_from(r: FeedbackRecord) -> Result<Self, Self::Error> {
        r.rubric.policy.validate()?;
        let mut feedback = Feedback::new(
            r.scene_id,
            r.rubric,
            r.revision_instructions,
            r.overall_assessment,
            r.confirmed_slop,
        )?;
        feedback.editor_name = r.editor_name;
        Ok(feedback)
    }
}

impl Feedback {
    pub fn new(
        scene_id: impl Into<String>,
        rubric: SceneRubric,
        revision_instructions: impl Into<String>,
        overall_assessment: impl Into<String>,
        confirmed_slop: Vec<String>,
    ) -> Result<Self, RubricError> {
        let scene_id = scene_id.into();
        if scene_id.trim().is_empty() {
            return Err(RubricError::EmptySceneId);
        }
        Ok(Self {
            scene_id,
            editor_name: default_editor(),
            quality_score: rubric.compute_quality_score(),
            approved: rubric.compute_approved(),
            rubric,
            revision_instructions: revision_instructions.into(),
            overall_assessment: overall_assessment.into(),
            confirmed_slop,
        })
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn editor_name(&self) -> &str {
        &self.editor_name
    }

    pub fn rubric(&self) -> &SceneRubric {
        &self.rubric
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    pub fn revision_instructions(&self) -> &str {
        &self.revision_instructions
    }

    pub fn overall_assessment(&self) -> &str {
        &self.overall_assessment
    }

    pub fn confirmed_slop(&self) -> &[String] {
        &self.confirmed_slop
    }
}

/// Per-evaluation trend numbers for the report table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetrics {
    pub scene_id: String,
    pub word_count: usize,
    pub slop_ratio: f64,
    pub mtld: f64,
    pub opener_ratio: f64,
    pub sent_length_cv: f64,
}

impl SceneMetrics {
    pub fn from_report(scene_id: impl Into<String>, report: &DeterministicReport) -> Self {
        Self {
            scene_id: scene_id.into(),
            word_count: report.word_count.actual,
            slop_ratio: report.slop.slop_ratio,
            mtld: report.vocabulary.mtld,
            opener_ratio: report.structure.top_opener_ratio,
            sent_length_cv: report.structure.sent_length_cv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: u8) -> DimensionScore {
        DimensionScore::new(v).unwrap()
    }

    fn rubric(scores: [u8; 5]) -> SceneRubric {
        SceneRubric::new(
            DimensionScores {
                style_adherence: s(scores[0]),
                character_voice: s(scores[1]),
                outline_adherence: s(scores[2]),
                pacing: s(scores[3]),
                prose_quality: s(scores[4]),
            },
            ScoringPolicy::default(),
        )
    }

    fn all_flags() -> AdvisoryFlags {
        AdvisoryFlags {
            opener_monotony: true,
            length_monotony: true,
            passive_heavy: true,
            structural_monotony: true,
            low_diversity: true,
            vocabulary_basic: true,
        }
    }

    fn every_score_combo() -> impl Iterator<Item = [u8; 5]> {
        (0..4u32.pow(5)).map(|mut n| {
            let mut out = [0u8; 5];
            for slot in out.iter_mut() {
                *slot = (n % 4) as u8 + 1;
                n /= 4;
            }
            out
        })
    }

    #[test]
    fn dimension_score_bounds() {
        assert!(DimensionScore::new(0).is_err());
        assert!(DimensionScore::new(5).is_err());
        assert_eq!(DimensionScore::new(4).unwrap(), DimensionScore::MAX);
        assert!(serde_json::from_str::<DimensionScore>("7").is_err());
        assert!(serde_json::from_str::<DimensionScore>("-1").is_err());
        assert_eq!(serde_json::from_str::<DimensionScore>("3").unwrap().get(), 3);
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = DimensionWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-9);
        w.validate().unwrap();

        let bad = DimensionWeights {
            style: 0.5,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(RubricError::WeightSum(_))));
    }

    #[test]
    fn all_fours_is_perfect_and_approved() {
        let r = rubric([4, 4, 4, 4, 4]);
        assert_eq!(r.compute_quality_score(), 1.0);
        assert!(r.compute_approved());
        assert_eq!(
            r.dimension_summary(),
            "style=4/4 voice=4/4 outline=4/4 pacing=4/4 prose=4/4"
        );
    }

    #[test]
    fn all_threes_falls_below_threshold() {
        let r = rubric([3, 3, 3, 3, 3]);
        assert_eq!(r.compute_quality_score(), 0.67);
        assert!(!r.compute_approved());
    }

    #[test]
    fn all_threes_with_two_flags() {
        let mut r = rubric([3, 3, 3, 3, 3]);
        r.flags.opener_monotony = true;
        r.flags.low_diversity = true;
        assert_eq!(r.compute_quality_score(), 0.59);
        assert!(!r.compute_approved());
    }

    #[test]
    fn six_flags_cost_exactly_point_eighteen() {
        let clean = rubric([4, 4, 4, 4, 4]);
        let mut flagged = clean.clone();
        flagged.flags = all_flags();
        let diff = clean.compute_quality_score() - flagged.compute_quality_score();
        assert!((diff - 0.18).abs() < 1e-9, "diff was {diff}");
    }

    #[test]
    fn cross_scene_penalty_caps_at_three() {
        let mut three = rubric([4, 4, 4, 4, 4]);
        three.cross_scene_repetitions = 3;
        let mut five = three.clone();
        five.cross_scene_repetitions = 5;
        assert_eq!(three.compute_quality_score(), five.compute_quality_score());
        assert_eq!(three.compute_quality_score(), 0.94);
    }

    #[test]
    fn score_is_idempotent() {
        let mut r = rubric([2, 3, 4, 3, 2]);
        r.flags.passive_heavy = true;
        assert_eq!(r.compute_quality_score(), r.compute_quality_score());
        assert_eq!(r.compute_approved(), r.compute_approved());
    }

    #[test]
    fn raising_a_dimension_never_lowers_the_score() {
        for combo in every_score_combo() {
            let base = rubric(combo).compute_quality_score();
            for i in 0..5 {
                if combo[i] < 4 {
                    let mut up = combo;
                    up[i] += 1;
                    assert!(rubric(up).compute_quality_score() >= base, "{combo:?} -> {up:?}");
                }
            }
        }
    }

    #[test]
    fn setting_a_flag_never_raises_the_score() {
        for combo in every_score_combo().step_by(7) {
            let base = rubric(combo);
            let clean = base.compute_quality_score();
            for flag in 0..6 {
                let mut r = base.clone();
                let f = &mut r.flags;
                *[
                    &mut f.opener_monotony,
                    &mut f.length_monotony,
                    &mut f.passive_heavy,
                    &mut f.structural_monotony,
                    &mut f.low_diversity,
                    &mut f.vocabulary_basic,
                ][flag] = true;
                assert!(r.compute_quality_score() <= clean);
            }
        }
    }

    #[test]
    fn any_minimum_dimension_vetoes_approval() {
        for combo in every_score_combo().filter(|c| c.contains(&1)) {
            let r = rubric(combo);
            assert!(r.has_critical_failure());
            assert!(!r.compute_approved(), "{combo:?}");
        }
    }

    #[test]
    fn deterministic_gates_veto_approval() {
        let mut r = rubric([4, 4, 4, 4, 4]);
        r.word_count_in_range = false;
        assert!(!r.compute_approved());

        let mut r = rubric([4, 4, 4, 4, 4]);
        r.tense_consistent = false;
        assert!(!r.compute_approved());
    }

    #[test]
    fn slop_ratio_is_never_a_gate() {
        let mut r = rubric([4, 4, 4, 4, 4]);
        r.slop_ratio = UnitInterval::new("slop_ratio", 0.0).unwrap();
        assert!(r.compute_approved());
    }

    #[test]
    fn caps_only_lower() {
        let caps = ScoreCapConfig::default();
        let high = DimensionScores::uniform(DimensionScore::MAX);
        let flags = AdvisoryFlags {
            length_monotony: true,
            low_diversity: true,
            ..Default::default()
        };

        let capped = apply_score_caps(high, &flags, 0, &caps);
        assert_eq!(capped.pacing.get(), 2);
        assert_eq!(capped.prose_quality.get(), 3);
        assert_eq!(capped.style_adherence.get(), 4);

        let capped = apply_score_caps(high, &AdvisoryFlags::default(), 3, &caps);
        assert_eq!(capped.prose_quality.get(), 2);
        assert_eq!(capped.pacing.get(), 4);

        let low = DimensionScores::uniform(DimensionScore::MIN);
        assert_eq!(apply_score_caps(low, &all_flags(), 10, &caps), low);
    }

    #[test]
    fn rubric_json_rejects_invalid_values() {
        let good = serde_json::to_value(rubric([3, 3, 3, 3, 3])).unwrap();
        let back: SceneRubric = serde_json::from_value(good.clone()).unwrap();
        assert_eq!(back.compute_quality_score(), 0.67);

        let mut bad = good.clone();
        bad["scores"]["pacing"] = serde_json::json!(5);
        assert!(serde_json::from_value::<SceneRubric>(bad).is_err());

        let mut bad = good.clone();
        bad["slop_ratio"] = serde_json::json!(1.2);
        assert!(serde_json::from_value::<SceneRubric>(bad).is_err());

        let mut bad = good;
        bad["policy"]["weights"]["style"] = serde_json::json!(0.9);
        assert!(serde_json::from_value::<SceneRubric>(bad).is_err());
    }

    #[test]
    fn feedback_derives_score_and_approval() {
        let fb = Feedback::new("s1", rubric([4, 4, 3, 4, 4]), "", "solid", vec![]).unwrap();
        assert_eq!(fb.quality_score(), 0.93);
        assert!(fb.approved());
        assert_eq!(fb.editor_name(), "style_editor");

        assert_eq!(
            Feedback::new(" ", rubric([4, 4, 4, 4, 4]), "", "", vec![]).unwrap_err(),
            RubricError::EmptySceneId
        );
    }

    #[test]
    fn feedback_json_recomputes_derived_fields() {
        let fb = Feedback::new("s1", rubric([3, 3, 3, 3, 3]), "fix it", "", vec![]).unwrap();
        let mut json = serde_json::to_value(&fb).unwrap();
        json["approved"] = serde_json::json!(true);
        json["quality_score"] = serde_json::json!(0.99);
        let back: Feedback = serde_json::from_value(json).unwrap();
        assert!(!back.approved());
        assert_eq!(back.quality_score(), 0.67);
        assert_eq!(back.revision_instructions(), "fix it");
    }

    #[test]
    fn verdict_parses_judge_json() {
        let v: JudgeVerdict = serde_json::from_value(serde_json::json!({
            "dimension_reasoning": "Evidence...",
            "style_adherence": 3,
            "character_voice": 4,
            "outline_adherence": 3,
            "pacing": 2,
            "prose_quality": 3,
            "confirmed_slop": ["a testament to"]
        }))
        .unwrap();
        assert_eq!(v.scores().pacing.get(), 2);
        assert_eq!(v.scores().lowest().get(), 2);
        assert!(v.revision_instructions.is_empty());

        let out_of_range = serde_json::from_value::<JudgeVerdict>(serde_json::json!({
            "style_adherence": 0, "character_voice": 4, "outline_adherence": 3,
            "pacing": 2, "prose_quality": 3
        }));
        assert!(out_of_range.is_err());
    }

    #[test]
    fn unscored_dimensions_are_never_filled_in() {
        let missing_pacing = serde_json::from_value::<JudgeVerdict>(serde_json::json!({
            "style_adherence": 4, "character_voice": 4, "outline_adherence": 4,
            "prose_quality": 4
        }));
        assert!(missing_pacing.is_err());

        let rubric = serde_json::from_value::<SceneRubric>(serde_json::json!({
            "word_count_in_range": true,
            "tense_consistent": true,
            "slop_ratio": 1.0
        }));
        assert!(rubric.is_err());
    }
}
