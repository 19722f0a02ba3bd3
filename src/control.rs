//! Revise / advance / complete control loop.
//!
//! [`decide`] is a pure function of the latest feedback, the per-scene revision
//! counter, the configured limits and whether another scene follows.
//! [`PipelineState`] is the single mutable aggregate the orchestrator threads
//! through planning, writing and evaluation; [`PipelineState::apply`] performs
//! the transition a decision calls for.

use serde::{Deserialize, Serialize};

use crate::rubric::{AdvisoryFlags, Dimension, DimensionScore, DimensionScores, Feedback, SceneMetrics};
use crate::story::{CharacterRoster, SceneDraft, SceneOutline, StoryBrief, StoryOutline, WorldContext};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("user prompt must not be empty")]
    EmptyPrompt,
    #[error("no scene at index {index} (outline has {total})")]
    NoScene { index: usize, total: usize },
    #[error("no outline has been produced yet")]
    NoOutline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Revise,
    NextUnit,
    Complete,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Revise => "revise",
            Decision::NextUnit => "next_unit",
            Decision::Complete => "complete",
        }
    }
}

/// Per-scene revision budget. `min_revisions` forces polishing passes even on
/// approved drafts and takes precedence over `max_revisions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevisionLimits {
    pub max_revisions: u32,
    pub min_revisions: u32,
}

impl Default for RevisionLimits {
    fn default() -> Self {
        Self {
            max_revisions: 2,
            min_revisions: 0,
        }
    }
}

/// Transition rule, in priority order:
/// 1. below the forced minimum: revise, approved or not
/// 2. not approved with budget left: revise
/// 3. another scene follows: advance
/// 4. otherwise complete
///
/// No feedback at all completes.
pub fn decide(
    latest: Option<&Feedback>,
    revision_count: u32,
    limits: &RevisionLimits,
    has_next_unit: bool,
) -> Decision {
    let Some(feedback) = latest else {
        return Decision::Complete;
    };
    if revision_count < limits.min_revisions {
        return Decision::Revise;
    }
    if !feedback.approved() && revision_count < limits.max_revisions {
        return Decision::Revise;
    }
    if has_next_unit {
        Decision::NextUnit
    } else {
        Decision::Complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Outlining,
    Writing,
    Evaluating,
    Revising,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Outlining => "outlining",
            Stage::Writing => "writing",
            Stage::Evaluating => "evaluating",
            Stage::Revising => "revising",
            Stage::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the writer should treat its previous draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionFraming {
    /// The draft was approved; preserve its strengths and change only what
    /// was flagged.
    Polish,
    /// The draft was rejected; address every listed concern.
    Revision,
}

/// Feedback from the previous attempt, carried into the next write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionContext {
    pub revision_number: u32,
    pub framing: RevisionFraming,
    pub previous_score: f64,
    pub scores: DimensionScores,
    pub dimension_summary: String,
    pub instructions: String,
    pub confirmed_slop: Vec<String>,
    /// Every dimension at the lowest observed score, when that is below 4.
    pub focus_dimensions: Vec<Dimension>,
    pub flags: AdvisoryFlags,
    pub cross_scene_repetitions: usize,
}

impl RevisionContext {
    pub fn from_feedback(revision_number: u32, feedback: &Feedback) -> Self {
        let rubric = feedback.rubric();
        let lowest = rubric.scores.lowest();
        let focus_dimensions = if lowest < DimensionScore::MAX {
            rubric
                .scores
                .iter()
                .filter(|(_, s)| *s == lowest)
                .map(|(d, _)| d)
                .collect()
        } else {
            Vec::new()
        };
        Self {
            revision_number,
            framing: if feedback.approved() {
                RevisionFraming::Polish
            } else {
                RevisionFraming::Revision
            },
            previous_score: feedback.quality_score(),
            scores: rubric.scores,
            dimension_summary: rubric.dimension_summary(),
            instructions: feedback.revision_instructions().to_string(),
            confirmed_slop: feedback.confirmed_slop().to_vec(),
            focus_dimensions,
            flags: rubric.flags,
            cross_scene_repetitions: rubric.cross_scene_repetitions,
        }
    }
}

/// Everything a run accumulates. Drafts hold one entry per scene reached so
/// far; feedback and metrics hold one entry per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub user_prompt: String,
    pub story_brief: Option<StoryBrief>,
    pub character_roster: Option<CharacterRoster>,
    pub world_context: Option<WorldContext>,
    pub story_outline: Option<StoryOutline>,
    pub scene_drafts: Vec<SceneDraft>,
    pub edit_feedback: Vec<Feedback>,
    pub scene_metrics: Vec<SceneMetrics>,
    pub current_scene_index: usize,
    pub revision_count: u32,
    pub limits: RevisionLimits,
    pub stage: Stage,
}

impl PipelineState {
    pub fn new(user_prompt: impl Into<String>, limits: RevisionLimits) -> Result<Self, StateError> {
        let user_prompt = user_prompt.into();
        if user_prompt.trim().is_empty() {
            return Err(StateError::EmptyPrompt);
        }
        Ok(Self {
            user_prompt,
            story_brief: None,
            character_roster: None,
            world_context: None,
            story_outline: None,
            scene_drafts: Vec::new(),
            edit_feedback: Vec::new(),
            scene_metrics: Vec::new(),
            current_scene_index: 0,
            revision_count: 0,
            limits,
            stage: Stage::Planning,
        })
    }

    pub fn total_scenes(&self) -> usize {
        self.story_outline
            .as_ref()
            .map(StoryOutline::total_scenes)
            .unwrap_or(0)
    }

    pub fn has_next_scene(&self) -> bool {
        self.current_scene_index + 1 < self.total_scenes()
    }

    pub fn current_scene(&self) -> Result<&SceneOutline, StateError> {
        let outline = self.story_outline.as_ref().ok_or(StateError::NoOutline)?;
        outline
            .scene(self.current_scene_index)
            .ok_or(StateError::NoScene {
                index: self.current_scene_index,
                total: outline.total_scenes(),
            })
    }

    pub fn latest_feedback(&self) -> Option<&Feedback> {
        self.edit_feedback.last()
    }

    pub fn latest_draft(&self) -> Option<&SceneDraft> {
        self.scene_drafts.last()
    }

    /// Finalized prose of the scenes before the current one.
    pub fn prior_scene_texts(&self) -> Vec<&str> {
        self.scene_drafts
            .iter()
            .take(self.current_scene_index)
            .map(|d| d.prose.as_str())
            .collect()
    }

    /// Rolling summaries of the finalized earlier scenes.
    pub fn prior_scene_summaries(&self) -> Vec<&str> {
        self.scene_drafts
            .iter()
            .take(self.current_scene_index)
            .map(|d| d.scene_summary.as_str())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// A rewrite replaces the current scene's draft; a first write appends.
    pub fn record_draft(&mut self, draft: SceneDraft) {
        if self.revision_count > 0 && !self.scene_drafts.is_empty() {
            if let Some(last) = self.scene_drafts.last_mut() {
                *last = draft;
            }
        } else {
            self.scene_drafts.push(draft);
        }
    }

    pub fn record_feedback(&mut self, feedback: Feedback, metrics: SceneMetrics) {
        self.edit_feedback.push(feedback);
        self.scene_metrics.push(metrics);
    }

    /// Revision context for the next write, present only when revising.
    pub fn revision_context(&self) -> Option<RevisionContext> {
        if self.revision_count == 0 {
            return None;
        }
        self.latest_feedback()
            .map(|fb| RevisionContext::from_feedback(self.revision_count, fb))
    }

    pub fn decide(&self) -> Decision {
        decide(
            self.latest_feedback(),
            self.revision_count,
            &self.limits,
            self.has_next_scene(),
        )
    }

    pub fn apply(&mut self, decision: Decision) {
        match decision {
            Decision::Revise => {
                self.revision_count += 1;
                self.stage = Stage::Revising;
            }
            Decision::NextUnit => {
                self.current_scene_index += 1;
                self.revision_count = 0;
                self.stage = Stage::Writing;
            }
            Decision::Complete => {
                self.stage = Stage::Complete;
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }
}
