//! Plan, write, evaluate, decide.
//!
//! [`Pipeline`] drives one prompt through the planning agents, then loops over
//! the outline's scenes: write a draft, run the deterministic analyzers, ask
//! the judge for dimension scores, build the rubric and feedback, and apply
//! the control decision. Scenes are processed strictly in order and every
//! collaborator call is awaited before the next one starts.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agents::{
    AgentError, Judge, JudgeRequest, LlmJudge, LlmPlanner, LlmSceneWriter, SceneRequest,
    SceneWriter, StoryPlanner,
};
use crate::config::PipelineConfig;
use crate::control::{Decision, PipelineState, Stage, StateError};
use crate::gateway::ChatGateway;
use crate::rubric::{apply_score_caps, AdvisoryFlags, Feedback, RubricError, SceneMetrics, SceneRubric};
use crate::story::{CharacterProfile, SceneDraft, ToneProfile};
use crate::text_analysis::{build_story_allowlist, TextAnalyzer};

// =============================================================================
// Pipeline errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid state: {0}")]
    State(#[from] StateError),
    #[error("{stage} failed{}: {source}", unit_suffix(.unit))]
    Agent {
        stage: Stage,
        unit: Option<String>,
        #[source]
        source: AgentError,
    },
    #[error("Rubric error: {0}")]
    Rubric(#[from] RubricError),
    #[error("Evaluated draft {actual} does not belong to outline scene {expected}")]
    UnitMismatch { expected: String, actual: String },
    #[error("No draft recorded for scene {0}")]
    MissingDraft(String),
}

fn unit_suffix(unit: &Option<String>) -> String {
    unit.as_deref().map(|u| format!(" for {u}")).unwrap_or_default()
}

impl PipelineError {
    fn agent(stage: Stage, unit: Option<&str>, source: AgentError) -> Self {
        Self::Agent {
            stage,
            unit: unit.map(str::to_string),
            source,
        }
    }

    /// Stage the failure happened in, when one applies.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Agent { stage, .. } => Some(*stage),
            Self::UnitMismatch { .. } | Self::MissingDraft(_) => Some(Stage::Evaluating),
            Self::State(_) | Self::Rubric(_) => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Agent { source, .. } if source.is_rate_limited())
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Everything a finished run produced. Serializes to the session JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub created_at: String,
    pub elapsed_ms: u64,
    pub state: PipelineState,
}

impl PipelineOutcome {
    pub fn title(&self) -> &str {
        self.state
            .story_brief
            .as_ref()
            .map(|b| b.title.as_str())
            .unwrap_or("Untitled")
    }

    pub fn total_words(&self) -> usize {
        self.state.scene_drafts.iter().map(|d| d.word_count).sum()
    }

    pub fn evaluations(&self) -> usize {
        self.state.edit_feedback.len()
    }

    /// Scenes whose final evaluation approved the draft.
    pub fn approved_scenes(&self) -> usize {
        self.state
            .scene_drafts
            .iter()
            .filter(|d| {
                self.state
                    .edit_feedback
                    .iter()
                    .rev()
                    .find(|f| f.scene_id() == d.scene_id)
                    .is_some_and(Feedback::approved)
            })
            .count()
    }
}

// =============================================================================
// Pipeline
// =============================================================================

pub struct Pipeline {
    planner: Box<dyn StoryPlanner>,
    writer: Box<dyn SceneWriter>,
    judge: Box<dyn Judge>,
    analyzer: Arc<TextAnalyzer>,
    config: PipelineConfig,
    run_id: Uuid,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("run_id", &self.run_id)
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        planner: Box<dyn StoryPlanner>,
        writer: Box<dyn SceneWriter>,
        judge: Box<dyn Judge>,
        analyzer: Arc<TextAnalyzer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            planner,
            writer,
            judge,
            analyzer,
            config,
            run_id: Uuid::new_v4(),
        }
    }

    /// Model-backed agents sharing one gateway, attributed to this run.
    pub fn with_gateway(
        gateway: Arc<dyn ChatGateway>,
        analyzer: Arc<TextAnalyzer>,
        config: PipelineConfig,
    ) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            planner: Box::new(LlmPlanner::new(gateway.clone(), &config).with_run(run_id)),
            writer: Box::new(LlmSceneWriter::new(gateway.clone(), &config).with_run(run_id)),
            judge: Box::new(LlmJudge::new(gateway, &config).with_run(run_id)),
            analyzer,
            config,
            run_id,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a prompt from planning to the last scene.
    pub async fn run(&self, user_prompt: &str) -> Result<PipelineOutcome, PipelineError> {
        let state = PipelineState::new(user_prompt, self.config.revisions)?;
        self.resume(state).await
    }

    /// Continue from an existing state. Planning artifacts already present are
    /// kept; drafting picks up at the current scene. The revision limits of
    /// this pipeline's config replace the ones stored in the state.
    pub async fn resume(&self, mut state: PipelineState) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let created_at = Utc::now().to_rfc3339();
        if state.limits != self.config.revisions {
            debug!(
                stored = ?state.limits,
                configured = ?self.config.revisions,
                "resumed state takes the configured revision limits"
            );
            state.limits = self.config.revisions;
        }
        info!(run_id = %self.run_id, "pipeline started");

        self.plan(&mut state).await?;

        if state.total_scenes() == 0 {
            warn!(run_id = %self.run_id, "outline has no scenes; nothing to write");
            state.apply(Decision::Complete);
        }

        while !state.is_complete() {
            self.write_current(&mut state).await?;
            let decision = self.evaluate_current(&mut state).await?;
            state.apply(decision);
        }

        let outcome = PipelineOutcome {
            run_id: self.run_id,
            created_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
            state,
        };
        info!(
            run_id = %self.run_id,
            scenes = outcome.state.scene_drafts.len(),
            evaluations = outcome.evaluations(),
            approved = outcome.approved_scenes(),
            words = outcome.total_words(),
            elapsed_ms = outcome.elapsed_ms,
            "pipeline complete"
        );
        Ok(outcome)
    }

    // --- Phase 1: Plan ---

    /// Fill in whichever of brief, roster, world and outline are missing.
    pub async fn plan(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        if state.story_brief.is_none() {
            state.stage = Stage::Planning;
            let brief = self
                .planner
                .story_brief(&state.user_prompt)
                .await
                .map_err(|e| PipelineError::agent(Stage::Planning, None, e))?;
            state.story_brief = Some(brief);
        }
        let Some(brief) = state.story_brief.clone() else {
            return Ok(());
        };

        if state.character_roster.is_none() {
            let roster = self
                .planner
                .character_roster(&brief)
                .await
                .map_err(|e| PipelineError::agent(Stage::Planning, None, e))?;
            state.character_roster = Some(roster);
        }
        if state.world_context.is_none() {
            let world = self
                .planner
                .world_context(&brief)
                .await
                .map_err(|e| PipelineError::agent(Stage::Planning, None, e))?;
            state.world_context = Some(world);
        }

        if state.story_outline.is_none() {
            state.stage = Stage::Outlining;
            let roster = state.character_roster.clone().unwrap_or_default();
            let world = state.world_context.clone().unwrap_or_default();
            let outline = self
                .planner
                .outline(&brief, &roster, &world)
                .await
                .map_err(|e| PipelineError::agent(Stage::Outlining, None, e))?;
            state.story_outline = Some(outline);
        }

        if matches!(state.stage, Stage::Planning | Stage::Outlining) {
            state.stage = Stage::Writing;
        }
        Ok(())
    }

    // --- Phase 2: Write ---

    pub async fn write_current(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        let scene = state.current_scene()?.clone();
        let revision = state.revision_context();
        let previous_draft = match revision {
            Some(_) => state.latest_draft().map(|d| d.prose.clone()),
            None => None,
        };

        let request = SceneRequest {
            characters: characters_for(state, &scene.characters_present),
            tone: tone_of(state),
            prior_summaries: state
                .prior_scene_summaries()
                .into_iter()
                .map(str::to_string)
                .collect(),
            revision,
            previous_draft,
            scene,
        };

        let stage = if request.is_revision() {
            Stage::Revising
        } else {
            Stage::Writing
        };
        state.stage = stage;
        info!(
            scene = %request.scene.scene_id,
            revision = state.revision_count,
            "{}",
            if request.is_revision() { "revising scene" } else { "writing scene" }
        );

        let prose = self
            .writer
            .write_scene(&request)
            .await
            .map_err(|e| PipelineError::agent(stage, Some(&request.scene.scene_id), e))?;
        let draft = SceneDraft::from_prose(&request.scene, prose);
        debug!(scene = %draft.scene_id, words = draft.word_count, "draft recorded");
        state.record_draft(draft);
        Ok(())
    }

    // --- Phase 3: Evaluate ---

    /// Score the current draft, record feedback and metrics, and return the
    /// decision the control loop takes next. The decision is not applied.
    pub async fn evaluate_current(&self, state: &mut PipelineState) -> Result<Decision, PipelineError> {
        state.stage = Stage::Evaluating;
        let scene = state.current_scene()?.clone();
        let draft = state
            .latest_draft()
            .cloned()
            .ok_or_else(|| PipelineError::MissingDraft(scene.scene_id.clone()))?;
        if draft.scene_id != scene.scene_id {
            return Err(PipelineError::UnitMismatch {
                expected: scene.scene_id,
                actual: draft.scene_id,
            });
        }

        let allowlist = build_story_allowlist(
            state.character_roster.as_ref(),
            state.world_context.as_ref(),
            state.story_brief.as_ref(),
        );
        let report = self.analyzer.analyze(
            &draft.prose,
            scene.target_word_count,
            &allowlist,
            &state.prior_scene_texts(),
            &self.config,
        );

        let request = JudgeRequest {
            characters: characters_for(state, &draft.characters_used),
            tone: tone_of(state),
            scene,
            draft,
            report,
        };
        let verdict = self.judge.evaluate(&request).await.map_err(|e| {
            PipelineError::agent(Stage::Evaluating, Some(&request.draft.scene_id), e)
        })?;

        let JudgeRequest { draft, report, .. } = request;
        let raw = verdict.scores();
        let flags = AdvisoryFlags::from_report(&report);
        let scores = apply_score_caps(raw, &flags, verdict.confirmed_slop.len(), &self.config.caps);
        if scores != raw {
            debug!(scene = %draft.scene_id, "judged scores capped by automated signals");
        }

        let rubric = SceneRubric::from_analysis(
            &report,
            scores,
            verdict.dimension_reasoning,
            self.config.scoring,
        )?;
        let summary = rubric.dimension_summary();
        let feedback = Feedback::new(
            draft.scene_id.clone(),
            rubric,
            verdict.revision_instructions,
            verdict.overall_assessment,
            verdict.confirmed_slop,
        )?;
        let metrics = SceneMetrics::from_report(&draft.scene_id, &report);
        let (score, approved) = (feedback.quality_score(), feedback.approved());
        state.record_feedback(feedback, metrics);

        let decision = state.decide();
        info!(
            scene = %draft.scene_id,
            revision = state.revision_count,
            dimensions = %summary,
            score,
            approved,
            decision = decision.as_str(),
            "scene evaluated"
        );
        Ok(decision)
    }
}

fn characters_for(state: &PipelineState, ids: &[String]) -> Vec<CharacterProfile> {
    let Some(roster) = state.character_roster.as_ref() else {
        return Vec::new();
    };
    ids.iter()
        .filter_map(|id| roster.get_character(id))
        .cloned()
        .collect()
}

fn tone_of(state: &PipelineState) -> ToneProfile {
    state
        .story_brief
        .as_ref()
        .map(|b| b.tone_profile.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RevisionLimits;
    use crate::rubric::{AdvisoryPenalties, DimensionScore, JudgeVerdict, ScoreCapConfig};
    use crate::story::{CharacterRoster, StoryBrief, StoryOutline, WorldContext};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const PROSE: &str = "Mara climbed the tower stairs at dusk. The lamp room smelled of \
        brass polish and kerosene. She trimmed the wick, wound the clockwork, and watched \
        the beam sweep across a restless grey sea.";

    struct Planner;

    #[async_trait]
    impl StoryPlanner for Planner {
        async fn story_brief(&self, _: &str) -> Result<StoryBrief, AgentError> {
            Ok(serde_json::from_value(serde_json::json!({
                "title": "The Keeper", "premise": "A keeper tends a failing light.",
                "genre": "literary_fiction", "themes": ["duty"]
            }))
            .unwrap())
        }

        async fn character_roster(&self, _: &StoryBrief) -> Result<CharacterRoster, AgentError> {
            Ok(serde_json::from_value(serde_json::json!({
                "characters": [{"character_id": "mara", "name": "Mara Quill", "role": "protagonist"}]
            }))
            .unwrap())
        }

        async fn world_context(&self, _: &StoryBrief) -> Result<WorldContext, AgentError> {
            Ok(WorldContext::default())
        }

        async fn outline(
            &self,
            _: &StoryBrief,
            _: &CharacterRoster,
            _: &WorldContext,
        ) -> Result<StoryOutline, AgentError> {
            let scenes: Vec<_> = ["s1", "s2"]
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    serde_json::json!({
                        "scene_id": id, "act_number": 1, "scene_number": i + 1,
                        "characters_present": ["mara"], "target_word_count": 0
                    })
                })
                .collect();
            Ok(serde_json::from_value(serde_json::json!({"acts": [{"act_number": 1, "scenes": scenes}]})).unwrap())
        }
    }

    #[derive(Default)]
    struct Writer {
        requests: Mutex<Vec<SceneRequest>>,
    }

    #[async_trait]
    impl SceneWriter for Arc<Writer> {
        async fn write_scene(&self, request: &SceneRequest) -> Result<String, AgentError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(PROSE.to_string())
        }
    }

    struct ScriptedJudge {
        scores: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl Judge for ScriptedJudge {
        async fn evaluate(&self, _: &JudgeRequest) -> Result<JudgeVerdict, AgentError> {
            let s = DimensionScore::new(self.scores.lock().unwrap().remove(0)).unwrap();
            Ok(JudgeVerdict {
                dimension_reasoning: "ok".into(),
                style_adherence: s,
                character_voice: s,
                outline_adherence: s,
                pacing: s,
                prose_quality: s,
                confirmed_slop: vec![],
                revision_instructions: "sharpen the ending".into(),
                overall_assessment: "solid".into(),
            })
        }
    }

    /// No advisory deductions or caps, so the judged scores alone decide.
    fn lenient(max_revisions: u32, min_revisions: u32) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.revisions.max_revisions = max_revisions;
        cfg.revisions.min_revisions = min_revisions;
        cfg.scoring.penalties = AdvisoryPenalties {
            opener_monotony: 0.0,
            length_monotony: 0.0,
            passive_heavy: 0.0,
            structural_monotony: 0.0,
            low_diversity: 0.0,
            vocabulary_basic: 0.0,
            cross_scene_per_repeat: 0.0,
            cross_scene_max_repeats: 0,
        };
        cfg.caps = ScoreCapConfig {
            cap_pacing_on_monotony: DimensionScore::MAX,
            cap_prose_on_slop_value: DimensionScore::MAX,
            cap_prose_on_slop_count: 3,
            cap_prose_on_low_diversity: DimensionScore::MAX,
        };
        cfg
    }

    fn pipeline(scores: &[u8], cfg: PipelineConfig) -> (Arc<Writer>, Pipeline) {
        let writer = Arc::new(Writer::default());
        let analyzer = Arc::new(TextAnalyzer::bundled().unwrap().with_tagger(None));
        let p = Pipeline::new(
            Box::new(Planner),
            Box::new(writer.clone()),
            Box::new(ScriptedJudge {
                scores: Mutex::new(scores.to_vec()),
            }),
            analyzer,
            cfg,
        );
        (writer, p)
    }

    #[tokio::test]
    async fn rejected_draft_is_revised_then_advances() {
        let (writer, p) = pipeline(&[3, 4, 4], lenient(2, 0));
        let outcome = p.run("a lighthouse keeper").await.unwrap();

        assert!(outcome.state.is_complete());
        assert_eq!(outcome.state.scene_drafts.len(), 2);
        assert_eq!(outcome.evaluations(), 3);
        assert_eq!(outcome.approved_scenes(), 2);
        assert_eq!(outcome.state.scene_metrics.len(), 3);
        assert_eq!(outcome.title(), "The Keeper");

        let reqs = writer.requests.lock().unwrap();
        assert_eq!(reqs.len(), 3);
        assert!(!reqs[0].is_revision());
        let rev = reqs[1].revision.as_ref().unwrap();
        assert_eq!(rev.revision_number, 1);
        assert_eq!(rev.instructions, "sharpen the ending");
        assert_eq!(reqs[1].previous_draft.as_deref(), Some(PROSE));
        assert_eq!(reqs[1].characters[0].name, "Mara Quill");
        assert_eq!(reqs[2].scene.scene_id, "s2");
        assert_eq!(reqs[2].prior_summaries.len(), 1);
    }

    #[tokio::test]
    async fn minimum_revisions_polish_approved_drafts() {
        let (writer, p) = pipeline(&[4, 4, 4, 4], lenient(2, 1));
        let outcome = p.run("a lighthouse keeper").await.unwrap();
        assert_eq!(outcome.evaluations(), 4);
        let reqs = writer.requests.lock().unwrap();
        assert!(reqs[1].is_revision());
        assert!(!reqs[2].is_revision());
        assert!(reqs[3].is_revision());
    }

    #[tokio::test]
    async fn exhausted_budget_moves_on_unapproved() {
        let (_, p) = pipeline(&[2, 2, 4], lenient(1, 0));
        let outcome = p.run("a lighthouse keeper").await.unwrap();
        assert_eq!(outcome.evaluations(), 3);
        assert_eq!(outcome.approved_scenes(), 1);
    }

    #[tokio::test]
    async fn mismatched_draft_is_fatal() {
        let (_, p) = pipeline(&[4], lenient(0, 0));
        let mut state = PipelineState::new("a lighthouse keeper", RevisionLimits::default()).unwrap();
        p.plan(&mut state).await.unwrap();
        let other = state.story_outline.as_ref().unwrap().scene(1).unwrap().clone();
        state.record_draft(SceneDraft::from_prose(&other, PROSE));

        let err = p.evaluate_current(&mut state).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnitMismatch { ref expected, ref actual }
            if expected == "s1" && actual == "s2"));
        assert_eq!(err.stage(), Some(Stage::Evaluating));
    }

    #[tokio::test]
    async fn empty_prompt_fails_before_any_call() {
        let (writer, p) = pipeline(&[], lenient(0, 0));
        assert!(matches!(p.run("   ").await, Err(PipelineError::State(StateError::EmptyPrompt))));
        assert!(writer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resume_applies_configured_revision_limits() {
        let stored = RevisionLimits {
            max_revisions: 0,
            min_revisions: 0,
        };
        let state = PipelineState::new("a lighthouse keeper", stored).unwrap();
        let (_, p) = pipeline(&[4, 4, 4, 4], lenient(2, 1));
        let outcome = p.resume(state).await.unwrap();

        assert_eq!(outcome.state.limits, p.config().revisions);
        assert_eq!(outcome.evaluations(), 4);
    }
}
