use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use storyloom::config::PipelineConfig;
use storyloom::control::Stage;
use storyloom::gateway::{ChatGateway, ChatRequest, ChatResponse, ErrorContext, ProviderError};
use storyloom::pipeline::{Pipeline, PipelineError};
use storyloom::rubric::{AdvisoryPenalties, DimensionScore, ScoreCapConfig};
use storyloom::text_analysis::TextAnalyzer;

const PROSE: &str = "Ilse checked the relay logs twice before dawn. The antenna array \
    groaned under a dusting of frost, and somewhere below the deck plates a pump \
    stuttered back to life. She poured bitter coffee and listened.";

/// Answers by caller: planning artifacts are fixed, the judge walks a script.
struct ScriptedGateway {
    prose: &'static str,
    judge_scores: Mutex<Vec<u8>>,
    judge_rate_limited: bool,
    confirmed_slop: Vec<&'static str>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedGateway {
    fn scripted(prose: &'static str, judge_scores: &[u8], confirmed_slop: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            prose,
            judge_scores: Mutex::new(judge_scores.to_vec()),
            judge_rate_limited: false,
            confirmed_slop: confirmed_slop.to_vec(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn new(judge_scores: &[u8]) -> Arc<Self> {
        Self::scripted(PROSE, judge_scores, &[])
    }

    fn throttled() -> Arc<Self> {
        Arc::new(Self {
            prose: PROSE,
            judge_scores: Mutex::new(Vec::new()),
            judge_rate_limited: true,
            confirmed_slop: Vec::new(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls_from(&self, caller: &str) -> Vec<ChatRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.attribution.caller == caller)
            .cloned()
            .collect()
    }

    fn judge_reply(&self) -> Result<String, ProviderError> {
        if self.judge_rate_limited {
            return Err(ProviderError::rate_limited(
                Duration::from_secs(1),
                ErrorContext::new().with_status(429),
            ));
        }
        let s = self.judge_scores.lock().unwrap().remove(0);
        Ok(json!({
            "dimension_reasoning": "Grounded detail, restrained voice.",
            "style_adherence": s, "character_voice": s, "outline_adherence": s,
            "pacing": s, "prose_quality": s,
            "confirmed_slop": self.confirmed_slop,
            "revision_instructions": "Let the pump noise carry the tension.",
            "overall_assessment": "Quiet and controlled."
        })
        .to_string())
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let caller = req.attribution.caller;
        self.seen.lock().unwrap().push(req);
        let body = match caller {
            "story_brief" => json!({
                "title": "Relay", "premise": "A lone engineer hears the dead.",
                "genre": "sci_fi", "themes": ["isolation", "witness"],
                "tone_profile": {"formality": 0.6, "darkness": 0.7, "humor": 0.1, "pacing": 0.4}
            })
            .to_string(),
            "character_roster" => json!({
                "characters": [{
                    "character_id": "ilse", "name": "Ilse Maren", "role": "protagonist",
                    "motivation": "Keep the relay alive."
                }]
            })
            .to_string(),
            "world_context" => json!({
                "locations": [{"location_id": "relay", "name": "Kestrel Relay"}]
            })
            .to_string(),
            "story_outline" => json!({
                "acts": [{
                    "act_number": 1,
                    "scenes": [
                        {"scene_id": "s1", "act_number": 1, "scene_number": 1,
                         "characters_present": ["ilse"], "scene_goal": "the signal",
                         "target_word_count": 40},
                        {"scene_id": "s2", "act_number": 1, "scene_number": 2,
                         "characters_present": ["ilse"], "scene_goal": "the reply",
                         "target_word_count": 40}
                    ]
                }]
            })
            .to_string(),
            "agents::scene_writer" => self.prose.to_string(),
            "agents::judge" => self.judge_reply()?,
            other => panic!("unexpected caller {other}"),
        };
        Ok(ChatResponse::text(body))
    }
}

/// Judged scores alone decide approval.
fn config(max_revisions: u32, min_revisions: u32) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.revisions.max_revisions = max_revisions;
    cfg.revisions.min_revisions = min_revisions;
    cfg.word_count.tolerance = 10.0;
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

fn pipeline(gateway: Arc<ScriptedGateway>, cfg: PipelineConfig) -> Pipeline {
    let analyzer = Arc::new(TextAnalyzer::bundled().unwrap().with_tagger(None));
    Pipeline::with_gateway(gateway, analyzer, cfg)
}

/// Default caps, so automated signals can lower judged scores.
fn capped_config() -> PipelineConfig {
    let mut cfg = config(0, 0);
    cfg.caps = ScoreCapConfig::default();
    cfg
}

#[tokio::test]
async fn revise_then_approve_across_two_scenes() {
    let gw = ScriptedGateway::new(&[3, 4, 4]);
    let p = pipeline(gw.clone(), config(2, 0));
    let outcome = p.run("a relay station hears a dead civilization").await.unwrap();

    assert_eq!(outcome.run_id, p.run_id());
    assert!(outcome.state.is_complete());
    assert_eq!(outcome.title(), "Relay");
    assert_eq!(outcome.state.scene_drafts.len(), 2);
    assert_eq!(outcome.evaluations(), 3);
    assert_eq!(outcome.approved_scenes(), 2);

    let fb = &outcome.state.edit_feedback;
    assert!(!fb[0].approved());
    assert_eq!(fb[0].quality_score(), 0.67);
    assert!(fb[1].approved());
    assert_eq!(fb[1].quality_score(), 1.0);

    let writes = gw.calls_from("agents::scene_writer");
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].attribution.unit.as_deref(), Some("s1"));
    assert_eq!(writes[0].attribution.run_id, Some(p.run_id()));
    let revision_system = &writes[1].messages[0].content;
    assert!(revision_system.contains("### Editor Notes\nLet the pump noise carry the tension."));
    assert!(writes[1].messages[1].content.contains("## Previous Draft"));
    assert!(!writes[2].messages[1].content.contains("## Previous Draft"));
    assert!(writes[2].messages[1].content.contains("## Story So Far"));

    let judged = gw.calls_from("agents::judge");
    assert_eq!(judged.len(), 3);
    assert!(judged[0].json_mode);
    assert!(judged[0].messages[1].content.contains("## Automated Analysis"));
}

#[tokio::test]
async fn minimum_revision_polishes_each_scene_once() {
    let gw = ScriptedGateway::new(&[4, 4, 4, 4]);
    let outcome = pipeline(gw.clone(), config(2, 1))
        .run("a relay station")
        .await
        .unwrap();
    assert_eq!(outcome.evaluations(), 4);
    let ids: Vec<_> = outcome
        .state
        .edit_feedback
        .iter()
        .map(|f| f.scene_id().to_string())
        .collect();
    assert_eq!(ids, ["s1", "s1", "s2", "s2"]);
}

#[tokio::test]
async fn throttled_judge_surfaces_as_rate_limited_evaluation_failure() {
    let gw = ScriptedGateway::throttled();
    let err = pipeline(gw, config(2, 0))
        .run("a relay station")
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.stage(), Some(Stage::Evaluating));
    match &err {
        PipelineError::Agent { unit, .. } => assert_eq!(unit.as_deref(), Some("s1")),
        other => panic!("expected agent failure, got {other:?}"),
    }
    assert!(err.to_string().starts_with("evaluating failed for s1"));
}

#[tokio::test]
async fn session_serializes_and_reports() {
    let gw = ScriptedGateway::new(&[4, 4]);
    let outcome = pipeline(gw, config(0, 0)).run("a relay station").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let files = storyloom::report::write_session(dir.path(), &outcome).unwrap();
    let restored = storyloom::report::read_session(&files.session).unwrap();
    assert_eq!(restored.run_id, outcome.run_id);
    assert_eq!(restored.state.scene_drafts, outcome.state.scene_drafts);
    assert_eq!(restored.state.edit_feedback.len(), 2);
    assert!(restored.state.edit_feedback.iter().all(|f| f.approved()));

    let report = std::fs::read_to_string(&files.report).unwrap();
    assert!(report.contains("Ilse Maren (protagonist): Keep the relay alive."));
    assert!(report.contains("SCENE METRICS"));
    let manuscript = std::fs::read_to_string(&files.manuscript).unwrap();
    assert!(manuscript.contains("--- Scene 1.2 ---"));
}

#[tokio::test]
async fn confirmed_cliches_cap_prose_quality() {
    let slop = ["a testament to", "sent shivers down her spine", "hung heavy in the air"];
    let gw = ScriptedGateway::scripted(PROSE, &[4, 4], &slop);
    let outcome = pipeline(gw, capped_config()).run("a relay station").await.unwrap();

    for fb in &outcome.state.edit_feedback {
        let scores = fb.rubric().scores;
        assert_eq!(scores.prose_quality, DimensionScore::new(2).unwrap());
        assert_eq!(scores.style_adherence, DimensionScore::MAX);
        assert_eq!(scores.pacing, DimensionScore::MAX);
        assert_eq!(fb.confirmed_slop().len(), 3);
        assert!(fb.quality_score() < 1.0);
    }
}

#[tokio::test]
async fn below_threshold_cliches_leave_prose_alone() {
    let gw = ScriptedGateway::scripted(PROSE, &[4, 4], &["a testament to", "hung heavy"]);
    let outcome = pipeline(gw, capped_config()).run("a relay station").await.unwrap();
    let fb = &outcome.state.edit_feedback[0];
    assert_eq!(fb.rubric().scores.pacing, DimensionScore::MAX);
    assert_ne!(fb.rubric().scores.prose_quality, DimensionScore::new(2).unwrap());
}

#[tokio::test]
async fn monotonous_openers_cap_pacing() {
    const FLAT: &str = "She checked the relay logs. She poured the coffee. \
        She read the frost gauge. She heard the pump start.";
    let gw = ScriptedGateway::scripted(FLAT, &[4, 4], &[]);
    let analyzer = Arc::new(TextAnalyzer::bundled().unwrap());
    let outcome = Pipeline::with_gateway(gw, analyzer, capped_config())
        .run("a relay station")
        .await
        .unwrap();

    let fb = &outcome.state.edit_feedback[0];
    assert_eq!(fb.rubric().scores.pacing, DimensionScore::new(2).unwrap());
    assert_eq!(fb.rubric().scores.style_adherence, DimensionScore::MAX);
    assert!(fb.rubric().flags.opener_monotony);
    assert!(outcome.state.scene_metrics[0].opener_ratio > 0.3);
}
