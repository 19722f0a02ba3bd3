//! Model-backed agents.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{AgentError, Judge, JudgeRequest, SceneRequest, SceneWriter, StoryPlanner};
use crate::config::{PipelineConfig, PromptConfig};
use crate::gateway::{Attribution, ChatGateway, ChatModel, StructuredClient};
use crate::prompts;
use crate::rubric::JudgeVerdict;
use crate::story::{CharacterRoster, StoryBrief, StoryOutline, Validate, WorldContext};

fn attribution(caller: &'static str, run_id: Option<Uuid>, unit: Option<&str>) -> Attribution {
    let mut attr = Attribution::new(caller);
    if let Some(id) = run_id {
        attr = attr.with_run(id);
    }
    if let Some(unit) = unit {
        attr = attr.with_unit(unit);
    }
    attr
}

fn client(gateway: Arc<dyn ChatGateway>, model: &str, temperature: f32, max_tokens: u32) -> StructuredClient {
    StructuredClient::new(gateway, ChatModel::openrouter(model))
        .temperature(temperature)
        .max_tokens(max_tokens)
}

// =============================================================================
// Planner
// =============================================================================

/// Brief, cast, world and outline at the planning temperature.
#[derive(Debug, Clone)]
pub struct LlmPlanner {
    client: StructuredClient,
    prompts: PromptConfig,
    run_id: Option<Uuid>,
}

impl LlmPlanner {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: &PipelineConfig) -> Self {
        let m = &config.models;
        Self {
            client: client(gateway, &m.planning_model, m.planning_temperature, m.max_tokens),
            prompts: config.prompts.clone(),
            run_id: None,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    async fn generate<T>(&self, agent: &'static str, prompt: prompts::PromptInstance) -> Result<T, AgentError>
    where
        T: serde::de::DeserializeOwned + Validate,
    {
        let value: T = self
            .client
            .generate_structured(prompt.to_messages(), attribution(agent, self.run_id, None))
            .await
            .map_err(|e| AgentError::model(agent, e))?;
        value.validate().map_err(|e| AgentError::schema(agent, e))?;
        Ok(value)
    }
}

#[async_trait]
impl StoryPlanner for LlmPlanner {
    async fn story_brief(&self, user_prompt: &str) -> Result<StoryBrief, AgentError> {
        let brief: StoryBrief = self
            .generate("story_brief", prompts::story_brief_prompt(&self.prompts, user_prompt))
            .await?;
        tracing::info!(title = %brief.title, genre = brief.genre.as_str(), "story brief ready");
        Ok(brief)
    }

    async fn character_roster(&self, brief: &StoryBrief) -> Result<CharacterRoster, AgentError> {
        let roster: CharacterRoster = self
            .generate(
                "character_roster",
                prompts::character_roster_prompt(&self.prompts, brief),
            )
            .await?;
        tracing::info!(characters = roster.characters.len(), "character roster ready");
        Ok(roster)
    }

    async fn world_context(&self, brief: &StoryBrief) -> Result<WorldContext, AgentError> {
        let world: WorldContext = self
            .generate("world_context", prompts::world_context_prompt(&self.prompts, brief))
            .await?;
        tracing::info!(locations = world.locations.len(), "world context ready");
        Ok(world)
    }

    async fn outline(
        &self,
        brief: &StoryBrief,
        roster: &CharacterRoster,
        world: &WorldContext,
    ) -> Result<StoryOutline, AgentError> {
        let outline: StoryOutline = self
            .generate(
                "story_outline",
                prompts::outline_prompt(&self.prompts, brief, roster, world),
            )
            .await?;
        tracing::info!(
            scenes = outline.total_scenes(),
            beats = outline.total_beats(),
            "outline ready"
        );
        Ok(outline)
    }
}

// =============================================================================
// Scene writer
// =============================================================================

#[derive(Debug, Clone)]
pub struct LlmSceneWriter {
    client: StructuredClient,
    prompts: PromptConfig,
    run_id: Option<Uuid>,
}

impl LlmSceneWriter {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: &PipelineConfig) -> Self {
        let m = &config.models;
        Self {
            client: client(gateway, &m.writing_model, m.writing_temperature, m.max_tokens),
            prompts: config.prompts.clone(),
            run_id: None,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

#[async_trait]
impl SceneWriter for LlmSceneWriter {
    async fn write_scene(&self, request: &SceneRequest) -> Result<String, AgentError> {
        let prompt = prompts::scene_writer_prompt(&self.prompts, &request.brief());
        let attr = attribution(
            "agents::scene_writer",
            self.run_id,
            Some(&request.scene.scene_id),
        );
        self.client
            .generate_text(prompt.to_messages(), attr)
            .await
            .map_err(|e| AgentError::model("scene_writer", e))
    }
}

// =============================================================================
// Judge
// =============================================================================

#[derive(Debug, Clone)]
pub struct LlmJudge {
    client: StructuredClient,
    prompts: PromptConfig,
    run_id: Option<Uuid>,
}

impl LlmJudge {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: &PipelineConfig) -> Self {
        let m = &config.models;
        Self {
            client: client(gateway, &m.judge_model, m.judge_temperature, m.max_tokens),
            prompts: config.prompts.clone(),
            run_id: None,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn evaluate(&self, request: &JudgeRequest) -> Result<JudgeVerdict, AgentError> {
        let prompt = prompts::judge_prompt(
            &self.prompts,
            &request.scene,
            &request.draft.prose,
            &request.tone,
            &request.characters,
            &request.report,
        );
        let attr = attribution("agents::judge", self.run_id, Some(&request.draft.scene_id));
        self.client
            .generate_structured(prompt.to_messages(), attr)
            .await
            .map_err(|e| AgentError::model("judge", e))
    }
}
