//! Generation and evaluation collaborators.
//!
//! The pipeline only talks to these traits. [`llm`] implements them on top of
//! the chat gateway; tests substitute scripted implementations.

pub mod llm;

use async_trait::async_trait;

use crate::control::RevisionContext;
use crate::gateway::StructuredError;
use crate::prompts::SceneBrief;
use crate::rubric::JudgeVerdict;
use crate::story::{
    CharacterProfile, CharacterRoster, SceneDraft, SceneOutline, SchemaError, StoryBrief,
    StoryOutline, ToneProfile, WorldContext,
};
use crate::text_analysis::DeterministicReport;

pub use llm::{LlmJudge, LlmPlanner, LlmSceneWriter};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{agent}: {source}")]
    Model {
        agent: &'static str,
        #[source]
        source: StructuredError,
    },
    #[error("{agent}: {source}")]
    Schema {
        agent: &'static str,
        #[source]
        source: SchemaError,
    },
}

impl AgentError {
    pub fn model(agent: &'static str, source: StructuredError) -> Self {
        Self::Model { agent, source }
    }

    pub fn schema(agent: &'static str, source: SchemaError) -> Self {
        Self::Schema { agent, source }
    }

    pub fn agent(&self) -> &'static str {
        match self {
            Self::Model { agent, .. } | Self::Schema { agent, .. } => agent,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Model { source, .. } if source.is_rate_limited())
    }
}

/// Input for writing one scene, first draft or revision.
#[derive(Debug, Clone)]
pub struct SceneRequest {
    pub scene: SceneOutline,
    pub tone: ToneProfile,
    /// Profiles of the characters present in the scene.
    pub characters: Vec<CharacterProfile>,
    pub prior_summaries: Vec<String>,
    /// Present only when revising.
    pub revision: Option<RevisionContext>,
    pub previous_draft: Option<String>,
}

impl SceneRequest {
    pub fn brief(&self) -> SceneBrief<'_> {
        SceneBrief {
            scene: &self.scene,
            tone: &self.tone,
            characters: &self.characters,
            prior_summaries: &self.prior_summaries,
            revision: self.revision.as_ref(),
            previous_draft: self.previous_draft.as_deref(),
        }
    }

    pub fn is_revision(&self) -> bool {
        self.revision.is_some()
    }
}

/// Input for judging one draft.
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub scene: SceneOutline,
    pub draft: SceneDraft,
    pub tone: ToneProfile,
    /// Profiles of the characters the draft uses.
    pub characters: Vec<CharacterProfile>,
    pub report: DeterministicReport,
}

#[async_trait]
pub trait StoryPlanner: Send + Sync {
    async fn story_brief(&self, user_prompt: &str) -> Result<StoryBrief, AgentError>;

    async fn character_roster(&self, brief: &StoryBrief) -> Result<CharacterRoster, AgentError>;

    async fn world_context(&self, brief: &StoryBrief) -> Result<WorldContext, AgentError>;

    async fn outline(
        &self,
        brief: &StoryBrief,
        roster: &CharacterRoster,
        world: &WorldContext,
    ) -> Result<StoryOutline, AgentError>;
}

#[async_trait]
pub trait SceneWriter: Send + Sync {
    /// Prose for the requested scene.
    async fn write_scene(&self, request: &SceneRequest) -> Result<String, AgentError>;
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, request: &JudgeRequest) -> Result<JudgeVerdict, AgentError>;
}
