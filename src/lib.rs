#![forbid(unsafe_code)]

//! # storyloom
//!
//! Quality-gated short story generation.
//!
//! A planner turns a prompt into a brief, cast, world and scene outline. Each
//! scene is drafted, measured by deterministic prose analyzers (word count,
//! tense, cliché density, sentence structure, lexical diversity, cross-scene
//! repetition), then scored by an LLM judge on five 1–4 dimensions. The
//! weighted composite, minus advisory penalties, decides whether the scene is
//! revised or the pipeline advances.
//!
//! Everything below [`pipeline`] is synchronous and deterministic except the
//! agents, which reach the model through [`gateway::ChatGateway`].

pub mod agents;
pub mod config;
pub mod control;
pub mod gateway;
pub mod lexicon;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod rubric;
pub mod story;
pub mod text_analysis;

pub use agents::{AgentError, Judge, SceneWriter, StoryPlanner};
pub use config::{ConfigError, PipelineConfig};
pub use control::{Decision, PipelineState, RevisionLimits, Stage};
pub use gateway::{Attribution, ChatGateway, ProviderError, ProviderGateway, UsageSink};
pub use lexicon::{Lexicon, LexiconError};
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome};
pub use report::ReportError;
pub use rubric::{DimensionScore, Feedback, JudgeVerdict, SceneRubric, ScoringPolicy};
pub use text_analysis::{DeterministicReport, TextAnalyzer};
