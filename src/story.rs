//! Structured story artifacts produced by the planning agents and consumed by
//! the writer and judge.
//!
//! Every artifact derives `Deserialize` with field defaults so that partial
//! model output still parses; required fields are enforced afterwards by
//! [`Validate::validate`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{artifact}: `{field}` must not be empty")]
    Empty {
        artifact: &'static str,
        field: &'static str,
    },
    #[error("{artifact}: `{field}` is out of range: {detail}")]
    OutOfRange {
        artifact: &'static str,
        field: &'static str,
        detail: String,
    },
}

/// Post-deserialization checks for required fields and numeric ranges.
pub trait Validate {
    fn validate(&self) -> Result<(), SchemaError>;
}

fn require(artifact: &'static str, field: &'static str, value: &str) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::Empty { artifact, field });
    }
    Ok(())
}

fn require_range<T: PartialOrd + std::fmt::Display>(
    artifact: &'static str,
    field: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<(), SchemaError> {
    if value < min || value > max {
        return Err(SchemaError::OutOfRange {
            artifact,
            field,
            detail: format!("{value} not in [{min}, {max}]"),
        });
    }
    Ok(())
}

// =============================================================================
// Brief
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Fantasy,
    SciFi,
    LiteraryFiction,
    Mystery,
    Thriller,
    Romance,
    Horror,
    HistoricalFiction,
}

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fantasy => "fantasy",
            Genre::SciFi => "sci_fi",
            Genre::LiteraryFiction => "literary_fiction",
            Genre::Mystery => "mystery",
            Genre::Thriller => "thriller",
            Genre::Romance => "romance",
            Genre::Horror => "horror",
            Genre::HistoricalFiction => "historical_fiction",
        }
    }
}

/// Numeric tone axes, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneProfile {
    /// 0 casual, 1 formal.
    pub formality: f64,
    /// 0 lighthearted, 1 dark.
    pub darkness: f64,
    /// 0 serious, 1 comic.
    pub humor: f64,
    /// 0 contemplative, 1 fast.
    pub pacing: f64,
    pub prose_style: String,
    pub reference_authors: Vec<String>,
}

impl Default for ToneProfile {
    fn default() -> Self {
        Self {
            formality: 0.5,
            darkness: 0.5,
            humor: 0.3,
            pacing: 0.5,
            prose_style: String::new(),
            reference_authors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeParameters {
    pub target_word_count: u32,
    pub num_acts: u32,
    pub scenes_per_act: u32,
    pub target_scene_word_count: u32,
}

impl Default for ScopeParameters {
    fn default() -> Self {
        Self {
            target_word_count: 3000,
            num_acts: 1,
            scenes_per_act: 3,
            target_scene_word_count: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryBrief {
    pub title: String,
    pub premise: String,
    pub genre: Genre,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub setting_summary: String,
    #[serde(default)]
    pub tone_profile: ToneProfile,
    #[serde(default)]
    pub scope: ScopeParameters,
    #[serde(default = "default_audience")]
    pub target_audience: String,
}

fn default_audience() -> String {
    "general adult".to_string()
}

impl Validate for StoryBrief {
    fn validate(&self) -> Result<(), SchemaError> {
        const A: &str = "StoryBrief";
        require(A, "title", &self.title)?;
        require(A, "premise", &self.premise)?;
        if self.themes.is_empty() {
            return Err(SchemaError::Empty {
                artifact: A,
                field: "themes",
            });
        }
        let t = &self.tone_profile;
        for (field, v) in [
            ("tone_profile.formality", t.formality),
            ("tone_profile.darkness", t.darkness),
            ("tone_profile.humor", t.humor),
            ("tone_profile.pacing", t.pacing),
        ] {
            require_range(A, field, v, 0.0, 1.0)?;
        }
        require_range(A, "scope.num_acts", self.scope.num_acts, 1, 5)?;
        require_range(A, "scope.scenes_per_act", self.scope.scenes_per_act, 1, 10)?;
        require_range(
            A,
            "scope.target_scene_word_count",
            self.scope.target_scene_word_count,
            1,
            u32::MAX,
        )?;
        Ok(())
    }
}

// =============================================================================
// Characters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Protagonist,
    Antagonist,
    Mentor,
    Supporting,
    LoveInterest,
    ComicRelief,
    Confidant,
    Foil,
}

impl CharacterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterRole::Protagonist => "protagonist",
            CharacterRole::Antagonist => "antagonist",
            CharacterRole::Mentor => "mentor",
            CharacterRole::Supporting => "supporting",
            CharacterRole::LoveInterest => "love_interest",
            CharacterRole::ComicRelief => "comic_relief",
            CharacterRole::Confidant => "confidant",
            CharacterRole::Foil => "foil",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub character_id: String,
    pub name: String,
    pub role: CharacterRole,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub personality_traits: Vec<String>,
    #[serde(default)]
    pub motivation: String,
    #[serde(default)]
    pub internal_conflict: String,
    #[serde(default)]
    pub backstory_summary: String,
    /// Dialect, vocabulary, cadence.
    #[serde(default)]
    pub voice_notes: String,
    /// Example phrases or verbal tics.
    #[serde(default)]
    pub speech_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRelationship {
    pub from_character_id: String,
    pub to_character_id: String,
    pub relationship_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterRoster {
    pub characters: Vec<CharacterProfile>,
    pub relationships: Vec<CharacterRelationship>,
}

impl CharacterRoster {
    pub fn get_character(&self, character_id: &str) -> Option<&CharacterProfile> {
        self.characters
            .iter()
            .find(|c| c.character_id == character_id)
    }
}

impl Validate for CharacterRoster {
    fn validate(&self) -> Result<(), SchemaError> {
        const A: &str = "CharacterRoster";
        for c in &self.characters {
            require(A, "characters[].character_id", &c.character_id)?;
            require(A, "characters[].name", &c.name)?;
        }
        for r in &self.relationships {
            require(A, "relationships[].from_character_id", &r.from_character_id)?;
            require(A, "relationships[].to_character_id", &r.to_character_id)?;
            require(A, "relationships[].relationship_type", &r.relationship_type)?;
        }
        Ok(())
    }
}

// =============================================================================
// World
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub significance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRule {
    pub rule_id: String,
    #[serde(default = "default_rule_category")]
    pub category: String,
    pub statement: String,
    #[serde(default)]
    pub implications: Vec<String>,
}

fn default_rule_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldContext {
    pub setting_period: String,
    pub setting_description: String,
    pub locations: Vec<Location>,
    pub rules: Vec<WorldRule>,
    pub key_facts: Vec<String>,
}

impl Validate for WorldContext {
    fn validate(&self) -> Result<(), SchemaError> {
        const A: &str = "WorldContext";
        for l in &self.locations {
            require(A, "locations[].location_id", &l.location_id)?;
            require(A, "locations[].name", &l.name)?;
        }
        for r in &self.rules {
            require(A, "rules[].rule_id", &r.rule_id)?;
            require(A, "rules[].statement", &r.statement)?;
        }
        Ok(())
    }
}

// =============================================================================
// Outline
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    Hook,
    IncitingIncident,
    RisingAction,
    Midpoint,
    Complication,
    Crisis,
    Climax,
    FallingAction,
    Resolution,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalValence {
    Positive,
    Negative,
    #[default]
    Neutral,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeBeat {
    pub beat_id: String,
    pub act_number: u32,
    pub sequence_number: u32,
    pub beat_type: BeatType,
    pub summary: String,
    #[serde(default)]
    pub characters_involved: Vec<String>,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub emotional_valence: EmotionalValence,
    #[serde(default)]
    pub purpose: String,
}

/// Scene plan detailed enough that the writer makes no plot decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneOutline {
    pub scene_id: String,
    pub act_number: u32,
    pub scene_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub beat_ids: Vec<String>,
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub characters_present: Vec<String>,
    #[serde(default)]
    pub pov_character_id: String,
    #[serde(default)]
    pub scene_goal: String,
    #[serde(default)]
    pub emotional_arc: String,
    #[serde(default)]
    pub opening_hook: String,
    #[serde(default)]
    pub closing_image: String,
    #[serde(default)]
    pub key_dialogue_beats: Vec<String>,
    /// Rolling summary of what happened before this scene.
    #[serde(default)]
    pub prior_scene_summary: String,
    #[serde(default = "default_scene_words")]
    pub target_word_count: i64,
}

fn default_scene_words() -> i64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActOutline {
    pub act_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub themes_explored: Vec<String>,
    #[serde(default)]
    pub beats: Vec<NarrativeBeat>,
    #[serde(default)]
    pub scenes: Vec<SceneOutline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryOutline {
    pub acts: Vec<ActOutline>,
}

impl StoryOutline {
    pub fn total_scenes(&self) -> usize {
        self.acts.iter().map(|a| a.scenes.len()).sum()
    }

    pub fn total_beats(&self) -> usize {
        self.acts.iter().map(|a| a.beats.len()).sum()
    }

    /// Scenes in reading order across all acts.
    pub fn scenes(&self) -> impl Iterator<Item = &SceneOutline> {
        self.acts.iter().flat_map(|a| a.scenes.iter())
    }

    pub fn scene(&self, index: usize) -> Option<&SceneOutline> {
        self.scenes().nth(index)
    }
}

impl Validate for StoryOutline {
    fn validate(&self) -> Result<(), SchemaError> {
        const A: &str = "StoryOutline";
        for act in &self.acts {
            require_range(A, "acts[].act_number", act.act_number, 1, u32::MAX)?;
            for beat in &act.beats {
                require(A, "beats[].beat_id", &beat.beat_id)?;
                require(A, "beats[].summary", &beat.summary)?;
                require_range(A, "beats[].sequence_number", beat.sequence_number, 1, u32::MAX)?;
            }
            for scene in &act.scenes {
                require(A, "scenes[].scene_id", &scene.scene_id)?;
                require_range(A, "scenes[].scene_number", scene.scene_number, 1, u32::MAX)?;
                require_range(
                    A,
                    "scenes[].target_word_count",
                    scene.target_word_count,
                    1,
                    i64::MAX,
                )?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Drafts
// =============================================================================

/// Latest prose for one scene. Replaced in place on revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDraft {
    pub scene_id: String,
    pub act_number: u32,
    pub scene_number: u32,
    pub prose: String,
    pub word_count: usize,
    #[serde(default)]
    pub characters_used: Vec<String>,
    /// Carried forward as rolling context for later scenes.
    #[serde(default)]
    pub scene_summary: String,
    #[serde(default)]
    pub notes_for_editor: String,
}

impl SceneDraft {
    /// Build a draft from writer output, deriving the word count.
    pub fn from_prose(outline: &SceneOutline, prose: impl Into<String>) -> Self {
        let prose = prose.into();
        Self {
            scene_id: outline.scene_id.clone(),
            act_number: outline.act_number,
            scene_number: outline.scene_number,
            word_count: crate::text_analysis::word_count(&prose),
            prose,
            characters_used: outline.characters_present.clone(),
            scene_summary: format!("Scene {}: {}", outline.scene_number, outline.scene_goal),
            notes_for_editor: String::new(),
        }
    }
}
