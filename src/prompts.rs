//! Prompt assembly for every agent.
//!
//! Each system prompt is composed from the same parts: a role identity line,
//! a task statement, guidelines, an output shape and a closing motivation.
//! The judge swaps guidelines for the evaluation rubric. Placeholders use
//! `{name}` and are filled with `str::replace`.

use serde::Serialize;

use crate::config::PromptConfig;
use crate::control::{RevisionContext, RevisionFraming};
use crate::gateway::Message;
use crate::story::{CharacterProfile, CharacterRoster, SceneOutline, StoryBrief, ToneProfile, WorldContext};
use crate::text_analysis::{DeterministicReport, Tense};

// =============================================================================
// Rendered prompt
// =============================================================================

/// Rendered prompt ready for a model.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub slug: &'static str,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

fn pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

fn role_identity(role_name: &str) -> String {
    format!("You are a {role_name} for a creative writing system.")
}

fn head(role_name: &str, task: &str) -> String {
    format!("{}\n{}", role_identity(role_name), task)
}

fn compose(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn fill_tone(template: &str, tone: &ToneProfile) -> String {
    template
        .replace("{formality}", &format!("{:.1}", tone.formality))
        .replace("{darkness}", &format!("{:.1}", tone.darkness))
        .replace("{humor}", &format!("{:.1}", tone.humor))
        .replace("{pacing}", &format!("{:.1}", tone.pacing))
}

// =============================================================================
// Task statements and guidelines
// =============================================================================

const TASK_STORY_BRIEF: &str = "Given a user's story prompt, produce a detailed StoryBrief.";
const TASK_CHARACTER_ROSTER: &str =
    "Given a StoryBrief, create a CharacterRoster with 2-4 characters for a short story.";
const TASK_WORLD_CONTEXT: &str = "Given a StoryBrief, create a WorldContext with the setting details.";
const TASK_OUTLINE: &str =
    "Given a StoryBrief, CharacterRoster, and WorldContext, create a detailed StoryOutline.";
const TASK_SCENE_WRITER: &str =
    "Write the prose for the given scene based on the detailed outline provided.";
const TASK_JUDGE: &str = "Evaluate the scene prose against the outline using the rubric below.";

const STORY_BRIEF_GUIDELINES: &str = "Guidelines:
- Choose a genre that best fits the prompt
- Extract {num_themes} strong themes
- Write a 1-2 sentence premise that captures the core conflict
- Create a compelling title
- Set scope to {num_acts} act(s) with {scenes_per_act} scenes (this is a short story)
- Set target_scene_word_count between {min_word_count}-{max_word_count} words
- Configure the tone_profile with numeric values (0.0-1.0) that match the story's mood
- Set target_audience appropriately";

const CHARACTER_ROSTER_GUIDELINES: &str = "Guidelines:
- Every story needs at least a protagonist
- Give each character a unique character_id (e.g. \"c1\", \"c2\")
- Write distinct voice_notes and speech_patterns for each character
- Define clear motivations and internal conflicts
- Add at least one relationship between characters
- Keep backstories brief; this is a short story
- personality_traits should be 3-5 specific adjectives";

const WORLD_CONTEXT_GUIDELINES: &str = "Guidelines:
- Define the setting_period and setting_description clearly
- Create 1-3 locations that the story will use
- Give each location a unique location_id (e.g. \"loc1\", \"loc2\")
- Add 1-3 world rules that constrain or enrich the story
- Give each rule a unique rule_id (e.g. \"r1\", \"r2\")
- Include 2-4 key_facts that writers should know
- Keep it focused: only details relevant to this short story";

const OUTLINE_GUIDELINES: &str = "Guidelines:
- Create exactly the number of acts specified in scope.num_acts
- Create exactly the number of scenes per act specified in scope.scenes_per_act
- Every scene must have a unique scene_id (e.g. \"s1\", \"s2\", \"s3\")
- Every beat must have a unique beat_id (e.g. \"b1\", \"b2\", \"b3\")
- Assign beats to scenes via beat_ids
- Use beat_type values: hook, inciting_incident, rising_action, midpoint, complication, crisis, climax, falling_action, resolution
- Characters in characters_present and characters_involved must reference character_ids from the roster
- Locations must reference location_ids from the world context
- Write a specific opening_hook and closing_image for each scene
- Include 2-4 key_dialogue_beats per scene describing important dialogue moments
- Set emotional_arc for each scene (e.g. \"curiosity builds to dread\")
- Set scene_goal to describe what the scene must accomplish
- The first scene's prior_scene_summary should be empty
- Each later scene's prior_scene_summary should describe what happened before it
- Set target_word_count per scene based on the scope parameters";

const SCENE_WRITER_GUIDELINES: &str = "Guidelines:
- Follow the scene outline EXACTLY; do not invent new plot points
- Match the tone_profile: formality={formality}, darkness={darkness}, humor={humor}, pacing={pacing}
- Match the prose style: {prose_style}
- Write from the POV character's perspective
- Use the opening_hook to start the scene
- Use the closing_image to end the scene
- Hit the key_dialogue_beats naturally within the prose
- Follow the emotional_arc described in the outline
- Keep each character's voice consistent with their voice_notes and speech_patterns
- Target approximately {target_word_count} words
- Write complete, polished prose, not notes or outlines";

// =============================================================================
// Output shapes
// =============================================================================

const STORY_BRIEF_SHAPE: &str = r#"Return only a JSON object of this shape:
{"title": "...", "premise": "...", "genre": "fantasy|sci_fi|literary_fiction|mystery|thriller|romance|horror|historical_fiction", "themes": ["..."], "setting_summary": "...", "tone_profile": {"formality": 0.5, "darkness": 0.5, "humor": 0.3, "pacing": 0.5, "prose_style": "...", "reference_authors": ["..."]}, "scope": {"target_word_count": 3000, "num_acts": 1, "scenes_per_act": 3, "target_scene_word_count": 1000}, "target_audience": "..."}"#;

const CHARACTER_ROSTER_SHAPE: &str = r#"Return only a JSON object of this shape:
{"characters": [{"character_id": "c1", "name": "...", "role": "protagonist|antagonist|mentor|supporting|love_interest|comic_relief|confidant|foil", "description": "...", "personality_traits": ["..."], "motivation": "...", "internal_conflict": "...", "backstory_summary": "...", "voice_notes": "...", "speech_patterns": ["..."]}], "relationships": [{"from_character_id": "c1", "to_character_id": "c2", "relationship_type": "...", "description": "..."}]}"#;

const WORLD_CONTEXT_SHAPE: &str = r#"Return only a JSON object of this shape:
{"setting_period": "...", "setting_description": "...", "locations": [{"location_id": "loc1", "name": "...", "description": "...", "significance": "..."}], "rules": [{"rule_id": "r1", "category": "...", "statement": "...", "implications": ["..."]}], "key_facts": ["..."]}"#;

const OUTLINE_SHAPE: &str = r#"Return only a JSON object of this shape:
{"acts": [{"act_number": 1, "title": "...", "summary": "...", "themes_explored": ["..."], "beats": [{"beat_id": "b1", "act_number": 1, "sequence_number": 1, "beat_type": "hook", "summary": "...", "characters_involved": ["c1"], "location_id": "loc1", "emotional_valence": "positive|negative|neutral|mixed", "purpose": "..."}], "scenes": [{"scene_id": "s1", "act_number": 1, "scene_number": 1, "title": "...", "beat_ids": ["b1"], "setting": "loc1", "characters_present": ["c1"], "pov_character_id": "c1", "scene_goal": "...", "emotional_arc": "...", "opening_hook": "...", "closing_image": "...", "key_dialogue_beats": ["..."], "prior_scene_summary": "", "target_word_count": 1000}]}]}"#;

const VERDICT_SHAPE: &str = r#"Return only a JSON object with the keys in this order:
{"dimension_reasoning": "evidence and reasoning for every dimension, written BEFORE the scores", "style_adherence": 1-4, "character_voice": 1-4, "outline_adherence": 1-4, "pacing": 1-4, "prose_quality": 1-4, "confirmed_slop": ["flagged candidates that genuinely read as clichés in context"], "revision_instructions": "...", "overall_assessment": "..."}"#;

// =============================================================================
// Evaluation rubric
// =============================================================================

const EVALUATION_RUBRIC: &str = "## Evaluation Process

For EACH dimension, you MUST:
1. Cite 2-3 specific phrases from the text as evidence
2. Explain how they support your score
3. Then assign your 1-4 score

{normalization_guidance}

## Rubric (1-4 scale)

### Style Adherence
- 1: Prose contradicts 2+ tone axes (formality={formality}, darkness={darkness}, humor={humor}, pacing={pacing})
- 2: Matches some tone axes, clear mismatches on others
- 3: Matches most tone axes, minor mismatches
- 4: All tone axes reflected naturally in the prose

### Character Voice
- 1: Characters sound interchangeable, generic dialogue
- 2: Faint distinction between characters, frequent drift
- 3: Clear distinction between characters, occasional drift
- 4: Each character unmistakably voiced per their voice_notes

### Outline Adherence
- 1: Missing the opening_hook OR the closing_image OR more than one dialogue beat
- 2: Structural elements present but one dialogue beat missing or the scene goal blurred
- 3: All structural elements present, minor deviations from the outline
- 4: opening_hook, closing_image, and all key_dialogue_beats executed precisely

### Pacing
- 1: Monotonous rhythm, no sentence variety, flat emotional arc
- 2: Little rhythm variation, emotional arc mostly flat
- 3: Some rhythm variation, emotional arc partially achieved
- 4: Dynamic sentence lengths serving the emotional beats, arc fully realized

### Prose Quality
- 1: Heavy AI-isms (delve, tapestry, testament to, etc.), telling over showing
- 2: Noticeable generic phrasing or stock imagery
- 3: Mostly clean prose, some generic phrasing
- 4: Vivid, specific language; show-don't-tell throughout; original imagery

## Important Notes
- The automated analysis lists slop CANDIDATES. Put in confirmed_slop only those that read as clichés in this scene; ignore false positives such as names or literal uses
- If prose_quality has confirmed AI-isms, it cannot score above 2
- Write revision_instructions ONLY if quality is insufficient; focus on the lowest-scoring dimensions
- In revision_instructions, be specific: quote the problematic text and suggest concrete improvements";

// =============================================================================
// Planning prompts
// =============================================================================

pub fn story_brief_prompt(config: &PromptConfig, user_prompt: &str) -> PromptInstance {
    let guidelines = STORY_BRIEF_GUIDELINES
        .replace("{num_themes}", &config.num_themes)
        .replace("{num_acts}", &config.num_acts.to_string())
        .replace("{scenes_per_act}", &config.scenes_per_act)
        .replace("{min_word_count}", &config.min_word_count.to_string())
        .replace("{max_word_count}", &config.max_word_count.to_string());
    PromptInstance {
        slug: "story_brief",
        system: compose(&[
            head(&config.story_brief_role, TASK_STORY_BRIEF).as_str(),
            guidelines.as_str(),
            STORY_BRIEF_SHAPE,
            config.story_brief_motivation.as_str(),
        ]),
        user: user_prompt.trim().to_string(),
    }
}

pub fn character_roster_prompt(config: &PromptConfig, brief: &StoryBrief) -> PromptInstance {
    PromptInstance {
        slug: "character_roster",
        system: compose(&[
            head(&config.character_roster_role, TASK_CHARACTER_ROSTER).as_str(),
            CHARACTER_ROSTER_GUIDELINES,
            CHARACTER_ROSTER_SHAPE,
            config.character_roster_motivation.as_str(),
        ]),
        user: format!("Create characters for this story:\n\n{}", pretty_json(brief)),
    }
}

pub fn world_context_prompt(config: &PromptConfig, brief: &StoryBrief) -> PromptInstance {
    PromptInstance {
        slug: "world_context",
        system: compose(&[
            head(&config.world_context_role, TASK_WORLD_CONTEXT).as_str(),
            WORLD_CONTEXT_GUIDELINES,
            WORLD_CONTEXT_SHAPE,
            config.world_context_motivation.as_str(),
        ]),
        user: format!("Create the world for this story:\n\n{}", pretty_json(brief)),
    }
}

pub fn outline_prompt(
    config: &PromptConfig,
    brief: &StoryBrief,
    roster: &CharacterRoster,
    world: &WorldContext,
) -> PromptInstance {
    PromptInstance {
        slug: "story_outline",
        system: compose(&[
            head(&config.outliner_role, TASK_OUTLINE).as_str(),
            OUTLINE_GUIDELINES,
            OUTLINE_SHAPE,
            config.outliner_motivation.as_str(),
        ]),
        user: format!(
            "Create a detailed story outline:\n\n## Story Brief\n{}\n\n## Character Roster\n{}\n\n## World Context\n{}",
            pretty_json(brief),
            pretty_json(roster),
            pretty_json(world)
        ),
    }
}

// =============================================================================
// Scene writer
// =============================================================================

/// Everything the writer sees for one scene.
#[derive(Debug, Clone)]
pub struct SceneBrief<'a> {
    pub scene: &'a SceneOutline,
    pub tone: &'a ToneProfile,
    pub characters: &'a [CharacterProfile],
    pub prior_summaries: &'a [String],
    pub revision: Option<&'a RevisionContext>,
    pub previous_draft: Option<&'a str>,
}

fn describe_flag(flag: &str) -> &'static str {
    match flag {
        "opener_monotony" => "too many sentences open the same way; vary how sentences begin",
        "length_monotony" => "sentence lengths are too uniform; mix short and long sentences",
        "passive_heavy" => "too much passive voice; prefer active constructions",
        "structural_monotony" => "sentence structure is repetitively simple; vary clause structure",
        "low_diversity" => "word choice repeats itself; broaden the vocabulary",
        "basic_vocabulary" => "vocabulary leans on very common words; choose more specific ones",
        _ => "see editor notes",
    }
}

/// Appended to the writer's system prompt on every revision pass.
pub fn revision_addendum(ctx: &RevisionContext) -> String {
    let mut out = String::from("## REVISION INSTRUCTIONS\n");
    out.push_str(&format!("This is revision #{}.\n", ctx.revision_number));
    out.push_str(match ctx.framing {
        RevisionFraming::Polish => {
            "The previous draft was APPROVED. This is a polish pass: keep its structure and \
             strengths, and change only what the notes below call out.\n"
        }
        RevisionFraming::Revision => {
            "The previous draft was NOT approved. Address every concern below while preserving \
             what works.\n"
        }
    });

    out.push_str(&format!(
        "\n### Dimension Scores from Previous Draft (composite {:.2})\n",
        ctx.previous_score
    ));
    for (dimension, score) in ctx.scores.iter() {
        out.push_str(&format!("- {}: {}/4\n", dimension.field_name(), score));
    }

    out.push_str("\n### Editor Notes\n");
    if ctx.instructions.trim().is_empty() {
        out.push_str("(none)\n");
    } else {
        out.push_str(ctx.instructions.trim());
        out.push('\n');
    }

    if !ctx.focus_dimensions.is_empty() {
        let names: Vec<_> = ctx.focus_dimensions.iter().map(|d| d.field_name()).collect();
        out.push_str(&format!("\n### Focus Dimensions\n{}\n", names.join(", ")));
    }

    if !ctx.confirmed_slop.is_empty() {
        out.push_str("\n### Clichés to Remove\n");
        for phrase in &ctx.confirmed_slop {
            out.push_str(&format!("- \"{phrase}\"\n"));
        }
    }

    let flags: Vec<_> = ctx
        .flags
        .structural()
        .into_iter()
        .chain(ctx.flags.vocabulary())
        .collect();
    if !flags.is_empty() || ctx.cross_scene_repetitions > 0 {
        out.push_str("\n### Automated Prose Checks\n");
        for flag in flags {
            out.push_str(&format!("- {flag}: {}\n", describe_flag(flag)));
        }
        if ctx.cross_scene_repetitions > 0 {
            out.push_str(&format!(
                "- {} phrase(s) repeat verbatim from earlier scenes; rephrase them\n",
                ctx.cross_scene_repetitions
            ));
        }
    }

    out.push_str(
        "\nAddress the editor's concerns while preserving what works. Focus especially on the \
         lowest-scoring dimensions listed above.",
    );
    out
}

pub fn scene_writer_prompt(config: &PromptConfig, brief: &SceneBrief<'_>) -> PromptInstance {
    let prose_style = if brief.tone.prose_style.trim().is_empty() {
        config.prose_style.as_str()
    } else {
        brief.tone.prose_style.as_str()
    };
    let guidelines = fill_tone(SCENE_WRITER_GUIDELINES, brief.tone)
        .replace("{prose_style}", prose_style)
        .replace("{target_word_count}", &brief.scene.target_word_count.to_string());

    let mut system = compose(&[
        head(&config.scene_writer_role, TASK_SCENE_WRITER).as_str(),
        guidelines.as_str(),
        config.scene_writer_motivation.as_str(),
    ]);
    if let Some(ctx) = brief.revision {
        system.push_str("\n\n");
        system.push_str(&revision_addendum(ctx));
    }

    let mut user = format!("Write the scene:\n\n## Scene Outline\n{}\n\n", pretty_json(brief.scene));
    user.push_str("## Characters in Scene\n");
    for c in brief.characters {
        user.push_str(&format!("### {} ({})\n", c.name, c.role.as_str()));
        user.push_str(&format!("Voice: {}\n", c.voice_notes));
        user.push_str(&format!("Patterns: {}\n", c.speech_patterns.join(", ")));
        user.push_str(&format!("Motivation: {}\n\n", c.motivation));
    }
    if !brief.prior_summaries.is_empty() {
        user.push_str("## Story So Far\n");
        for s in brief.prior_summaries {
            user.push_str(&format!("- {s}\n"));
        }
        user.push('\n');
    }
    if let Some(prev) = brief.previous_draft.filter(|_| brief.revision.is_some()) {
        user.push_str(&format!("## Previous Draft\n{}\n", prev.trim()));
    }

    PromptInstance {
        slug: "scene_writer",
        system,
        user: user.trim_end().to_string(),
    }
}

// =============================================================================
// Judge
// =============================================================================

/// Automated-analysis block shown to the judge.
pub fn analysis_block(report: &DeterministicReport) -> String {
    let mut lines = vec!["## Automated Analysis".to_string()];

    let wc = &report.word_count;
    if wc.target <= 0 {
        lines.push(format!("- Word count: {} (no target)", wc.actual));
    } else if wc.within_tolerance {
        lines.push(format!("- Word count: {} (target {}, within range)", wc.actual, wc.target));
    } else {
        lines.push(format!(
            "- Word count: {} (target {}, OUT OF RANGE by {:+.0}%)",
            wc.actual,
            wc.target,
            wc.deviation * 100.0
        ));
    }

    let t = &report.tense;
    match (t.dominant_tense, t.consistent) {
        (Tense::Unknown, _) => lines.push("- Tense: not determined".to_string()),
        (tense, true) => lines.push(format!("- Tense: {} (consistent)", tense.as_str())),
        (tense, false) => lines.push(format!(
            "- Tense: INCONSISTENT, mostly {} ({:.0}% minority tense in narration)",
            tense.as_str(),
            t.minority_ratio * 100.0
        )),
    }

    let slop = &report.slop;
    if slop.found_phrases.is_empty() {
        lines.push("- Slop candidates: none".to_string());
    } else {
        let quoted: Vec<_> = slop.found_phrases.iter().map(|p| format!("\"{p}\"")).collect();
        lines.push(format!(
            "- Slop candidates (confirm or reject each): {}",
            quoted.join(", ")
        ));
    }
    if !slop.found_words.is_empty() {
        let words: Vec<_> = slop
            .found_words
            .iter()
            .map(|(w, n)| format!("{w} ({n})"))
            .collect();
        lines.push(format!("- Overused words: {}", words.join(", ")));
    }

    for line in report.summary_lines() {
        lines.push(format!("- {line}"));
    }

    if !report.repetition.repeated_phrases.is_empty() {
        let quoted: Vec<_> = report
            .repetition
            .repeated_phrases
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect();
        lines.push(format!("- Repeated from earlier scenes: {}", quoted.join(", ")));
    }

    lines.join("\n")
}

pub fn judge_prompt(
    config: &PromptConfig,
    scene: &SceneOutline,
    prose: &str,
    tone: &ToneProfile,
    characters: &[CharacterProfile],
    report: &DeterministicReport,
) -> PromptInstance {
    let rubric = fill_tone(EVALUATION_RUBRIC, tone)
        .replace("{normalization_guidance}", &config.normalization_guidance);
    let system = compose(&[
        head(&config.judge_role, TASK_JUDGE).as_str(),
        rubric.as_str(),
        VERDICT_SHAPE,
    ]);

    let mut user = format!(
        "Evaluate this scene:\n\n## Scene Outline\n{}\n\n## Scene Prose ({} words)\n{}\n\n## Tone Profile\n{}\n\n",
        pretty_json(scene),
        report.word_count.actual,
        prose.trim(),
        pretty_json(tone)
    );
    user.push_str("## Character Voices\n");
    for c in characters {
        user.push_str(&format!("- {}: {}\n", c.name, c.voice_notes));
    }
    user.push('\n');
    user.push_str(&analysis_block(report));

    PromptInstance {
        slug: "judge",
        system,
        user,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::{
        Dimension, DimensionScore, DimensionScores, Feedback, SceneRubric, ScoringPolicy,
    };
    use crate::story::CharacterRole;

    fn scene() -> SceneOutline {
        serde_json::from_value(serde_json::json!({
            "scene_id": "s1", "act_number": 1, "scene_number": 1,
            "opening_hook": "The relay hums.", "target_word_count": 900
        }))
        .unwrap()
    }

    fn character() -> CharacterProfile {
        serde_json::from_value(serde_json::json!({
            "character_id": "c1", "name": "Mara Ode", "role": "protagonist",
            "voice_notes": "clipped, technical", "speech_patterns": ["short questions"]
        }))
        .unwrap()
    }

    #[test]
    fn story_brief_prompt_fills_scope() {
        let cfg = PromptConfig::default();
        let p = story_brief_prompt(&cfg, "  a lighthouse keeper  ");
        assert!(p.system.starts_with("You are a Plot Architect for a creative writing system."));
        assert!(p.system.contains("Extract 2-4 strong themes"));
        assert!(p.system.contains("between 800-1200 words"));
        assert!(p.system.ends_with(&cfg.story_brief_motivation));
        assert_eq!(p.user, "a lighthouse keeper");
        assert_eq!(p.to_messages().len(), 2);
    }

    #[test]
    fn role_names_are_configurable() {
        let cfg = PromptConfig {
            outliner_role: "Story Cartographer".into(),
            ..Default::default()
        };
        let brief: StoryBrief = serde_json::from_value(serde_json::json!({
            "title": "T", "premise": "P", "genre": "mystery"
        }))
        .unwrap();
        let p = outline_prompt(&cfg, &brief, &CharacterRoster::default(), &WorldContext::default());
        assert!(p.system.contains("You are a Story Cartographer"));
        assert!(p.user.contains("## Character Roster"));
    }

    #[test]
    fn scene_writer_prompt_without_revision() {
        let cfg = PromptConfig::default();
        let outline = scene();
        let tone = ToneProfile::default();
        let chars = vec![character()];
        let summaries = vec!["Scene 1: arrive".to_string()];
        let p = scene_writer_prompt(
            &cfg,
            &SceneBrief {
                scene: &outline,
                tone: &tone,
                characters: &chars,
                prior_summaries: &summaries,
                revision: None,
                previous_draft: Some("old"),
            },
        );
        assert!(p.system.contains("formality=0.5, darkness=0.5, humor=0.3, pacing=0.5"));
        assert!(p.system.contains("Match the prose style: natural and engaging"));
        assert!(p.system.contains("Target approximately 900 words"));
        assert!(!p.system.contains("REVISION"));
        assert!(p.user.contains("### Mara Ode (protagonist)"));
        assert!(p.user.contains("Patterns: short questions"));
        assert!(p.user.contains("## Story So Far\n- Scene 1: arrive"));
        assert!(!p.user.contains("Previous Draft"));
        assert_eq!(chars[0].role, CharacterRole::Protagonist);
    }

    #[test]
    fn revision_addendum_lists_breakdown_focus_and_slop() {
        let mut scores = DimensionScores::uniform(DimensionScore::new(3).unwrap());
        scores.set(Dimension::Pacing, DimensionScore::new(2).unwrap());
        let mut rubric = SceneRubric::new(scores, ScoringPolicy::default());
        rubric.flags.opener_monotony = true;
        rubric.cross_scene_repetitions = 2;
        let fb = Feedback::new(
            "s1",
            rubric,
            "Cut the second paragraph.",
            "",
            vec!["a testament to".into()],
        )
        .unwrap();
        let ctx = RevisionContext::from_feedback(1, &fb);
        let text = revision_addendum(&ctx);

        assert!(text.contains("This is revision #1."));
        assert!(text.contains("NOT approved"));
        assert!(text.contains("- pacing: 2/4"));
        assert!(text.contains("- style_adherence: 3/4"));
        assert!(text.contains("Cut the second paragraph."));
        assert!(text.contains("### Focus Dimensions\npacing"));
        assert!(text.contains("- \"a testament to\""));
        assert!(text.contains("- opener_monotony: "));
        assert!(text.contains("2 phrase(s) repeat verbatim"));
    }

    #[test]
    fn polish_framing_and_previous_draft() {
        let fb = Feedback::new(
            "s1",
            SceneRubric::new(
                DimensionScores::uniform(DimensionScore::MAX),
                ScoringPolicy::default(),
            ),
            "",
            "",
            vec![],
        )
        .unwrap();
        let ctx = RevisionContext::from_feedback(1, &fb);
        let outline = scene();
        let tone = ToneProfile::default();
        let p = scene_writer_prompt(
            &PromptConfig::default(),
            &SceneBrief {
                scene: &outline,
                tone: &tone,
                characters: &[],
                prior_summaries: &[],
                revision: Some(&ctx),
                previous_draft: Some("The relay hummed."),
            },
        );
        assert!(p.system.contains("APPROVED. This is a polish pass"));
        assert!(p.system.contains("### Editor Notes\n(none)"));
        assert!(!p.system.contains("Focus Dimensions"));
        assert!(p.user.ends_with("## Previous Draft\nThe relay hummed."));
    }

    #[test]
    fn judge_prompt_carries_rubric_and_analysis() {
        use crate::config::PipelineConfig;
        use crate::text_analysis::TextAnalyzer;
        use std::collections::HashSet;

        let analyzer = TextAnalyzer::bundled().unwrap();
        let prose = "It was a testament to her resolve. She walked on.";
        let report = analyzer.analyze(prose, 900, &HashSet::new(), &[] as &[&str], &PipelineConfig::default());
        let p = judge_prompt(
            &PromptConfig::default(),
            &scene(),
            prose,
            &ToneProfile::default(),
            &[character()],
            &report,
        );
        assert!(p.system.contains("## Rubric (1-4 scale)"));
        assert!(p.system.contains("Score STRICTLY"));
        assert!(p.system.contains("\"confirmed_slop\""));
        assert!(p.user.contains("## Scene Prose (10 words)"));
        assert!(p.user.contains("- Mara Ode: clipped, technical"));
        assert!(p.user.contains("OUT OF RANGE"));
        assert!(p.user.contains("## Automated Analysis"));
    }
}
