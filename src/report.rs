//! Human-readable run report, manuscript, and session files.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pipeline::PipelineOutcome;
use crate::rubric::{Feedback, SceneMetrics};

const RULE: usize = 70;
const SUBRULE: usize = 40;

/// Reasoning excerpt length in the written report.
pub const REPORT_REASONING_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

/// Display lines for one evaluation.
pub fn feedback_entry_lines(fb: &Feedback, max_reasoning: usize) -> Vec<String> {
    let r = fb.rubric();
    let status = if fb.approved() {
        "APPROVED"
    } else {
        "REVISION NEEDED"
    };
    let wc = if r.word_count_in_range {
        "OK"
    } else {
        "OUT OF RANGE"
    };
    let tense = if r.tense_consistent {
        "consistent"
    } else {
        "inconsistent"
    };

    let mut lines = vec![
        format!(
            "  Scene {}: composite={:.2} [{status}]",
            fb.scene_id(),
            fb.quality_score()
        ),
        format!("    {}", r.dimension_summary()),
        format!(
            "    word_count: {wc} | tense: {tense} | slop: {:.2}",
            r.slop_ratio.get()
        ),
    ];

    let structural = r.flags.structural();
    if !structural.is_empty() {
        lines.push(format!("    structural: {}", structural.join(", ")));
    }
    let vocabulary = r.flags.vocabulary();
    if !vocabulary.is_empty() {
        lines.push(format!("    vocabulary: {}", vocabulary.join(", ")));
    }
    if r.cross_scene_repetitions > 0 {
        lines.push(format!(
            "    cross_scene_repetitions: {}",
            r.cross_scene_repetitions
        ));
    }
    if r.has_critical_failure() {
        lines.push("    ** CRITICAL FAILURE on one or more dimensions **".to_string());
    }
    if !fb.confirmed_slop().is_empty() {
        lines.push(format!(
            "    confirmed_slop: {}",
            fb.confirmed_slop().join("; ")
        ));
    }
    if !r.dimension_reasoning.is_empty() {
        lines.push(format!(
            "    Reasoning: \"{}\"",
            truncate(&r.dimension_reasoning, max_reasoning)
        ));
    }
    if !fb.overall_assessment().is_empty() {
        lines.push(format!("    Assessment: {}", fb.overall_assessment()));
    }
    lines
}

/// Fixed-width trend table, one row per evaluation. Empty input, empty output.
pub fn scene_metrics_lines(metrics: &[SceneMetrics]) -> Vec<String> {
    if metrics.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![
        "SCENE METRICS".to_string(),
        "-".repeat(SUBRULE),
        format!(
            "  {:<8} {:>6} {:>6} {:>6} {:>8} {:>6}",
            "Scene", "Words", "Slop", "MTLD", "Opener%", "LenCV"
        ),
    ];
    for m in metrics {
        lines.push(format!(
            "  {:<8} {:>6} {:>6.2} {:>6.1} {:>7.1}% {:>6.2}",
            m.scene_id,
            m.word_count,
            m.slop_ratio,
            m.mtld,
            m.opener_ratio * 100.0,
            m.sent_length_cv
        ));
    }
    lines
}

/// Final drafts in reading order.
pub fn render_manuscript(outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    for draft in &outcome.state.scene_drafts {
        out.push_str(&format!(
            "\n--- Scene {}.{} ---\n\n",
            draft.act_number, draft.scene_number
        ));
        out.push_str(draft.prose.trim_end());
        out.push('\n');
    }
    out
}

pub fn render_report(outcome: &PipelineOutcome) -> String {
    let state = &outcome.state;
    let mut out = String::new();

    out.push_str(&format!("Title: {}\n", outcome.title()));
    if let Some(brief) = &state.story_brief {
        out.push_str(&format!("Genre: {}\n", brief.genre.as_str()));
        out.push_str(&format!("Themes: {}\n", brief.themes.join(", ")));
        out.push_str(&format!("Premise: {}\n", brief.premise));
    }
    out.push_str(&format!("Run: {}\n", outcome.run_id));
    out.push_str(&format!("Generated: {}\n", outcome.created_at));
    out.push_str(&format!(
        "Pipeline time: {:.1}s\n",
        outcome.elapsed_ms as f64 / 1000.0
    ));
    if let Some(outline) = &state.story_outline {
        out.push_str(&format!(
            "Structure: {} scenes, {} beats\n",
            outline.total_scenes(),
            outline.total_beats()
        ));
    }
    out.push_str(&format!("Total words: {}\n", outcome.total_words()));
    out.push_str(&format!(
        "Edit rounds: {} ({} of {} scenes approved)\n",
        outcome.evaluations(),
        outcome.approved_scenes(),
        state.scene_drafts.len()
    ));

    if let Some(roster) = state.character_roster.as_ref().filter(|r| !r.characters.is_empty()) {
        out.push_str("\nCHARACTERS\n");
        out.push_str(&"-".repeat(SUBRULE));
        out.push('\n');
        for c in &roster.characters {
            out.push_str(&format!(
                "  {} ({}): {}\n",
                c.name,
                c.role.as_str(),
                c.motivation
            ));
        }
    }

    if !state.edit_feedback.is_empty() {
        out.push_str("\nEDIT FEEDBACK\n");
        out.push_str(&"-".repeat(SUBRULE));
        out.push('\n');
        for fb in &state.edit_feedback {
            for line in feedback_entry_lines(fb, REPORT_REASONING_CHARS) {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }

    let metrics = scene_metrics_lines(&state.scene_metrics);
    if !metrics.is_empty() {
        out.push('\n');
        for line in metrics {
            out.push_str(&line);
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(&"=".repeat(RULE));
    out.push_str("\nMANUSCRIPT\n");
    out.push_str(&"=".repeat(RULE));
    out.push('\n');
    out.push_str(&render_manuscript(outcome));
    out
}

// =============================================================================
// Session files
// =============================================================================

/// Paths written by [`write_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub session: PathBuf,
    pub report: PathBuf,
    pub manuscript: PathBuf,
}

/// Lowercased title with non-alphanumerics folded to `_`, at most 40 chars.
pub fn title_slug(title: &str) -> String {
    let slug: String = title
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(40)
        .collect();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    std::fs::write(path, contents).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write session JSON, text report and manuscript into `dir`, creating it if
/// needed. File names share a `<slug>_<run prefix>` stem.
pub fn write_session(dir: &Path, outcome: &PipelineOutcome) -> Result<SessionFiles, ReportError> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let run = outcome.run_id.simple().to_string();
    let stem = format!("{}_{}", title_slug(outcome.title()), &run[..8]);
    let files = SessionFiles {
        session: dir.join(format!("{stem}.json")),
        report: dir.join(format!("{stem}_report.txt")),
        manuscript: dir.join(format!("{stem}_manuscript.txt")),
    };

    write_file(&files.session, &serde_json::to_string_pretty(outcome)?)?;
    write_file(&files.report, &render_report(outcome))?;
    write_file(&files.manuscript, &render_manuscript(outcome))?;
    tracing::info!(session = %files.session.display(), "session written");
    Ok(files)
}

pub fn read_session(path: &Path) -> Result<PipelineOutcome, ReportError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{PipelineState, RevisionLimits, Stage};
    use crate::rubric::{
        AdvisoryFlags, DimensionScore, DimensionScores, ScoringPolicy, SceneRubric,
    };
    use crate::story::SceneDraft;

    fn feedback(score: u8) -> Feedback {
        let mut rubric = SceneRubric::new(
            DimensionScores::uniform(DimensionScore::new(score).unwrap()),
            ScoringPolicy::default(),
        );
        rubric.flags = AdvisoryFlags {
            opener_monotony: true,
            low_diversity: true,
            ..AdvisoryFlags::default()
        };
        rubric.dimension_reasoning = "x".repeat(250);
        Feedback::new("s1", rubric, "cut adverbs", "Steady.", vec!["a testament to".into()]).unwrap()
    }

    fn outcome() -> PipelineOutcome {
        let mut state = PipelineState::new("a lighthouse", RevisionLimits::default()).unwrap();
        let outline: crate::story::SceneOutline = serde_json::from_value(serde_json::json!({
            "scene_id": "s1", "act_number": 1, "scene_number": 2
        }))
        .unwrap();
        state.record_draft(SceneDraft::from_prose(&outline, "The lamp turned.\n"));
        state.stage = Stage::Complete;
        PipelineOutcome {
            run_id: uuid::Uuid::nil(),
            created_at: "2026-01-01T00:00:00+00:00".into(),
            elapsed_ms: 1500,
            state,
        }
    }

    #[test]
    fn feedback_lines_cover_flags_and_truncate_reasoning() {
        let lines = feedback_entry_lines(&feedback(3), 200);
        assert_eq!(lines[0], "  Scene s1: composite=0.59 [REVISION NEEDED]");
        assert!(lines[1].contains("style=3/4"));
        assert_eq!(lines[2], "    word_count: OK | tense: consistent | slop: 1.00");
        assert!(lines.contains(&"    structural: opener_monotony".to_string()));
        assert!(lines.contains(&"    vocabulary: low_diversity".to_string()));
        assert!(lines.iter().any(|l| l.ends_with(&format!("{}...\"", "x".repeat(200)))));
        assert!(lines.contains(&"    Assessment: Steady.".to_string()));
        assert!(!lines.iter().any(|l| l.contains("CRITICAL")));
    }

    #[test]
    fn critical_failure_is_called_out() {
        let lines = feedback_entry_lines(&feedback(1), 200);
        assert!(lines.iter().any(|l| l.contains("CRITICAL FAILURE")));
    }

    #[test]
    fn metrics_table_formats_rows() {
        let m = SceneMetrics {
            scene_id: "s1".into(),
            word_count: 812,
            slop_ratio: 0.954,
            mtld: 71.26,
            opener_ratio: 0.25,
            sent_length_cv: 0.48,
        };
        let lines = scene_metrics_lines(&[m]);
        assert_eq!(lines[0], "SCENE METRICS");
        assert_eq!(lines[3], "  s1          812   0.95   71.3    25.0%   0.48");
        assert!(scene_metrics_lines(&[]).is_empty());
    }

    #[test]
    fn manuscript_uses_act_and_scene_headers() {
        let text = render_manuscript(&outcome());
        assert_eq!(text, "\n--- Scene 1.2 ---\n\nThe lamp turned.\n");
    }

    #[test]
    fn slug_folds_punctuation() {
        assert_eq!(title_slug("The Keeper's Light"), "the_keeper_s_light");
        assert_eq!(title_slug("  "), "untitled");
    }

    #[test]
    fn session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let out = outcome();
        let files = write_session(dir.path(), &out).unwrap();
        assert!(files.session.ends_with("untitled_00000000.json"));
        assert_eq!(read_session(&files.session).unwrap(), out);

        let report = std::fs::read_to_string(&files.report).unwrap();
        assert!(report.starts_with("Title: Untitled\n"));
        assert!(report.contains("Pipeline time: 1.5s"));
        assert!(report.contains("MANUSCRIPT"));
    }
}
