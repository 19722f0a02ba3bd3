//! Sentence-level structural signals: opener monotony, length variety,
//! passive voice and dependency distance.

use serde::{Deserialize, Serialize};

use super::tagger::{LinguisticTagger, Pos};
use super::{mean_std, round_to};
use crate::config::ProseStructureConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProseStructureResult {
    pub sentence_count: usize,

    /// Most frequent part of speech among sentence openers.
    pub top_opener_pos: String,
    pub top_opener_ratio: f64,
    pub opener_monotony: bool,

    pub sent_length_mean: f64,
    pub sent_length_std: f64,
    /// Coefficient of variation, std / mean.
    pub sent_length_cv: f64,
    pub length_monotony: bool,

    pub passive_count: usize,
    pub passive_ratio: f64,
    pub passive_heavy: bool,

    pub dep_distance_mean: f64,
    pub dep_distance_std: f64,
    pub structural_monotony: bool,
}

impl ProseStructureResult {
    /// Names of the raised flags, in a stable order.
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.opener_monotony {
            flags.push("opener_monotony");
        }
        if self.length_monotony {
            flags.push("length_monotony");
        }
        if self.passive_heavy {
            flags.push("passive_heavy");
        }
        if self.structural_monotony {
            flags.push("structural_monotony");
        }
        flags
    }

    /// Human-readable lines for the raised flags.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.opener_monotony {
            lines.push(format!(
                "Sentence opener monotony: {:.0}% of sentences start with {}",
                self.top_opener_ratio * 100.0,
                self.top_opener_pos
            ));
        }
        if self.length_monotony {
            lines.push(format!(
                "Sentence length CV: {:.2} — low variety",
                self.sent_length_cv
            ));
        }
        if self.passive_heavy {
            lines.push(format!("Passive voice: {:.0}%", self.passive_ratio * 100.0));
        }
        if self.structural_monotony {
            lines.push(format!(
                "Dependency distance std: {:.2} — structurally simple",
                self.dep_distance_std
            ));
        }
        lines
    }
}

pub fn compute_prose_structure(
    text: &str,
    tagger: Option<&dyn LinguisticTagger>,
    config: &ProseStructureConfig,
) -> ProseStructureResult {
    let Some(tagger) = tagger else {
        tracing::debug!("no tagger available; structure analysis skipped");
        return ProseStructureResult::default();
    };

    let doc = tagger.tag(text);
    let sentence_count = doc.sentences.len();
    if sentence_count == 0 {
        return ProseStructureResult::default();
    }

    // Openers, counted in first-seen order so ties go to the earliest.
    let mut openers: Vec<(Pos, usize)> = Vec::new();
    for sentence in &doc.sentences {
        let first = sentence
            .tokens
            .iter()
            .find(|t| !t.is_space() && !t.is_punct());
        if let Some(token) = first {
            match openers.iter_mut().find(|(p, _)| *p == token.pos) {
                Some((_, n)) => *n += 1,
                None => openers.push((token.pos, 1)),
            }
        }
    }
    let (top_pos, top_count) = openers
        .iter()
        .fold(None, |best: Option<(Pos, usize)>, &(pos, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((pos, n)),
        })
        .map(|(p, n)| (p.as_str().to_string(), n))
        .unwrap_or_default();
    let opener_ratio = top_count as f64 / sentence_count as f64;

    let lengths: Vec<f64> = doc
        .sentences
        .iter()
        .map(|s| {
            s.tokens
                .iter()
                .filter(|t| !t.is_space() && !t.is_punct())
                .count() as f64
        })
        .collect();
    let (len_mean, len_std) = mean_std(&lengths);
    let len_cv = if len_mean > 0.0 { len_std / len_mean } else { 0.0 };

    let passive_count = doc
        .sentences
        .iter()
        .filter(|s| {
            s.tokens
                .iter()
                .any(|t| t.dep == "nsubjpass" || t.dep == "auxpass")
        })
        .count();
    let passive_ratio = passive_count as f64 / sentence_count as f64;

    let distances: Vec<f64> = doc
        .sentences
        .iter()
        .flat_map(|s| s.tokens.iter().enumerate())
        .filter(|(_, t)| t.dep != "ROOT" && !t.is_space())
        .map(|(i, t)| (i as f64 - t.head as f64).abs())
        .collect();
    let (dep_mean, dep_std) = mean_std(&distances);

    ProseStructureResult {
        sentence_count,
        top_opener_pos: top_pos,
        top_opener_ratio: round_to(opener_ratio, 3),
        opener_monotony: opener_ratio > config.opener_monotony_threshold,
        sent_length_mean: round_to(len_mean, 1),
        sent_length_std: round_to(len_std, 1),
        sent_length_cv: round_to(len_cv, 3),
        length_monotony: len_cv < config.length_cv_threshold,
        passive_count,
        passive_ratio: round_to(passive_ratio, 3),
        passive_heavy: passive_ratio > config.passive_ratio_threshold,
        dep_distance_mean: round_to(dep_mean, 2),
        dep_distance_std: round_to(dep_std, 2),
        structural_monotony: dep_std < config.dep_distance_std_threshold,
    }
}
