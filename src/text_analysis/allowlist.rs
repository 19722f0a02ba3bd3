//! Story-specific terms exempt from slop detection.

use std::collections::HashSet;

use crate::story::{CharacterRoster, StoryBrief, WorldContext};

/// Lowercased character and location names (whole, plus parts longer than two
/// characters) and theme words longer than three characters. Missing
/// artifacts contribute nothing.
pub fn build_story_allowlist(
    roster: Option<&CharacterRoster>,
    world: Option<&WorldContext>,
    brief: Option<&StoryBrief>,
) -> HashSet<String> {
    let mut terms = HashSet::new();

    let names = roster
        .into_iter()
        .flat_map(|r| r.characters.iter().map(|c| c.name.as_str()))
        .chain(
            world
                .into_iter()
                .flat_map(|w| w.locations.iter().map(|l| l.name.as_str())),
        );
    for name in names {
        add_name(&mut terms, name);
    }

    for theme in brief.into_iter().flat_map(|b| b.themes.iter()) {
        for word in theme.split_whitespace() {
            if word.chars().count() > 3 {
                terms.insert(word.to_lowercase());
            }
        }
    }

    terms
}

fn add_name(terms: &mut HashSet<String>, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    terms.insert(name.to_lowercase());
    for part in name.split_whitespace() {
        if part.chars().count() > 2 {
            terms.insert(part.to_lowercase());
        }
    }
}
