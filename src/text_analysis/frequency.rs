//! English word frequency on the Zipf scale.
//!
//! Zipf = log10(occurrences per billion words). Everyday function words sit
//! around 6–7, ordinary vocabulary around 4–5, rare words below 3.

use std::collections::HashMap;

use once_cell::sync::Lazy;

const BUNDLED_TABLE: &str = include_str!("../../data/zipf_en.tsv");

/// Zipf value assumed for words absent from the table.
pub const DEFAULT_UNKNOWN_ZIPF: f64 = 3.0;

static BUNDLED: Lazy<FrequencyTable> = Lazy::new(|| FrequencyTable::parse(BUNDLED_TABLE));

#[derive(Debug, Clone)]
pub struct FrequencyTable {
    zipf: HashMap<String, f64>,
    unknown: f64,
}

impl FrequencyTable {
    pub fn bundled() -> &'static FrequencyTable {
        &BUNDLED
    }

    /// Parse `word<TAB>zipf` lines. Blank lines, `#` comments and lines that
    /// fail to parse are skipped.
    pub fn parse(raw: &str) -> Self {
        let zipf = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| {
                let mut parts = l.split_whitespace();
                let word = parts.next()?;
                let value = parts.next()?.parse::<f64>().ok()?;
                Some((word.to_lowercase(), value))
            })
            .collect();
        Self {
            zipf,
            unknown: DEFAULT_UNKNOWN_ZIPF,
        }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            zipf: pairs.into_iter().map(|(w, z)| (w.into(), z)).collect(),
            unknown: DEFAULT_UNKNOWN_ZIPF,
        }
    }

    pub fn with_unknown(mut self, unknown: f64) -> Self {
        self.unknown = unknown;
        self
    }

    /// Zipf frequency of a lowercase word; table misses get the unknown value.
    pub fn zipf(&self, word: &str) -> f64 {
        self.zipf.get(word).copied().unwrap_or(self.unknown)
    }

    pub fn len(&self) -> usize {
        self.zipf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zipf.is_empty()
    }
}
