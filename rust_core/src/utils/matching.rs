//! Player-name matching between odds feeds and stats rosters.
//!
//! Books and the stats APIs disagree on accents, suffixes and punctuation
//! ("Ronald Acuña Jr." vs "Ronald Acuna"). Matching is exact on the
//! normalized form first, then fuzzy within the same surname.

use std::collections::HashMap;
use strsim::jaro_winkler;

/// Minimum Jaro-Winkler similarity for a fuzzy match
pub const FUZZY_THRESHOLD: f64 = 0.93;

const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

/// Match confidence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchConfidence {
    None = 0,
    Fuzzy = 1,
    Exact = 2,
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Normalize a player name for comparison.
///
/// Lowercases, folds accents, drops generational suffixes and punctuation,
/// and collapses whitespace.
pub fn normalize_player_name(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    folded
        .split_whitespace()
        .filter(|w| !SUFFIXES.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn surname(normalized: &str) -> &str {
    normalized.rsplit(' ').next().unwrap_or(normalized)
}

/// Lookup of roster players by normalized name
#[derive(Debug, Clone, Default)]
pub struct PlayerIndex<T> {
    exact: HashMap<String, T>,
    by_surname: HashMap<String, Vec<(String, T)>>,
}

impl<T: Clone> PlayerIndex<T> {
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            by_surname: HashMap::new(),
        }
    }

    /// Insert or replace the value for a player
    pub fn insert(&mut self, name: &str, value: T) {
        let normalized = normalize_player_name(name);
        if normalized.is_empty() {
            return;
        }
        let bucket = self
            .by_surname
            .entry(surname(&normalized).to_string())
            .or_default();
        match bucket.iter_mut().find(|(n, _)| *n == normalized) {
            Some(slot) => slot.1 = value.clone(),
            None => bucket.push((normalized.clone(), value.clone())),
        }
        self.exact.insert(normalized, value);
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Find a player, returning the value and how confident the match is
    pub fn find(&self, name: &str) -> (Option<&T>, MatchConfidence) {
        let normalized = normalize_player_name(name);
        if let Some(v) = self.exact.get(&normalized) {
            return (Some(v), MatchConfidence::Exact);
        }

        let Some(candidates) = self.by_surname.get(surname(&normalized)) else {
            return (None, MatchConfidence::None);
        };

        candidates
            .iter()
            .map(|(cand, v)| (jaro_winkler(&normalized, cand), v))
            .filter(|(score, _)| *score >= FUZZY_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, v)| (Some(v), MatchConfidence::Fuzzy))
            .unwrap_or((None, MatchConfidence::None))
    }
}
