//! Approximate text search.
//!
//! The view pipeline only sees [`FuzzySearch::search`]; the scoring function
//! behind it is a [`Similarity`] and can be swapped through config.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Normalized distance between a pattern and a text.
///
/// 0.0 is a perfect match, 1.0 is no resemblance at all.
pub trait Similarity: Send + Sync {
    fn distance(&self, text: &str, pattern: &str) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    #[default]
    EditDistance,
    Trigram,
}

impl SearchAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchAlgorithm::EditDistance => "edit_distance",
            SearchAlgorithm::Trigram => "trigram",
        }
    }
}

impl fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchAlgorithm {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "edit_distance" => Ok(SearchAlgorithm::EditDistance),
            "trigram" => Ok(SearchAlgorithm::Trigram),
            other => Err(Error::InvalidArgument(format!(
                "unknown search algorithm '{other}' (expected edit_distance|trigram)"
            ))),
        }
    }
}

/// Best edit distance of the pattern against any substring of the text.
///
/// Insertions, deletions, substitutions and adjacent transpositions each cost
/// one edit. The count is divided by the pattern length.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditDistance;

impl Similarity for EditDistance {
    fn distance(&self, text: &str, pattern: &str) -> f64 {
        let pattern: Vec<char> = pattern.chars().collect();
        if pattern.is_empty() {
            return 0.0;
        }
        let text: Vec<char> = text.chars().collect();
        let edits = substring_edits(&text, &pattern);
        (edits as f64 / pattern.len() as f64).min(1.0)
    }
}

/// Optimal-string-alignment distance with a free start and end in `text`.
fn substring_edits(text: &[char], pattern: &[char]) -> usize {
    let n = text.len();
    // Row i holds the cost of matching pattern[..i] ending at each text offset.
    let mut before_prev: Vec<usize> = vec![0; n + 1];
    let mut prev: Vec<usize> = vec![0; n + 1];
    let mut current: Vec<usize> = vec![0; n + 1];

    for i in 1..=pattern.len() {
        current[0] = i;
        for j in 1..=n {
            let substitution = if pattern[i - 1] == text[j - 1] { 0 } else { 1 };
            let mut best = (prev[j] + 1)
                .min(current[j - 1] + 1)
                .min(prev[j - 1] + substitution);
            if i > 1 && j > 1 && pattern[i - 1] == text[j - 2] && pattern[i - 2] == text[j - 1] {
                best = best.min(before_prev[j - 2] + 1);
            }
            current[j] = best;
        }
        std::mem::swap(&mut before_prev, &mut prev);
        std::mem::swap(&mut prev, &mut current);
    }

    prev.into_iter().min().unwrap_or(pattern.len())
}

/// Share of the pattern's character trigrams that also occur in the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trigram;

impl Similarity for Trigram {
    fn distance(&self, text: &str, pattern: &str) -> f64 {
        let pattern_grams = trigrams(pattern);
        if pattern_grams.is_empty() {
            // Too short for trigrams: fall back to containment.
            return if text.contains(pattern) { 0.0 } else { 1.0 };
        }
        let text_grams = trigrams(text);
        let shared = pattern_grams.intersection(&text_grams).count();
        1.0 - shared as f64 / pattern_grams.len() as f64
    }
}

fn trigrams(value: &str) -> HashSet<[char; 3]> {
    let chars: Vec<char> = value.chars().collect();
    chars
        .windows(3)
        .map(|window| [window[0], window[1], window[2]])
        .collect()
}

/// Threshold-based approximate filter over arbitrary items.
pub struct FuzzySearch {
    similarity: Box<dyn Similarity>,
    threshold: f64,
}

impl fmt::Debug for FuzzySearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuzzySearch")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl Default for FuzzySearch {
    fn default() -> Self {
        Self::new(Box::new(EditDistance), DEFAULT_THRESHOLD)
    }
}

impl FuzzySearch {
    pub fn new(similarity: Box<dyn Similarity>, threshold: f64) -> Self {
        Self {
            similarity,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn with_algorithm(algorithm: SearchAlgorithm, threshold: f64) -> Self {
        let similarity: Box<dyn Similarity> = match algorithm {
            SearchAlgorithm::EditDistance => Box::new(EditDistance),
            SearchAlgorithm::Trigram => Box::new(Trigram),
        };
        Self::new(similarity, threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Lowest distance of `query` against any of the keys, if within threshold.
    pub fn score(&self, keys: &[&str], query: &str) -> Option<f64> {
        let query = normalize(query);
        if query.is_empty() {
            return Some(0.0);
        }
        keys.iter()
            .map(|key| self.similarity.distance(&normalize(key), &query))
            .filter(|distance| *distance <= self.threshold)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Keep the items whose keys approximately match `query`, in input order.
    pub fn search<T, F>(&self, items: Vec<T>, query: &str, keys: F) -> Vec<T>
    where
        F: Fn(&T) -> Vec<&str>,
    {
        if query.trim().is_empty() {
            return items;
        }
        items
            .into_iter()
            .filter(|item| self.score(&keys(item), query).is_some())
            .collect()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
