//! Fuzzy title similarity.
//!
//! This module contains the scoring functions used by the matcher:
//! - Character-level ratio (normalized Levenshtein)
//! - Token sort ratio (word order ignored)
//! - Token set ratio (shared words vs. leftovers)
//! - The combined 0-100 title score
//!
//! Every function takes strings already passed through `normalize_title`.

use strsim::normalized_levenshtein;

use crate::models::IndexedTitle;
use crate::normalize::{normalize_title, sorted_unique_tokens};

// ============================================================================
// Score Thresholds
// ============================================================================

/// Default minimum score for a title to count as a match.
pub const DEFAULT_CUTOFF: u8 = 60;

/// Raw similarities at or below this map to a score of 0. Unrelated strings
/// of similar length share a few letters by chance; the floor keeps them
/// out of every retry pass with a cutoff above 0.
pub const NOISE_FLOOR: f64 = 0.4;

pub const MAX_SCORE: u8 = 100;

// ============================================================================
// Query Form
// ============================================================================

/// A search query normalized once per search, compared against every title.
#[derive(Debug, Clone)]
pub struct QueryForm {
    pub norm: String,
    pub sorted_tokens: Vec<String>,
}

impl QueryForm {
    pub fn new(query: &str) -> Self {
        let norm = normalize_title(query);
        let sorted_tokens = sorted_unique_tokens(&norm);
        Self {
            norm,
            sorted_tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_tokens.is_empty()
    }
}

// ============================================================================
// Ratio Family
// ============================================================================

/// Character-level similarity in [0.0, 1.0].
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

/// Similarity of the two token lists after sorting, so
/// "rakes of mallow" and "mallow of rakes" compare equal.
pub fn token_sort_ratio(a_sorted: &[String], b_sorted: &[String]) -> f64 {
    ratio(&a_sorted.join(" "), &b_sorted.join(" "))
}

/// Token-set similarity. Inputs must be sorted and deduplicated.
///
/// When every word of one side appears in the other the result is 1.0,
/// so a partial title such as "canon" fully matches "canon in d".
/// Otherwise the shared words are compared against each side's full set.
pub fn token_set_ratio(a_sorted: &[String], b_sorted: &[String]) -> f64 {
    let mut shared: Vec<&str> = Vec::new();
    let mut only_a: Vec<&str> = Vec::new();
    let mut only_b: Vec<&str> = Vec::new();

    // Merge walk over the two sorted lists
    let (mut i, mut j) = (0, 0);
    while i < a_sorted.len() && j < b_sorted.len() {
        match a_sorted[i].cmp(&b_sorted[j]) {
            std::cmp::Ordering::Equal => {
                shared.push(&a_sorted[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                only_a.push(&a_sorted[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                only_b.push(&b_sorted[j]);
                j += 1;
            }
        }
    }
    only_a.extend(a_sorted[i..].iter().map(String::as_str));
    only_b.extend(b_sorted[j..].iter().map(String::as_str));

    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 1.0;
    }

    let sect = shared.join(" ");
    let with_a = join_nonempty(&sect, &only_a.join(" "));
    let with_b = join_nonempty(&sect, &only_b.join(" "));

    let mut best = ratio(&with_a, &with_b);
    if !sect.is_empty() {
        best = best.max(ratio(&sect, &with_a)).max(ratio(&sect, &with_b));
    }
    best
}

fn join_nonempty(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{} {}", left, right),
    }
}

// ============================================================================
// Combined Score
// ============================================================================

/// Rescale a raw similarity onto 0-100, flattening everything under the floor.
pub fn to_score(raw: f64) -> u8 {
    let scaled = ((raw - NOISE_FLOOR) / (1.0 - NOISE_FLOOR)).clamp(0.0, 1.0);
    (scaled * f64::from(MAX_SCORE)).round() as u8
}

/// Score one indexed title against a query: the best of the three ratios,
/// rescaled by `to_score`. Empty inputs score 0.
pub fn title_score(query: &QueryForm, title: &IndexedTitle) -> u8 {
    if query.is_empty() || title.sorted_tokens.is_empty() {
        return 0;
    }
    if query.norm == title.norm {
        return MAX_SCORE;
    }

    let raw = ratio(&query.norm, &title.norm)
        .max(token_sort_ratio(&query.sorted_tokens, &title.sorted_tokens))
        .max(token_set_ratio(&query.sorted_tokens, &title.sorted_tokens));
    to_score(raw)
}

/// Score a raw query against a raw title.
pub fn similarity(query: &str, title: &str) -> u8 {
    let indexed = IndexedTitle::new(crate::models::TitleRecord::new("", title));
    title_score(&QueryForm::new(query), &indexed)
}
