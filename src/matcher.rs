//! Approximate title search over a title snapshot.
//!
//! A search scores every title once, then walks a `CutoffSchedule`: the first
//! cutoff that leaves at least one title standing wins. A title passes a
//! cutoff when its score is at least the cutoff, so a cutoff of 0 admits
//! every title. An empty result after
//! the last cutoff means "no match", which callers report as an empty, successful
//! search.

use rayon::prelude::*;

use crate::models::{MatchResult, TitleSnapshot};
use crate::scoring::{title_score, QueryForm, DEFAULT_CUTOFF};

pub const DEFAULT_LIMIT: usize = 50;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Tuning knobs for one `best_matches` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub cutoff: u8,
    pub limit: usize,
    pub max_retries: u32,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            limit: DEFAULT_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl MatchOptions {
    pub fn with_cutoff(self, cutoff: u8) -> Self {
        Self { cutoff, ..self }
    }

    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self { max_retries, ..self }
    }
}

// ============================================================================
// Retry State Machine
// ============================================================================

/// Successive cutoffs for one search: the configured cutoff, then halved once
/// per retry. `60` with three retries yields `60, 30, 15, 7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoffSchedule {
    next_cutoff: u8,
    attempt: u32,
    max_retries: u32,
}

impl CutoffSchedule {
    pub fn new(cutoff: u8, max_retries: u32) -> Self {
        Self {
            next_cutoff: cutoff,
            attempt: 0,
            max_retries,
        }
    }

    /// Passes already handed out.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt > self.max_retries
    }
}

impl Iterator for CutoffSchedule {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.is_exhausted() {
            return None;
        }
        let current = self.next_cutoff;
        self.attempt += 1;
        self.next_cutoff = current / 2;
        Some(current)
    }
}

// ============================================================================
// Search
// ============================================================================

/// Best title matches for `query`, ranked by score, then title, then id.
///
/// Every returned match has `score >= c` for the cutoff `c` that produced
/// the first non-empty pass.
pub fn best_matches(query: &str, snapshot: &TitleSnapshot, options: MatchOptions) -> Vec<MatchResult> {
    let form = QueryForm::new(query);
    if form.is_empty() || snapshot.is_empty() || options.limit == 0 {
        return Vec::new();
    }

    // nothing below the last pass's cutoff can ever be returned
    let floor = CutoffSchedule::new(options.cutoff, options.max_retries)
        .last()
        .unwrap_or(options.cutoff);

    let mut scored: Vec<MatchResult> = snapshot
        .titles
        .par_iter()
        .filter_map(|t| {
            let score = title_score(&form, t);
            (score >= floor).then(|| MatchResult {
                title: t.record.title.clone(),
                score,
                id: t.record.id.clone(),
            })
        })
        .collect();
    scored.sort_by(MatchResult::rank_cmp);

    for cutoff in CutoffSchedule::new(options.cutoff, options.max_retries) {
        // sorted by score, so the passing titles form a prefix
        let passing = scored.partition_point(|m| m.score >= cutoff);
        if passing > 0 {
            scored.truncate(passing.min(options.limit));
            tracing::debug!(query, cutoff, matches = scored.len(), "title search matched");
            return scored;
        }
    }

    tracing::debug!(query, "title search found no match");
    Vec::new()
}
