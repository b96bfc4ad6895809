//! Core data models for title matching and query building.
//!
//! This module contains the records held by the title index, the transient
//! match results handed to the query builders, and the filter categories of
//! the advanced search.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;

use crate::normalize::{normalize_title, sorted_unique_tokens};

// ============================================================================
// Title Index Models
// ============================================================================

/// One row of the bulk title listing. `id` is unique, `title` is not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub id: String,
    pub title: String,
}

impl TitleRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Title record with its normalized forms precomputed at load time,
/// so a search pass never re-normalizes the index.
#[derive(Clone, Debug)]
pub struct IndexedTitle {
    pub record: TitleRecord,
    pub norm: String,
    pub sorted_tokens: Vec<String>,
}

impl IndexedTitle {
    pub fn new(record: TitleRecord) -> Self {
        let norm = normalize_title(&record.title);
        let sorted_tokens = sorted_unique_tokens(&norm);
        Self {
            record,
            norm,
            sorted_tokens,
        }
    }
}

/// An immutable, fully built generation of the title index.
///
/// Readers hold an `Arc<TitleSnapshot>`; a refresh builds a new snapshot and
/// swaps the pointer, so a reader only ever sees one generation.
#[derive(Debug)]
pub struct TitleSnapshot {
    pub titles: Vec<IndexedTitle>,
    pub generation: u64,
    pub loaded_at: Instant,
}

impl TitleSnapshot {
    /// Build a snapshot from a full listing. Records are ordered by id and
    /// duplicate ids keep their first title.
    pub fn build(mut records: Vec<TitleRecord>, generation: u64) -> Self {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records.dedup_by(|later, earlier| later.id == earlier.id);
        Self {
            titles: records.into_iter().map(IndexedTitle::new).collect(),
            generation,
            loaded_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn title_of(&self, id: &str) -> Option<&str> {
        self.titles
            .binary_search_by(|t| t.record.id.as_str().cmp(id))
            .ok()
            .map(|i| self.titles[i].record.title.as_str())
    }
}

// ============================================================================
// Match Models
// ============================================================================

/// A fuzzy title match. Produced per search call, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub title: String,
    pub score: u8,
    pub id: String,
}

impl MatchResult {
    /// Output order: score descending, then title, then id.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| self.id.cmp(&other.id))
    }
}

// ============================================================================
// Advanced Search Filters
// ============================================================================

/// Closed enumerations the advanced search can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterCategory {
    Corpus,
    TuneType,
    Key,
    TimeSignature,
}

impl FilterCategory {
    pub const ALL: [FilterCategory; 4] = [
        FilterCategory::Corpus,
        FilterCategory::TuneType,
        FilterCategory::Key,
        FilterCategory::TimeSignature,
    ];

    /// Name of the HTTP query parameter carrying this filter.
    pub fn param_name(self) -> &'static str {
        match self {
            FilterCategory::Corpus => "corpus",
            FilterCategory::TuneType => "tuneType",
            FilterCategory::Key => "key",
            FilterCategory::TimeSignature => "timeSignature",
        }
    }

    /// SPARQL variable bound to this attribute in result rows.
    pub fn variable(self) -> &'static str {
        match self {
            FilterCategory::Corpus => "corpus",
            FilterCategory::TuneType => "tuneType",
            FilterCategory::Key => "key",
            FilterCategory::TimeSignature => "signature",
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Index status reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub loaded: bool,
    pub records: usize,
    pub generation: u64,
    pub age_seconds: Option<u64>,
}
