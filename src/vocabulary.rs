//! Closed enumerations behind the advanced search filters.
//!
//! Corpora, keys, time signatures and tune types are listed by the backend.
//! Filter values are checked against them before a query is rendered.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::backend::{parse_column, SparqlBackend};
use crate::errors::{BackendError, QueryError};
use crate::models::FilterCategory;
use crate::queries::{category_list, AdvancedSearch};
use crate::safety::validate_enumerated;
use crate::title_index::SnapshotCell;

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    members: FxHashMap<FilterCategory, FxHashSet<String>>,
}

impl Vocabulary {
    pub fn from_lists<I, V>(lists: I) -> Self
    where
        I: IntoIterator<Item = (FilterCategory, V)>,
        V: IntoIterator<Item = String>,
    {
        let mut members: FxHashMap<FilterCategory, FxHashSet<String>> = FxHashMap::default();
        for (category, values) in lists {
            members.entry(category).or_default().extend(values);
        }
        Self { members }
    }

    /// Run one listing query per category. Any failure fails the whole fetch.
    pub async fn fetch<B: SparqlBackend + ?Sized>(backend: &B) -> Result<Self, BackendError> {
        let mut lists = Vec::with_capacity(FilterCategory::ALL.len());
        for category in FilterCategory::ALL {
            let result = backend.select(&category_list(category)).await?;
            lists.push((category, parse_column(&result, category.variable())?));
        }
        Ok(Self::from_lists(lists))
    }

    pub fn len(&self, category: FilterCategory) -> usize {
        self.members.get(&category).map_or(0, FxHashSet::len)
    }

    pub fn contains(&self, category: FilterCategory, value: &str) -> bool {
        self.members.get(&category).is_some_and(|m| m.contains(value))
    }

    /// Every filter value of `search` must be a known member of its category.
    pub fn check(&self, search: &AdvancedSearch) -> Result<(), QueryError> {
        let empty = FxHashSet::default();
        for category in FilterCategory::ALL {
            let known = self.members.get(&category).unwrap_or(&empty);
            for value in search.values(category) {
                validate_enumerated(category.param_name(), value, known)?;
            }
        }
        Ok(())
    }
}

/// Shared, refreshable vocabulary.
#[derive(Debug, Default)]
pub struct VocabularyStore {
    cell: SnapshotCell<Vocabulary>,
}

impl VocabularyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and install a new vocabulary. A failure keeps the previous one.
    pub async fn load<B: SparqlBackend + ?Sized>(&self, backend: &B) -> Result<Arc<Vocabulary>, BackendError> {
        match Vocabulary::fetch(backend).await {
            Ok(vocabulary) => {
                tracing::info!(
                    corpora = vocabulary.len(FilterCategory::Corpus),
                    tune_types = vocabulary.len(FilterCategory::TuneType),
                    keys = vocabulary.len(FilterCategory::Key),
                    time_signatures = vocabulary.len(FilterCategory::TimeSignature),
                    "filter vocabulary loaded"
                );
                Ok(self.cell.replace(vocabulary))
            }
            Err(e) => {
                tracing::warn!("filter vocabulary load failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn get(&self) -> Option<Arc<Vocabulary>> {
        self.cell.get()
    }

    /// Validate against the loaded vocabulary. Before the first load only
    /// escaping protects the filter values.
    pub fn check(&self, search: &AdvancedSearch) -> Result<(), QueryError> {
        match self.get() {
            Some(vocabulary) => vocabulary.check(search),
            None => {
                tracing::debug!("filter vocabulary not loaded, skipping enumeration check");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    fn listing(var: &str, values: &[&str]) -> Value {
        let rows: Vec<Value> = values.iter().map(|v| json!({ var: { "value": v } })).collect();
        json!({ "head": { "vars": [var] }, "results": { "bindings": rows } })
    }

    /// Answers each listing query by the variable it selects.
    struct ListingBackend {
        fail: bool,
    }

    #[async_trait]
    impl SparqlBackend for ListingBackend {
        async fn select(&self, query: &str) -> Result<Value, BackendError> {
            if self.fail {
                return Err(BackendError::Status(503));
            }
            Ok(if query.contains("?corpus") {
                listing("corpus", &["thesession", "oneills"])
            } else if query.contains("?tuneType") {
                listing("tuneType", &["Jig", "Reel"])
            } else if query.contains("?signature") {
                listing("signature", &["6/8", "4/4"])
            } else {
                listing("key", &["Dmaj", "Gmaj", "Ador"])
            })
        }
    }

    fn search_with(category: FilterCategory, raw: &str) -> AdvancedSearch {
        AdvancedSearch::new(None, None).with_filter(category, Some(raw))
    }

    #[tokio::test]
    async fn test_fetch_collects_every_category() {
        let vocabulary = Vocabulary::fetch(&ListingBackend { fail: false }).await.unwrap();
        assert_eq!(vocabulary.len(FilterCategory::Corpus), 2);
        assert_eq!(vocabulary.len(FilterCategory::Key), 3);
        assert!(vocabulary.contains(FilterCategory::TimeSignature, "6/8"));
        assert!(!vocabulary.contains(FilterCategory::TuneType, "Polka"));
    }

    #[test]
    fn test_check_accepts_known_and_rejects_unknown() {
        let vocabulary = Vocabulary::from_lists(vec![
            (FilterCategory::TuneType, vec!["Jig".to_string(), "Reel".to_string()]),
            (FilterCategory::Key, vec!["Dmaj".to_string()]),
        ]);
        assert!(vocabulary.check(&search_with(FilterCategory::TuneType, "Jig,Reel")).is_ok());
        assert!(vocabulary.check(&AdvancedSearch::default()).is_ok());

        let err = vocabulary
            .check(&search_with(FilterCategory::TuneType, "Jig,Polka"))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidParameter { ref param, .. } if param == "tuneType"));

        // a category with no known members rejects everything
        assert!(vocabulary.check(&search_with(FilterCategory::Corpus, "thesession")).is_err());
    }

    #[tokio::test]
    async fn test_store_skips_check_until_loaded() {
        let store = VocabularyStore::new();
        let search = search_with(FilterCategory::Key, "H#maj");
        assert!(store.check(&search).is_ok());

        store.load(&ListingBackend { fail: false }).await.unwrap();
        assert!(store.check(&search).is_err());
        assert!(store.check(&search_with(FilterCategory::Key, "Ador")).is_ok());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_vocabulary() {
        let store = VocabularyStore::new();
        store.load(&ListingBackend { fail: false }).await.unwrap();
        assert!(store.load(&ListingBackend { fail: true }).await.is_err());
        assert_eq!(store.get().unwrap().len(FilterCategory::TuneType), 2);
    }
}
