//! Process-wide title index with build-then-swap refresh.
//!
//! The index is owned by the application state and shared by every handler.
//! Readers take an `Arc<TitleSnapshot>` and search it without holding any lock;
//! a refresh fetches the full listing, builds a complete new snapshot, and only
//! then replaces the pointer. A failed refresh leaves the previous snapshot in
//! place (stale but available); a failed first load leaves the index unloaded.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use crate::backend::{parse_title_rows, SparqlBackend};
use crate::errors::{BackendError, IndexError};
use crate::matcher::{best_matches, MatchOptions};
use crate::models::{IndexStatus, MatchResult, TitleRecord, TitleSnapshot};
use crate::queries;

// ============================================================================
// Title Source
// ============================================================================

/// Bulk "list every tune id and title" capability.
#[async_trait]
pub trait TitleSource: Send + Sync {
    async fn fetch_all_titles(&self) -> Result<Vec<TitleRecord>, BackendError>;
}

#[async_trait]
impl<B: SparqlBackend + ?Sized> TitleSource for B {
    async fn fetch_all_titles(&self) -> Result<Vec<TitleRecord>, BackendError> {
        let result = self.select(&queries::all_tune_titles()).await?;
        parse_title_rows(&result)
    }
}

// ============================================================================
// Snapshot Cell
// ============================================================================

/// Holder for an immutable value that is replaced wholesale.
///
/// The lock only guards the pointer swap; nobody holds it while searching.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    current: RwLock<Option<Arc<T>>>,
}

impl<T> SnapshotCell<T> {
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&value));
        value
    }
}

impl<T> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Title Index
// ============================================================================

#[derive(Debug, Default)]
pub struct TitleIndex {
    cell: SnapshotCell<TitleSnapshot>,
    generations: AtomicU64,
    // completed load attempts, successful or not; only changed under load_lock
    attempts: AtomicU64,
    // serializes loads so concurrent refreshes do not race each other
    load_lock: tokio::sync::Mutex<()>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the full listing and install it as the current snapshot.
    /// On failure the index is left exactly as it was.
    pub async fn load<S: TitleSource + ?Sized>(&self, source: &S) -> Result<Arc<TitleSnapshot>, BackendError> {
        let _guard = self.load_lock.lock().await;
        self.load_locked(source).await
    }

    /// Same as `load`; named for call sites that replace an existing index.
    pub async fn refresh<S: TitleSource + ?Sized>(&self, source: &S) -> Result<Arc<TitleSnapshot>, BackendError> {
        self.load(source).await
    }

    /// Load only if no snapshot exists yet. Concurrent callers wait for the
    /// first load instead of issuing their own; if that load fails they
    /// report `NotLoaded` without fetching again.
    pub async fn ensure_loaded<S: TitleSource + ?Sized>(&self, source: &S) -> Result<Arc<TitleSnapshot>, IndexError> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }
        let seen = self.attempts.load(Ordering::SeqCst);
        let _guard = self.load_lock.lock().await;
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }
        if self.attempts.load(Ordering::SeqCst) != seen {
            // a load finished while we waited and left no snapshot
            return Err(IndexError::NotLoaded);
        }
        Ok(self.load_locked(source).await?)
    }

    async fn load_locked<S: TitleSource + ?Sized>(&self, source: &S) -> Result<Arc<TitleSnapshot>, BackendError> {
        let started = Instant::now();

        let fetched = source.fetch_all_titles().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                match self.cell.get() {
                    Some(previous) => tracing::warn!(
                        generation = previous.generation,
                        "title refresh failed, keeping previous index: {}",
                        e
                    ),
                    None => tracing::error!("initial title load failed: {}", e),
                }
                return Err(e);
            }
        };

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.cell.replace(TitleSnapshot::build(records, generation));
        tracing::info!(
            records = snapshot.len(),
            generation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "title index loaded"
        );
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> Option<Arc<TitleSnapshot>> {
        self.cell.get()
    }

    /// Search the current snapshot. Fails rather than matching against nothing
    /// when no listing has ever been loaded.
    pub fn best_matches(&self, query: &str, options: MatchOptions) -> Result<Vec<MatchResult>, IndexError> {
        let snapshot = self.snapshot().ok_or(IndexError::NotLoaded)?;
        Ok(best_matches(query, &snapshot, options))
    }

    pub fn status(&self) -> IndexStatus {
        match self.snapshot() {
            Some(s) => IndexStatus {
                loaded: true,
                records: s.len(),
                generation: s.generation,
                age_seconds: Some(s.loaded_at.elapsed().as_secs()),
            },
            None => IndexStatus {
                loaded: false,
                records: 0,
                generation: 0,
                age_seconds: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    /// Title source handing out scripted listings, or failing on demand.
    struct ScriptedSource {
        listings: Mutex<Vec<Result<Vec<TitleRecord>, BackendError>>>,
        calls: AtomicU64,
    }

    impl ScriptedSource {
        fn new(listings: Vec<Result<Vec<TitleRecord>, BackendError>>) -> Self {
            Self {
                listings: Mutex::new(listings),
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl TitleSource for ScriptedSource {
        async fn fetch_all_titles(&self) -> Result<Vec<TitleRecord>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.listings.lock().unwrap().remove(0)
        }
    }

    fn seasons() -> Vec<TitleRecord> {
        vec![
            TitleRecord::new("1", "Spring"),
            TitleRecord::new("2", "Summer"),
            TitleRecord::new("3", "Canon in D"),
        ]
    }

    #[tokio::test]
    async fn test_search_before_load_fails() {
        let index = TitleIndex::new();
        assert!(matches!(
            index.best_matches("spring", MatchOptions::default()),
            Err(IndexError::NotLoaded)
        ));
        assert!(!index.status().loaded);
    }

    #[tokio::test]
    async fn test_load_then_search() {
        let index = TitleIndex::new();
        let source = ScriptedSource::new(vec![Ok(seasons())]);
        let snapshot = index.load(&source).await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.generation, 1);

        let results = index.best_matches("sprig", MatchOptions::default()).unwrap();
        assert_eq!(results[0].id, "1");
    }

    #[tokio::test]
    async fn test_failed_first_load_stays_unloaded() {
        let index = TitleIndex::new();
        let source = ScriptedSource::new(vec![Err(BackendError::Status(500))]);
        assert!(index.load(&source).await.is_err());
        assert!(index.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let index = TitleIndex::new();
        let source = ScriptedSource::new(vec![
            Ok(seasons()),
            Err(BackendError::Malformed("truncated".into())),
        ]);
        index.load(&source).await.unwrap();
        assert!(index.refresh(&source).await.is_err());

        let status = index.status();
        assert!(status.loaded);
        assert_eq!(status.records, 3);
        assert_eq!(status.generation, 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_whole_snapshot() {
        let index = TitleIndex::new();
        let source = ScriptedSource::new(vec![
            Ok(seasons()),
            Ok(vec![TitleRecord::new("4", "Autumn")]),
        ]);
        let first = index.load(&source).await.unwrap();
        index.refresh(&source).await.unwrap();

        // an old reader keeps its generation intact
        assert_eq!(first.len(), 3);
        let current = index.snapshot().unwrap();
        assert_eq!(current.generation, 2);
        assert_eq!(current.title_of("4"), Some("Autumn"));
        assert_eq!(current.title_of("1"), None);
    }

    #[tokio::test]
    async fn test_ensure_loaded_loads_once() {
        let index = TitleIndex::new();
        let source = ScriptedSource::new(vec![Ok(seasons())]);
        index.ensure_loaded(&source).await.unwrap();
        index.ensure_loaded(&source).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    /// Fails every fetch after a short delay.
    struct SlowFailingSource {
        calls: AtomicU64,
    }

    #[async_trait]
    impl TitleSource for SlowFailingSource {
        async fn fetch_all_titles(&self) -> Result<Vec<TitleRecord>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_ensure_loaded_shares_one_failed_fetch() {
        let index = Arc::new(TitleIndex::new());
        let source = Arc::new(SlowFailingSource {
            calls: AtomicU64::new(0),
        });

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let index = Arc::clone(&index);
                let source = Arc::clone(&source);
                tokio::spawn(async move { index.ensure_loaded(source.as_ref()).await })
            })
            .collect();
        for waiter in waiters {
            assert!(waiter.await.unwrap().is_err());
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(index.snapshot().is_none());

        // a later search starts a fresh attempt
        assert!(index.ensure_loaded(source.as_ref()).await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ensure_loaded_after_failure_can_succeed() {
        let index = TitleIndex::new();
        let source = ScriptedSource::new(vec![Err(BackendError::Status(502)), Ok(seasons())]);
        assert!(index.ensure_loaded(&source).await.is_err());
        let snapshot = index.ensure_loaded(&source).await.unwrap();
        assert_eq!(snapshot.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_searches_never_mix_generations() {
        // every title carries its generation tag, ids are shared between generations
        fn listing(tag: &str) -> Vec<TitleRecord> {
            (0..200)
                .map(|i| TitleRecord::new(format!("{}", i), format!("{} reel {}", tag, i)))
                .collect()
        }

        let index = Arc::new(TitleIndex::new());
        let tags = ["alpha", "bravo", "delta", "gamma", "kappa", "omega"];
        let source = ScriptedSource::new(tags.iter().map(|t| Ok(listing(t))).collect());
        index.load(&source).await.unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    let mut checked = 0usize;
                    while !stop.load(Ordering::SeqCst) || checked == 0 {
                        let results = index.best_matches("reel 17", MatchOptions::default()).unwrap();
                        assert!(!results.is_empty());
                        let tag = results[0].title.split(' ').next().unwrap().to_string();
                        for m in &results {
                            assert!(m.title.starts_with(&tag), "mixed generations: {:?}", results);
                            assert!(m.title.ends_with(&format!(" {}", m.id)), "torn record: {:?}", m);
                        }
                        checked += 1;
                    }
                })
            })
            .collect();

        for _ in 1..tags.len() {
            index.refresh(&source).await.unwrap();
        }
        stop.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(index.status().generation, tags.len() as u64);
    }
}
