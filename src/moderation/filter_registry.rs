// src/moderation/filter_registry.rs - Swappable snapshots of compiled word lists

use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::error::{ModerationError, ModerationResult};
use crate::moderation::normalizer::normalize_word;
use crate::moderation::pattern_compiler::{compile_word_list, CompiledPattern};
use crate::platforms::WordListStore;
use crate::types::WordListKind;

/// One immutable generation of compiled word lists.
///
/// Evaluations hold an `Arc` to the snapshot they started with, so a refresh
/// never changes the patterns underneath a running check.
#[derive(Debug, Default)]
pub struct FilterSnapshot {
    generation: u64,
    general: Vec<CompiledPattern>,
    humanities: Vec<CompiledPattern>,
    whitelist: HashSet<String>,
}

impl FilterSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile raw word lists into a snapshot
    pub fn compile(
        generation: u64,
        general: &[String],
        humanities: &[String],
        whitelist: &[String],
    ) -> Self {
        Self {
            generation,
            general: compile_word_list(general),
            humanities: compile_word_list(humanities),
            whitelist: whitelist
                .iter()
                .map(|entry| normalize_word(entry))
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Patterns compiled from exactly one list
    pub fn patterns(&self, kind: WordListKind) -> &[CompiledPattern] {
        match kind {
            WordListKind::General => &self.general,
            WordListKind::Humanities => &self.humanities,
            WordListKind::Whitelist => &[],
        }
    }

    /// Patterns applied when `active` is the channel's list, in list order
    pub fn active_patterns(&self, active: WordListKind) -> impl Iterator<Item = &CompiledPattern> {
        active
            .matching_lists()
            .iter()
            .flat_map(move |kind| self.patterns(*kind).iter())
    }

    pub fn is_whitelisted(&self, text: &str) -> bool {
        self.whitelist.contains(&normalize_word(text))
    }

    pub fn pattern_count(&self) -> usize {
        self.general.len() + self.humanities.len()
    }

    pub fn whitelist_len(&self) -> usize {
        self.whitelist.len()
    }
}

/// Holds the current [`FilterSnapshot`] and replaces it wholesale on refresh
pub struct FilterRegistry {
    current: RwLock<Arc<FilterSnapshot>>,
    next_generation: AtomicU64,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(FilterSnapshot::empty())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// The snapshot in effect right now
    pub async fn snapshot(&self) -> Arc<FilterSnapshot> {
        self.current.read().await.clone()
    }

    /// Compile the given lists and swap them in
    pub async fn install(
        &self,
        general: &[String],
        humanities: &[String],
        whitelist: &[String],
    ) -> Arc<FilterSnapshot> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(FilterSnapshot::compile(generation, general, humanities, whitelist));

        *self.current.write().await = snapshot.clone();
        info!(
            "Installed filter generation {}: {} general, {} humanities, {} whitelisted",
            generation,
            snapshot.general.len(),
            snapshot.humanities.len(),
            snapshot.whitelist.len()
        );
        snapshot
    }

    /// Pull every list from the store and install them. If any fetch fails
    /// the current snapshot stays in place.
    pub async fn refresh(&self, store: &dyn WordListStore) -> ModerationResult<u64> {
        let general = Self::fetch(store, WordListKind::General).await?;
        let humanities = Self::fetch(store, WordListKind::Humanities).await?;
        let whitelist = Self::fetch(store, WordListKind::Whitelist).await?;

        let snapshot = self.install(&general, &humanities, &whitelist).await;
        Ok(snapshot.generation())
    }

    async fn fetch(store: &dyn WordListStore, kind: WordListKind) -> ModerationResult<Vec<String>> {
        store.get(kind).await.map_err(|e| ModerationError::WordList {
            kind,
            reason: e.to_string(),
        })
    }

    /// Refresh whenever the store reports a change. Failed refreshes keep
    /// the last good snapshot and are retried on the next notification.
    pub fn spawn_refresh_task(self: Arc<Self>, store: Arc<dyn WordListStore>) -> JoinHandle<()> {
        let mut changes = store.subscribe();

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        debug!("Word list change notification: {:?}", change.kind);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Word list notifications lagged by {}, refreshing anyway", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Word list store closed, stopping refresh task");
                        break;
                    }
                }

                if let Err(e) = self.refresh(store.as_ref()).await {
                    error!("Word list refresh failed, keeping previous filters: {}", e);
                }
            }
        })
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::word_lists::InMemoryWordListStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use crate::types::{WordListChange, WordListOp};

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Store whose reads always fail
    struct BrokenStore {
        changes: broadcast::Sender<WordListChange>,
    }

    #[async_trait]
    impl WordListStore for BrokenStore {
        async fn get(&self, _kind: WordListKind) -> Result<Vec<String>> {
            Err(anyhow::anyhow!("database unavailable"))
        }

        async fn update(&self, _kind: WordListKind, _op: WordListOp) -> Result<()> {
            Err(anyhow::anyhow!("database unavailable"))
        }

        fn subscribe(&self) -> broadcast::Receiver<WordListChange> {
            self.changes.subscribe()
        }
    }

    #[test]
    fn test_humanities_snapshot_includes_general() {
        let snapshot = FilterSnapshot::compile(1, &words(&["duck"]), &words(&["goose"]), &[]);
        let general: Vec<&str> = snapshot
            .active_patterns(WordListKind::General)
            .map(|p| p.word())
            .collect();
        let humanities: Vec<&str> = snapshot
            .active_patterns(WordListKind::Humanities)
            .map(|p| p.word())
            .collect();

        assert_eq!(general, vec!["duck"]);
        assert_eq!(humanities, vec!["goose", "duck"]);
        assert_eq!(snapshot.pattern_count(), 2);
    }

    #[test]
    fn test_whitelist_is_normalized() {
        let snapshot = FilterSnapshot::compile(1, &[], &[], &words(&["  Scunthorpe "]));
        assert!(snapshot.is_whitelisted("scunthorpe"));
        assert!(snapshot.is_whitelisted("SCUNTHORPE"));
        assert!(!snapshot.is_whitelisted("scunthorp"));
    }

    #[tokio::test]
    async fn test_refresh_swaps_generation() {
        let store = InMemoryWordListStore::new();
        store.update(WordListKind::General, WordListOp::Add("duck".to_string())).await.unwrap();

        let registry = FilterRegistry::new();
        assert_eq!(registry.snapshot().await.generation(), 0);

        let first = registry.refresh(&store).await.unwrap();
        let held = registry.snapshot().await;
        assert_eq!(held.pattern_count(), 1);

        store.update(WordListKind::General, WordListOp::Add("goose".to_string())).await.unwrap();
        let second = registry.refresh(&store).await.unwrap();

        assert!(second > first);
        assert_eq!(registry.snapshot().await.pattern_count(), 2);
        // An evaluation holding the old snapshot keeps seeing it unchanged
        assert_eq!(held.pattern_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_from_seeded_store() {
        let store = InMemoryWordListStore::with_lists(
            words(&["duck", "Duck", "bad word"]),
            words(&["goose"]),
            words(&["Scunthorpe"]),
        );

        let registry = FilterRegistry::new();
        registry.refresh(&store).await.unwrap();

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.patterns(WordListKind::General).len(), 2);
        assert_eq!(snapshot.patterns(WordListKind::Humanities).len(), 1);
        assert_eq!(snapshot.active_patterns(WordListKind::General).count(), 2);
        assert_eq!(snapshot.active_patterns(WordListKind::Humanities).count(), 3);
        assert_eq!(snapshot.whitelist_len(), 1);
        assert!(snapshot.is_whitelisted("scunthorpe"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_known_good() {
        let registry = FilterRegistry::new();
        registry.install(&words(&["duck"]), &[], &[]).await;

        let (changes, _) = broadcast::channel(4);
        let broken = BrokenStore { changes };
        let result = registry.refresh(&broken).await;

        assert!(matches!(result, Err(ModerationError::WordList { kind: WordListKind::General, .. })));
        assert_eq!(registry.snapshot().await.pattern_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_task_follows_store_changes() {
        let store = Arc::new(InMemoryWordListStore::new());
        let registry = Arc::new(FilterRegistry::new());
        let handle = registry.clone().spawn_refresh_task(store.clone());

        store.update(WordListKind::General, WordListOp::Add("duck".to_string())).await.unwrap();

        let mut refreshed = false;
        for _ in 0..50 {
            if registry.snapshot().await.pattern_count() == 1 {
                refreshed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(refreshed, "registry never picked up the new word");
        handle.abort();
    }
}
