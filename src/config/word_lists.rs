// src/config/word_lists.rs - In-memory and YAML-file backed word list stores

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Duration;

use crate::moderation::normalizer::normalize_word;
use crate::platforms::WordListStore;
use crate::types::{WordListChange, WordListKind, WordListOp};

/// On-disk layout of `wordlists.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WordListFile {
    pub general: Vec<String>,
    pub humanities: Vec<String>,
    pub whitelist: Vec<String>,
}

impl WordListFile {
    pub fn list(&self, kind: WordListKind) -> &Vec<String> {
        match kind {
            WordListKind::General => &self.general,
            WordListKind::Humanities => &self.humanities,
            WordListKind::Whitelist => &self.whitelist,
        }
    }

    pub fn list_mut(&mut self, kind: WordListKind) -> &mut Vec<String> {
        match kind {
            WordListKind::General => &mut self.general,
            WordListKind::Humanities => &mut self.humanities,
            WordListKind::Whitelist => &mut self.whitelist,
        }
    }
}

/// Apply an add/remove to a list. Entries compare case-insensitively with
/// collapsed whitespace; insertion order is kept for display.
pub fn apply_op(list: &mut Vec<String>, op: &WordListOp) -> Result<()> {
    match op {
        WordListOp::Add(word) => {
            let word = normalize_word(word);
            if word.is_empty() {
                return Err(anyhow::anyhow!("Cannot add an empty word"));
            }
            if list.iter().any(|existing| normalize_word(existing) == word) {
                return Err(anyhow::anyhow!("'{}' is already in the list", word));
            }
            list.push(word);
            Ok(())
        }
        WordListOp::Remove(word) => {
            let word = normalize_word(word);
            match list.iter().position(|existing| normalize_word(existing) == word) {
                Some(index) => {
                    list.remove(index);
                    Ok(())
                }
                None => Err(anyhow::anyhow!("'{}' is not in the list", word)),
            }
        }
    }
}

/// Word lists held in memory; useful for tests and embedding
pub struct InMemoryWordListStore {
    lists: RwLock<HashMap<WordListKind, Vec<String>>>,
    change_notifier: broadcast::Sender<WordListChange>,
}

impl InMemoryWordListStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            lists: RwLock::new(HashMap::new()),
            change_notifier: tx,
        }
    }

    pub fn with_lists(general: Vec<String>, humanities: Vec<String>, whitelist: Vec<String>) -> Self {
        let mut lists = HashMap::new();
        lists.insert(WordListKind::General, general);
        lists.insert(WordListKind::Humanities, humanities);
        lists.insert(WordListKind::Whitelist, whitelist);

        Self {
            lists: RwLock::new(lists),
            ..Self::new()
        }
    }
}

impl Default for InMemoryWordListStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WordListStore for InMemoryWordListStore {
    async fn get(&self, kind: WordListKind) -> Result<Vec<String>> {
        Ok(self.lists.read().await.get(&kind).cloned().unwrap_or_default())
    }

    async fn update(&self, kind: WordListKind, op: WordListOp) -> Result<()> {
        {
            let mut lists = self.lists.write().await;
            apply_op(lists.entry(kind).or_default(), &op)?;
        }
        debug!("Updated {} word list: {:?}", kind, op);
        let _ = self.change_notifier.send(WordListChange { kind: Some(kind) });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WordListChange> {
        self.change_notifier.subscribe()
    }
}

/// Word lists persisted in a YAML file and re-read on every `get`, with an
/// optional file watcher that notifies subscribers of external edits
#[derive(Clone)]
pub struct YamlWordListStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    watchers: Arc<Mutex<Vec<RecommendedWatcher>>>,
    change_notifier: broadcast::Sender<WordListChange>,
    last_reload: Arc<RwLock<std::time::Instant>>,
}

impl YamlWordListStore {
    /// Open the store, creating an empty word list file if there is none
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, _) = broadcast::channel(100);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            let content = serde_yaml::to_string(&WordListFile::default())?;
            fs::write(&path, content).await?;
            info!("Created empty word list file: {}", path.display());
        }

        Ok(Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
            watchers: Arc::new(Mutex::new(Vec::new())),
            change_notifier: tx,
            last_reload: Arc::new(RwLock::new(std::time::Instant::now())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<WordListFile> {
        let content = fs::read_to_string(&self.path).await?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Watch the word list file and notify subscribers when it is modified
    pub async fn watch(&self) -> Result<()> {
        let watch_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|name| name.to_os_string());
        let change_notifier = self.change_notifier.clone();
        let last_reload = self.last_reload.clone();

        let (tx, mut rx) = tokio::sync::mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.blocking_send(event) {
                    error!("Failed to send word list watch event: {}", e);
                }
            }
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        // Store watcher to prevent it from being dropped
        self.watchers.lock().await.push(watcher);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }

                let touches_word_lists = event
                    .paths
                    .iter()
                    .any(|path| path.file_name().map(|name| name.to_os_string()) == file_name);
                if !touches_word_lists {
                    continue;
                }

                // Debounce rapid file changes
                {
                    let now = std::time::Instant::now();
                    let last = *last_reload.read().await;
                    if now.duration_since(last) < Duration::from_millis(500) {
                        continue;
                    }
                    *last_reload.write().await = now;
                }

                info!("Word list file changed, notifying filters");
                let _ = change_notifier.send(WordListChange { kind: None });
            }
        });

        info!("Watching word list file {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl WordListStore for YamlWordListStore {
    async fn get(&self, kind: WordListKind) -> Result<Vec<String>> {
        Ok(self.read_file().await?.list(kind).clone())
    }

    async fn update(&self, kind: WordListKind, op: WordListOp) -> Result<()> {
        {
            let _guard = self.write_lock.lock().await;
            let mut file = self.read_file().await?;
            apply_op(file.list_mut(kind), &op)?;
            fs::write(&self.path, serde_yaml::to_string(&file)?).await?;
        }

        info!("Updated {} word list in {}: {:?}", kind, self.path.display(), op);
        let _ = self.change_notifier.send(WordListChange { kind: Some(kind) });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WordListChange> {
        self.change_notifier.subscribe()
    }
}
