// src/moderation/spam_tracker.rs - Sliding message windows and per-message spam thresholds

use log::{debug, info, warn};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::config::SpamThresholds;
use crate::moderation::normalizer::CUSTOM_EMOJI;
use crate::types::{DeleteTarget, MessageRef};

/// What the windows remember about a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub author_id: String,
    pub channel_id: String,
    pub content: String,
}

impl From<&MessageRef> for MessageRecord {
    fn from(message: &MessageRef) -> Self {
        Self {
            id: message.id.clone(),
            author_id: message.author_id.clone(),
            channel_id: message.channel_id.clone(),
            content: message.content.clone(),
        }
    }
}

/// Bounded FIFO of recent messages for one author or one channel
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    records: VecDeque<MessageRecord>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Replace the record with the same id in place, or append and evict
    pub fn upsert(&mut self, record: MessageRecord) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.id == record.id) {
            existing.content = record.content;
            return;
        }

        self.records.push_back(record);
        self.trim();
    }

    /// Drop the oldest records until the window is within its cap.
    /// Returns how many were dropped.
    pub fn trim(&mut self) -> usize {
        let excess = self.records.len().saturating_sub(self.capacity);
        self.records.drain(..excess);
        excess
    }

    /// The `run` most recent records when they all carry `content`
    pub fn repeated_run(&self, content: &str, run: usize) -> Option<Vec<MessageRecord>> {
        if run == 0 || self.records.len() < run || content.trim().is_empty() {
            return None;
        }

        let recent = self.records.range(self.records.len() - run..);
        if recent.clone().all(|r| r.content == content) {
            Some(recent.cloned().collect())
        } else {
            None
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.records.retain(|r| r.id != id);
    }
}

#[derive(Debug, Default)]
struct Windows {
    authors: HashMap<String, HistoryWindow>,
    channels: HashMap<String, HistoryWindow>,
}

/// Author and channel windows plus the stateless emoji and mention checks
pub struct SpamTracker {
    thresholds: SpamThresholds,
    windows: Mutex<Windows>,
}

impl SpamTracker {
    pub fn new(thresholds: SpamThresholds) -> Self {
        Self {
            thresholds,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Record a new or edited message, then check both of its windows for a
    /// run of identical content. On a hit the run is removed from the
    /// windows and returned as the messages to delete.
    pub async fn admit(&self, message: &MessageRef) -> Option<DeleteTarget> {
        let record = MessageRecord::from(message);
        let run = self.thresholds.repeat_run;

        let mut guard = self.windows.lock().await;
        let windows = &mut *guard;

        let author_window = Self::window(&mut windows.authors, &record.author_id, self.thresholds.author_window);
        author_window.upsert(record.clone());
        let author_run = author_window.repeated_run(&record.content, run);

        let channel_window = Self::window(&mut windows.channels, &record.channel_id, self.thresholds.channel_window);
        channel_window.upsert(record.clone());

        let (target, flagged) = match author_run {
            Some(flagged) => (
                DeleteTarget::Author {
                    author_id: record.author_id.clone(),
                    message_ids: flagged.iter().map(|r| r.id.clone()).collect(),
                },
                flagged,
            ),
            None => {
                let flagged = channel_window.repeated_run(&record.content, run)?;
                (
                    DeleteTarget::Channel {
                        channel_id: record.channel_id.clone(),
                        message_ids: flagged.iter().map(|r| r.id.clone()).collect(),
                    },
                    flagged,
                )
            }
        };

        // Flagged messages get deleted, so they must not seed the next run
        for flagged_record in &flagged {
            if let Some(window) = windows.authors.get_mut(&flagged_record.author_id) {
                window.remove(&flagged_record.id);
            }
            if let Some(window) = windows.channels.get_mut(&flagged_record.channel_id) {
                window.remove(&flagged_record.id);
            }
        }

        info!("Repeated content from {} in #{}: {:?}", record.author_id, record.channel_id, target);
        Some(target)
    }

    /// Fetch a window, creating it lazily and trimming it if it somehow
    /// grew past its cap
    fn window<'a>(
        windows: &'a mut HashMap<String, HistoryWindow>,
        key: &str,
        capacity: usize,
    ) -> &'a mut HistoryWindow {
        let window = windows
            .entry(key.to_string())
            .or_insert_with(|| HistoryWindow::new(capacity));

        let trimmed = window.trim();
        if trimmed > 0 {
            warn!("Window for {} was {} over its cap, trimmed", key, trimmed);
        }
        window
    }

    /// Custom emoji tokens plus emoji glyphs in raw content
    pub fn count_emoji(content: &str) -> usize {
        let custom = CUSTOM_EMOJI.find_iter(content).count();
        let without_custom = CUSTOM_EMOJI.replace_all(content, "");
        let glyphs = without_custom.chars().filter(|c| is_emoji_glyph(*c)).count();
        custom + glyphs
    }

    pub fn is_emoji_spam(&self, content: &str) -> bool {
        let count = Self::count_emoji(content);
        if count > self.thresholds.emoji_limit {
            debug!("Emoji count {} over limit {}", count, self.thresholds.emoji_limit);
            return true;
        }
        false
    }

    pub fn is_mention_spam(&self, mention_count: usize) -> bool {
        mention_count > self.thresholds.mention_limit
    }

    /// Number of author and channel windows held
    pub async fn window_counts(&self) -> (usize, usize) {
        let windows = self.windows.lock().await;
        (windows.authors.len(), windows.channels.len())
    }

    pub async fn author_window_ids(&self, author_id: &str) -> Vec<String> {
        let windows = self.windows.lock().await;
        windows
            .authors
            .get(author_id)
            .map(|w| w.ids().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub async fn channel_window_ids(&self, channel_id: &str) -> Vec<String> {
        let windows = self.windows.lock().await;
        windows
            .channels
            .get(channel_id)
            .map(|w| w.ids().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn is_emoji_glyph(c: char) -> bool {
    matches!(
        c as u32,
        0x1F600..=0x1F64F // emoticons
            | 0x1F300..=0x1F5FF // symbols and pictographs
            | 0x1F680..=0x1F6FF // transport and map
            | 0x1F900..=0x1F9FF // supplemental symbols
            | 0x1FA70..=0x1FAFF // extended pictographs
            | 0x2600..=0x26FF // misc symbols
            | 0x2700..=0x27BF // dingbats
    )
}
