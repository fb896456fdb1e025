// src/platforms/mod.rs - Collaborator traits the moderation core talks through

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::types::{ActionDirective, MessageRef, WordListChange, WordListKind, WordListOp};

pub mod executor;

/// Source of truth for the moderator-maintained word lists.
///
/// The moderation core only ever reads; `update` exists for the command
/// layer, which then notifies subscribers so the core can pull again.
#[async_trait]
pub trait WordListStore: Send + Sync {
    /// Fetch the current contents of one list
    async fn get(&self, kind: WordListKind) -> Result<Vec<String>>;

    /// Apply an add/remove operation to one list
    async fn update(&self, kind: WordListKind, op: WordListOp) -> Result<()>;

    /// Receive a notification whenever a list changes
    fn subscribe(&self) -> broadcast::Receiver<WordListChange>;
}

/// Performs the side effects of a directive on the chat platform
/// (deletions, warning replies, timeouts, moderation log records)
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn apply(&self, directive: &ActionDirective, message: &MessageRef) -> Result<()>;
}

/// Per-channel lookup tables supplied by the deployment
pub trait ChannelPolicy: Send + Sync {
    /// Channels the filter never looks at (moderation and test channels)
    fn is_exempt(&self, channel_id: &str) -> bool;

    /// Channels where posts must carry an image, video or gif
    fn is_media_restricted(&self, channel_id: &str) -> bool;

    /// Welcome channels where emoji floods are expected
    fn is_new_member_channel(&self, channel_id: &str) -> bool;

    /// Which profanity list applies in this channel
    fn word_list_for(&self, channel_id: &str) -> WordListKind;

    /// General-purpose channels where gifs and videos are not allowed
    fn blocks_animated_media(&self, channel_id: &str) -> bool;
}
