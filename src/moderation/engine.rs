// src/moderation/engine.rs - Turns detections into at most one directive per message

use chrono::Utc;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{ConfigChannelPolicy, ModerationConfig};
use crate::error::{ModerationError, ModerationResult};
use crate::moderation::filter_registry::FilterRegistry;
use crate::moderation::media_policy::{is_animated_media, violates_media_restriction};
use crate::moderation::normalizer::normalize;
use crate::moderation::profanity::check_profanity;
use crate::moderation::spam_tracker::SpamTracker;
use crate::platforms::ChannelPolicy;
use crate::types::{ActionDirective, DeleteTarget, LogEntry, MessageRef, ViolationCategory};

pub struct ModerationEngine {
    config: Arc<ModerationConfig>,
    registry: Arc<FilterRegistry>,
    spam: SpamTracker,
    policy: Arc<dyn ChannelPolicy>,
    evaluated: AtomicU64,
    failed: AtomicU64,
    flagged: RwLock<HashMap<ViolationCategory, u64>>,
}

impl ModerationEngine {
    pub fn new(
        config: Arc<ModerationConfig>,
        registry: Arc<FilterRegistry>,
        policy: Arc<dyn ChannelPolicy>,
    ) -> Self {
        Self {
            spam: SpamTracker::new(config.spam.clone()),
            config,
            registry,
            policy,
            evaluated: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            flagged: RwLock::new(HashMap::new()),
        }
    }

    /// Engine whose channel lookups come straight from the config
    pub fn from_config(config: Arc<ModerationConfig>, registry: Arc<FilterRegistry>) -> Self {
        let policy = Arc::new(ConfigChannelPolicy::new(config.clone()));
        Self::new(config, registry, policy)
    }

    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    pub fn spam_tracker(&self) -> &SpamTracker {
        &self.spam
    }

    /// Evaluate a newly posted message
    pub async fn on_message(&self, message: &MessageRef) -> Option<ActionDirective> {
        self.evaluate(message).await
    }

    /// Re-evaluate an edited message. Its window record is updated in place
    /// rather than appended.
    pub async fn on_message_edit(&self, message: &MessageRef) -> Option<ActionDirective> {
        debug!("Re-checking edited message {}", message.id);
        self.evaluate(message).await
    }

    async fn evaluate(&self, message: &MessageRef) -> Option<ActionDirective> {
        self.evaluated.fetch_add(1, Ordering::Relaxed);

        match self.try_evaluate(message).await {
            Ok(Some(directive)) => {
                if let Some(category) = directive.category() {
                    *self.flagged.write().await.entry(category).or_insert(0) += 1;
                    info!(
                        "Message {} from {} in #{} flagged: {}",
                        message.id,
                        message.author_id,
                        message.channel_id,
                        category.label()
                    );
                }
                Some(directive)
            }
            Ok(None) => None,
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!("Failed to evaluate message {:?}: {}", message.id, e);
                None
            }
        }
    }

    /// Run every check in priority order; the first hit decides
    pub async fn try_evaluate(&self, message: &MessageRef) -> ModerationResult<Option<ActionDirective>> {
        Self::validate(message)?;
        let channel = message.channel_id.as_str();

        if self.config.is_exempt_author(message) || self.policy.is_exempt(channel) {
            debug!("Skipping exempt message {}", message.id);
            return Ok(None);
        }

        if violates_media_restriction(message, self.policy.is_media_restricted(channel)) {
            return Ok(Some(self.media_restricted(message)));
        }

        if self.config.is_command(&message.content) {
            debug!("Skipping command message {}", message.id);
            return Ok(None);
        }

        let normalized = normalize(&message.content);
        let snapshot = self.registry.snapshot().await;
        if let Some(evidence) = check_profanity(&normalized, &snapshot, self.policy.word_list_for(channel)) {
            return Ok(Some(self.profanity(message, evidence)));
        }

        if !self.policy.is_new_member_channel(channel) && self.spam.is_emoji_spam(&message.content) {
            return Ok(Some(self.emoji_spam(message)));
        }

        if self.spam.is_mention_spam(message.mention_count) {
            return Ok(Some(Self::mention_spam(message)));
        }

        if self.policy.blocks_animated_media(channel)
            && !self.config.may_post_animated_media(message)
            && is_animated_media(message)
        {
            return Ok(Some(self.media_bypass(message)));
        }

        Ok(self
            .spam
            .admit(message)
            .await
            .map(|target| self.text_spam(message, target)))
    }

    fn validate(message: &MessageRef) -> ModerationResult<()> {
        if message.id.is_empty() {
            return Err(ModerationError::InvalidMessage("missing message id".to_string()));
        }
        if message.author_id.is_empty() {
            return Err(ModerationError::InvalidMessage(format!("message {} has no author", message.id)));
        }
        if message.channel_id.is_empty() {
            return Err(ModerationError::InvalidMessage(format!("message {} has no channel", message.id)));
        }
        Ok(())
    }

    fn ping(message: &MessageRef, warning: &str) -> Option<String> {
        Some(format!("{} {}", message.author_mention(), warning))
    }

    fn log(category: ViolationCategory, reason: &str, evidence: Vec<String>) -> Option<LogEntry> {
        Some(LogEntry {
            category,
            reason: reason.to_string(),
            evidence,
            timestamp: Utc::now(),
        })
    }

    fn media_restricted(&self, message: &MessageRef) -> ActionDirective {
        let actions = &self.config.actions;
        ActionDirective {
            ping: Self::ping(message, &actions.media_restricted_warning),
            delete_after: Some(actions.media_warning_delete_after()),
            delete_target: Some(DeleteTarget::This),
            mute_duration: None,
            log: Self::log(ViolationCategory::MediaRestricted, "Media in restricted channel", Vec::new()),
        }
    }

    fn profanity(&self, message: &MessageRef, evidence: Vec<String>) -> ActionDirective {
        ActionDirective {
            ping: Self::ping(message, &self.config.actions.profanity_warning),
            delete_target: Some(DeleteTarget::This),
            log: Self::log(ViolationCategory::Profanity, "Profanity", evidence),
            ..Default::default()
        }
    }

    fn emoji_spam(&self, message: &MessageRef) -> ActionDirective {
        let count = SpamTracker::count_emoji(&message.content);
        ActionDirective {
            ping: Self::ping(message, &self.config.actions.emoji_spam_warning),
            delete_target: Some(DeleteTarget::This),
            log: Self::log(ViolationCategory::EmojiSpam, "Emoji Spam", vec![format!("{} emojis", count)]),
            ..Default::default()
        }
    }

    /// Reported upward only; nothing is deleted
    fn mention_spam(message: &MessageRef) -> ActionDirective {
        ActionDirective {
            log: Self::log(
                ViolationCategory::MentionSpam,
                "Mention Spam",
                vec![format!("{} mentions", message.mention_count)],
            ),
            ..Default::default()
        }
    }

    fn media_bypass(&self, message: &MessageRef) -> ActionDirective {
        let actions = &self.config.actions;
        ActionDirective {
            ping: Self::ping(message, &actions.media_bypass_warning),
            delete_after: Some(actions.media_warning_delete_after()),
            delete_target: Some(DeleteTarget::This),
            mute_duration: None,
            log: Self::log(ViolationCategory::MediaBypass, "Gif or video in general channel", Vec::new()),
        }
    }

    fn text_spam(&self, message: &MessageRef, target: DeleteTarget) -> ActionDirective {
        let actions = &self.config.actions;
        ActionDirective {
            ping: Self::ping(message, &actions.text_spam_warning),
            delete_after: None,
            delete_target: Some(target),
            mute_duration: Some(actions.text_spam_mute()),
            log: Self::log(ViolationCategory::TextSpam, "Text Spam", vec![message.content.clone()]),
        }
    }

    /// Evaluation counters, flags per category and filter state
    pub async fn stats(&self) -> HashMap<String, serde_json::Value> {
        let snapshot = self.registry.snapshot().await;
        let (author_windows, channel_windows) = self.spam.window_counts().await;
        let flagged = self.flagged.read().await;

        let mut stats = HashMap::new();
        stats.insert("evaluated".to_string(), serde_json::Value::Number(self.evaluated.load(Ordering::Relaxed).into()));
        stats.insert("failed".to_string(), serde_json::Value::Number(self.failed.load(Ordering::Relaxed).into()));
        stats.insert("filter_generation".to_string(), serde_json::Value::Number(snapshot.generation().into()));
        stats.insert("pattern_count".to_string(), serde_json::Value::Number(snapshot.pattern_count().into()));
        stats.insert("whitelist_size".to_string(), serde_json::Value::Number(snapshot.whitelist_len().into()));
        stats.insert("author_windows".to_string(), serde_json::Value::Number(author_windows.into()));
        stats.insert("channel_windows".to_string(), serde_json::Value::Number(channel_windows.into()));

        let mut flagged_stats = serde_json::Map::new();
        for category in ViolationCategory::ALL {
            let count = flagged.get(&category).copied().unwrap_or(0);
            flagged_stats.insert(category.label().to_string(), serde_json::json!(count));
        }
        stats.insert("flagged".to_string(), serde_json::Value::Object(flagged_stats));

        stats
    }
}
