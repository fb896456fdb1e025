// src/config/mod.rs - Moderation configuration and the config-backed channel policy

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

use crate::error::{ModerationError, ModerationResult};
use crate::platforms::ChannelPolicy;
use crate::types::{MessageRef, WordListKind};

pub mod word_lists;

/// Everything the moderation core needs to know about the deployment.
/// Every field has a default so partial YAML files load cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Roles whose members are never filtered (staff, trusted bots)
    pub exempt_role_ids: Vec<String>,

    /// Channels in the moderation category; all exempt except staging
    pub moderation_channel_ids: Vec<String>,
    /// Moderation-category channel that is still filtered
    pub staging_channel_id: Option<String>,
    /// Non-moderated test channels
    pub test_channel_ids: Vec<String>,

    /// Channels where every post must carry an image, video or gif
    pub media_restricted_channel_ids: Vec<String>,
    /// Welcome channels exempt from emoji spam detection
    pub new_member_channel_ids: Vec<String>,
    /// Channels filtered with the humanities list on top of the general one
    pub humanities_channel_ids: Vec<String>,
    /// General-purpose channels where gifs and videos are not allowed
    pub general_channel_ids: Vec<String>,
    /// General-purpose channels that explicitly allow gifs and videos
    pub media_allowed_channel_ids: Vec<String>,
    /// Roles allowed to post gifs and videos anywhere
    pub media_allowed_role_ids: Vec<String>,

    /// Prefixes of this bot's and other bots' commands
    pub command_prefixes: Vec<String>,

    pub spam: SpamThresholds,
    pub actions: ActionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamThresholds {
    /// Emoji count above which a message is emoji spam
    pub emoji_limit: usize,
    /// Mention count above which a message is mention spam
    pub mention_limit: usize,
    /// Messages remembered per author
    pub author_window: usize,
    /// Messages remembered per channel
    pub channel_window: usize,
    /// Identical consecutive messages that count as text spam
    pub repeat_run: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSettings {
    pub text_spam_mute_seconds: u64,
    /// Auto-delete delay for warnings that accompany media violations
    pub media_warning_delete_after_seconds: u64,
    pub profanity_warning: String,
    pub emoji_spam_warning: String,
    pub media_restricted_warning: String,
    pub media_bypass_warning: String,
    pub text_spam_warning: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            exempt_role_ids: Vec::new(),
            moderation_channel_ids: Vec::new(),
            staging_channel_id: None,
            test_channel_ids: Vec::new(),
            media_restricted_channel_ids: Vec::new(),
            new_member_channel_ids: Vec::new(),
            humanities_channel_ids: Vec::new(),
            general_channel_ids: Vec::new(),
            media_allowed_channel_ids: Vec::new(),
            media_allowed_role_ids: Vec::new(),
            command_prefixes: vec!["!".to_string(), "?".to_string()],
            spam: SpamThresholds::default(),
            actions: ActionSettings::default(),
        }
    }
}

impl Default for SpamThresholds {
    fn default() -> Self {
        Self {
            emoji_limit: 5,
            mention_limit: 5,
            author_window: 5,
            channel_window: 10,
            repeat_run: 4,
        }
    }
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            text_spam_mute_seconds: 30 * 60,
            media_warning_delete_after_seconds: 10,
            profanity_warning: "please watch your language.".to_string(),
            emoji_spam_warning: "please don't spam emojis.".to_string(),
            media_restricted_warning: "this channel is for images, videos and gifs only.".to_string(),
            media_bypass_warning: "gifs and videos aren't allowed in this channel.".to_string(),
            text_spam_warning: "please don't spam. You have been muted for 30 minutes.".to_string(),
        }
    }
}

impl ActionSettings {
    pub fn text_spam_mute(&self) -> Duration {
        Duration::from_secs(self.text_spam_mute_seconds)
    }

    pub fn media_warning_delete_after(&self) -> Duration {
        Duration::from_secs(self.media_warning_delete_after_seconds)
    }
}

impl ModerationConfig {
    /// Load configuration from a YAML file, writing the defaults there first
    /// if the file does not exist yet
    pub async fn load<P: AsRef<Path>>(path: P) -> ModerationResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.save(path).await?;
            info!("Created default moderation configuration: {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path).await?;
        let config: ModerationConfig = serde_yaml::from_str(&content)?;
        config.validate()?;

        debug!("Loaded moderation configuration from {}", path.display());
        Ok(config)
    }

    /// Validate and write the configuration as YAML
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> ModerationResult<()> {
        self.validate()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> ModerationResult<()> {
        let spam = &self.spam;

        if spam.author_window == 0 || spam.channel_window == 0 {
            return Err(ModerationError::Config("History windows must hold at least one message".to_string()));
        }

        if spam.repeat_run < 2 {
            return Err(ModerationError::Config("repeat_run must be at least 2".to_string()));
        }

        if spam.repeat_run > spam.author_window || spam.repeat_run > spam.channel_window {
            return Err(ModerationError::Config(format!(
                "repeat_run ({}) cannot exceed the history windows ({} / {})",
                spam.repeat_run, spam.author_window, spam.channel_window
            )));
        }

        if self.command_prefixes.iter().any(|prefix| prefix.is_empty()) {
            return Err(ModerationError::Config("Command prefixes cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Bots and holders of an exempt role are never filtered
    pub fn is_exempt_author(&self, message: &MessageRef) -> bool {
        message.author_is_bot || Self::has_any_role(message, &self.exempt_role_ids)
    }

    pub fn may_post_animated_media(&self, message: &MessageRef) -> bool {
        Self::has_any_role(message, &self.media_allowed_role_ids)
    }

    pub fn is_command(&self, content: &str) -> bool {
        let content = content.trim_start();
        self.command_prefixes.iter().any(|prefix| content.starts_with(prefix.as_str()))
    }

    fn has_any_role(message: &MessageRef, roles: &[String]) -> bool {
        message.author_role_ids.iter().any(|role| roles.contains(role))
    }
}

/// [`ChannelPolicy`] answered from a [`ModerationConfig`]
#[derive(Debug, Clone)]
pub struct ConfigChannelPolicy {
    config: Arc<ModerationConfig>,
}

impl ConfigChannelPolicy {
    pub fn new(config: Arc<ModerationConfig>) -> Self {
        Self { config }
    }

    fn listed(channels: &[String], channel_id: &str) -> bool {
        channels.iter().any(|channel| channel == channel_id)
    }
}

impl ChannelPolicy for ConfigChannelPolicy {
    fn is_exempt(&self, channel_id: &str) -> bool {
        let is_staging = self.config.staging_channel_id.as_deref() == Some(channel_id);
        let in_moderation = Self::listed(&self.config.moderation_channel_ids, channel_id);

        (in_moderation && !is_staging) || Self::listed(&self.config.test_channel_ids, channel_id)
    }

    fn is_media_restricted(&self, channel_id: &str) -> bool {
        Self::listed(&self.config.media_restricted_channel_ids, channel_id)
    }

    fn is_new_member_channel(&self, channel_id: &str) -> bool {
        Self::listed(&self.config.new_member_channel_ids, channel_id)
    }

    fn word_list_for(&self, channel_id: &str) -> WordListKind {
        if Self::listed(&self.config.humanities_channel_ids, channel_id) {
            WordListKind::Humanities
        } else {
            WordListKind::General
        }
    }

    fn blocks_animated_media(&self, channel_id: &str) -> bool {
        Self::listed(&self.config.general_channel_ids, channel_id)
            && !Self::listed(&self.config.media_allowed_channel_ids, channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("moderation.yaml");

        let config = ModerationConfig::load(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.spam, SpamThresholds::default());

        // Reloading the written defaults round-trips
        let reloaded = ModerationConfig::load(&path).await.unwrap();
        assert_eq!(reloaded.command_prefixes, config.command_prefixes);
    }

    #[tokio::test]
    async fn test_partial_yaml_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("moderation.yaml");
        fs::write(&path, "media_restricted_channel_ids: [\"art\"]\nspam:\n  emoji_limit: 8\n")
            .await
            .unwrap();

        let config = ModerationConfig::load(&path).await.unwrap();
        assert_eq!(config.media_restricted_channel_ids, ids(&["art"]));
        assert_eq!(config.spam.emoji_limit, 8);
        assert_eq!(config.spam.author_window, 5);
        assert_eq!(config.actions.text_spam_mute(), Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("moderation.yaml");
        fs::write(&path, "spam:\n  repeat_run: 12\n").await.unwrap();

        let result = ModerationConfig::load(&path).await;
        assert!(matches!(result, Err(ModerationError::Config(_))));
    }

    #[test]
    fn test_channel_policy() {
        let config = ModerationConfig {
            moderation_channel_ids: ids(&["mod-chat", "mod-staging"]),
            staging_channel_id: Some("mod-staging".to_string()),
            test_channel_ids: ids(&["bot-test"]),
            media_restricted_channel_ids: ids(&["art"]),
            new_member_channel_ids: ids(&["welcome"]),
            humanities_channel_ids: ids(&["history"]),
            general_channel_ids: ids(&["general", "memes"]),
            media_allowed_channel_ids: ids(&["memes"]),
            ..Default::default()
        };
        let policy = ConfigChannelPolicy::new(Arc::new(config));

        assert!(policy.is_exempt("mod-chat"));
        assert!(!policy.is_exempt("mod-staging"));
        assert!(policy.is_exempt("bot-test"));
        assert!(!policy.is_exempt("general"));

        assert!(policy.is_media_restricted("art"));
        assert!(policy.is_new_member_channel("welcome"));
        assert_eq!(policy.word_list_for("history"), WordListKind::Humanities);
        assert_eq!(policy.word_list_for("general"), WordListKind::General);

        assert!(policy.blocks_animated_media("general"));
        assert!(!policy.blocks_animated_media("memes"));
        assert!(!policy.blocks_animated_media("art"));
    }

    #[test]
    fn test_exempt_authors_and_commands() {
        let config = ModerationConfig {
            exempt_role_ids: ids(&["staff"]),
            ..Default::default()
        };

        let member = MessageRef::new("1", "u1", "general", "hi").with_roles(&["member"]);
        let staff = MessageRef::new("2", "u2", "general", "hi").with_roles(&["member", "staff"]);
        let bot = MessageRef::new("3", "b1", "general", "hi").from_bot();

        assert!(!config.is_exempt_author(&member));
        assert!(config.is_exempt_author(&staff));
        assert!(config.is_exempt_author(&bot));

        assert!(config.is_command("!rank"));
        assert!(config.is_command("  ?help"));
        assert!(!config.is_command("hello!"));
    }
}
