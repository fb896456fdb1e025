// src/types/mod.rs - Message, word list and directive types shared by the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// File attached to a chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

/// Rich embed attached to a chat message (link previews, gifs, videos)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Platform embed type: "image", "video", "gifv", "rich", "link", ...
    #[serde(rename = "type")]
    pub kind: String,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>,
}

/// The minimal view of a chat message the moderation core needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    pub author_id: String,
    pub channel_id: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub mention_count: usize,
    #[serde(default)]
    pub author_role_ids: Vec<String>,
    #[serde(default)]
    pub author_is_bot: bool,
}

impl MessageRef {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, filename: impl Into<String>, url: impl Into<String>) -> Self {
        self.attachments.push(Attachment {
            filename: filename.into(),
            url: url.into(),
        });
        self
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn with_mentions(mut self, mention_count: usize) -> Self {
        self.mention_count = mention_count;
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.author_role_ids = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn from_bot(mut self) -> Self {
        self.author_is_bot = true;
        self
    }

    /// Mention string used when pinging the author in a warning
    pub fn author_mention(&self) -> String {
        format!("<@{}>", self.author_id)
    }
}

/// Message events delivered by the surrounding event layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "message", rename_all = "lowercase")]
pub enum MessageEvent {
    Created(MessageRef),
    Edited(MessageRef),
}

impl MessageEvent {
    pub fn message(&self) -> &MessageRef {
        match self {
            MessageEvent::Created(message) | MessageEvent::Edited(message) => message,
        }
    }
}

/// Closed set of word lists maintained by moderators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordListKind {
    General,
    Humanities,
    Whitelist,
}

impl WordListKind {
    /// Lists whose patterns are applied when this list is active.
    /// Humanities channels are held to the general list as well.
    pub fn matching_lists(self) -> &'static [WordListKind] {
        match self {
            WordListKind::General => &[WordListKind::General],
            WordListKind::Humanities => &[WordListKind::Humanities, WordListKind::General],
            WordListKind::Whitelist => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WordListKind::General => "general",
            WordListKind::Humanities => "humanities",
            WordListKind::Whitelist => "whitelist",
        }
    }
}

impl fmt::Display for WordListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordListKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(WordListKind::General),
            "humanities" => Ok(WordListKind::Humanities),
            "whitelist" => Ok(WordListKind::Whitelist),
            other => Err(format!("Unknown word list: {}", other)),
        }
    }
}

/// Mutation requested by a moderator through the external command layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordListOp {
    Add(String),
    Remove(String),
}

/// Notification that a word list changed and should be pulled again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordListChange {
    pub kind: Option<WordListKind>,
}

/// Why a message was actioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationCategory {
    MediaRestricted,
    Profanity,
    EmojiSpam,
    MentionSpam,
    MediaBypass,
    TextSpam,
}

impl ViolationCategory {
    pub const ALL: [ViolationCategory; 6] = [
        ViolationCategory::MediaRestricted,
        ViolationCategory::Profanity,
        ViolationCategory::EmojiSpam,
        ViolationCategory::MentionSpam,
        ViolationCategory::MediaBypass,
        ViolationCategory::TextSpam,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ViolationCategory::MediaRestricted => "media_restricted",
            ViolationCategory::Profanity => "profanity",
            ViolationCategory::EmojiSpam => "emoji_spam",
            ViolationCategory::MentionSpam => "mention_spam",
            ViolationCategory::MediaBypass => "media_bypass",
            ViolationCategory::TextSpam => "text_spam",
        }
    }
}

/// Which message(s) the executor should delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteTarget {
    /// The evaluated message only
    This,
    /// The listed messages from one author's window
    Author { author_id: String, message_ids: Vec<String> },
    /// The listed messages from one channel's window
    Channel { channel_id: String, message_ids: Vec<String> },
}

/// Log record handed to the executor alongside a directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub category: ViolationCategory,
    pub reason: String,
    pub evidence: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// The single output of one message evaluation.
///
/// `delete_after` is the auto-delete delay of the warning reply sent with
/// `ping`; `delete_target` names the chat messages to remove.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDirective {
    pub ping: Option<String>,
    pub delete_after: Option<Duration>,
    pub delete_target: Option<DeleteTarget>,
    pub mute_duration: Option<Duration>,
    pub log: Option<LogEntry>,
}

impl ActionDirective {
    pub fn category(&self) -> Option<ViolationCategory> {
        self.log.as_ref().map(|entry| entry.category)
    }

    /// Directive that only reports upward, with no side effects on chat
    pub fn is_flag_only(&self) -> bool {
        self.ping.is_none() && self.delete_target.is_none() && self.mute_duration.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanities_includes_general() {
        assert_eq!(WordListKind::General.matching_lists(), &[WordListKind::General]);
        assert_eq!(
            WordListKind::Humanities.matching_lists(),
            &[WordListKind::Humanities, WordListKind::General]
        );
        assert!(WordListKind::Whitelist.matching_lists().is_empty());
    }

    #[test]
    fn test_word_list_kind_parsing() {
        assert_eq!("General".parse::<WordListKind>(), Ok(WordListKind::General));
        assert_eq!(" whitelist ".parse::<WordListKind>(), Ok(WordListKind::Whitelist));
        assert!("memes".parse::<WordListKind>().is_err());
        assert_eq!(WordListKind::Humanities.to_string(), "humanities");
    }

    #[test]
    fn test_message_event_json() {
        let json = r#"{"event":"edited","message":{"id":"9","author_id":"u1","channel_id":"general","content":"hi"}}"#;
        let event: MessageEvent = serde_json::from_str(json).unwrap();

        assert!(matches!(event, MessageEvent::Edited(_)));
        assert_eq!(event.message().id, "9");
        assert!(event.message().attachments.is_empty());
    }

    #[test]
    fn test_flag_only_directive() {
        let directive = ActionDirective {
            log: Some(LogEntry {
                category: ViolationCategory::MentionSpam,
                reason: "Mention Spam".to_string(),
                evidence: vec![],
                timestamp: Utc::now(),
            }),
            ..Default::default()
        };
        assert!(directive.is_flag_only());
        assert_eq!(directive.category(), Some(ViolationCategory::MentionSpam));
    }
}
