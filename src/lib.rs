//! # Real-time Chat Moderation Filter
//!
//! Decides, per incoming or edited chat message, whether it carries
//! obfuscated profanity, counts as emoji, mention or repeated-text spam, or
//! breaks a channel's media policy, and turns the verdict into a single
//! moderation directive for the platform layer to carry out.
//!
//! ## Features
//!
//! - **Obfuscation-resistant matching**: leetspeak, spacing tricks,
//!   homoglyphs, emoji letters and stretched words
//! - **Hot word lists**: compiled snapshots swapped atomically on change
//! - **Spam windows**: bounded per-author and per-channel history
//! - **Media policy**: media-only channels and gif/video restrictions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notafilter::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(ModerationConfig::load("moderation.yaml").await?);
//!     let store = Arc::new(YamlWordListStore::open("wordlists.yaml").await?);
//!
//!     let registry = Arc::new(FilterRegistry::new());
//!     registry.refresh(store.as_ref()).await?;
//!     registry.clone().spawn_refresh_task(store.clone());
//!
//!     let engine = ModerationEngine::from_config(config, registry);
//!     let message = MessageRef::new("1", "user", "general", "hello there");
//!     if let Some(directive) = engine.on_message(&message).await {
//!         println!("{:?}", directive);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod moderation;
pub mod platforms;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::config::word_lists::{InMemoryWordListStore, YamlWordListStore};
    pub use crate::config::{ConfigChannelPolicy, ModerationConfig, SpamThresholds};
    pub use crate::error::{ModerationError, ModerationResult};
    pub use crate::moderation::{FilterRegistry, FilterSnapshot, ModerationEngine, ModerationService};
    pub use crate::platforms::executor::ChannelActionExecutor;
    pub use crate::platforms::{ActionExecutor, ChannelPolicy, WordListStore};
    pub use crate::types::{
        ActionDirective, DeleteTarget, LogEntry, MessageEvent, MessageRef, ViolationCategory,
        WordListKind, WordListOp,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
