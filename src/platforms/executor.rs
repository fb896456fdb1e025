// src/platforms/executor.rs - Forwards moderation directives to the transport layer

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::mpsc;

use super::ActionExecutor;
use crate::types::{ActionDirective, DeleteTarget, MessageRef};

/// A directive paired with the message that triggered it
pub type DirectiveEnvelope = (ActionDirective, MessageRef);

/// [`ActionExecutor`] that logs each directive and hands it to whatever
/// owns the chat connection through an mpsc channel
#[derive(Clone)]
pub struct ChannelActionExecutor {
    directive_sender: mpsc::Sender<DirectiveEnvelope>,
}

impl ChannelActionExecutor {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DirectiveEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { directive_sender: tx }, rx)
    }

    fn describe(directive: &ActionDirective, message: &MessageRef) {
        let category = directive
            .category()
            .map(|c| c.label())
            .unwrap_or("unknown");

        if directive.is_flag_only() {
            info!(
                "Flagged {} from {} in #{} for review",
                category, message.author_id, message.channel_id
            );
            return;
        }

        match &directive.delete_target {
            Some(DeleteTarget::This) => {
                info!("Deleting message {} from {} ({})", message.id, message.author_id, category);
            }
            Some(DeleteTarget::Author { author_id, message_ids }) => {
                info!("Deleting {} messages from {} ({})", message_ids.len(), author_id, category);
            }
            Some(DeleteTarget::Channel { channel_id, message_ids }) => {
                info!("Deleting {} messages in #{} ({})", message_ids.len(), channel_id, category);
            }
            None => {}
        }

        if let Some(duration) = directive.mute_duration {
            info!("Muting {} for {}s", message.author_id, duration.as_secs());
        }
    }
}

#[async_trait]
impl ActionExecutor for ChannelActionExecutor {
    async fn apply(&self, directive: &ActionDirective, message: &MessageRef) -> Result<()> {
        Self::describe(directive, message);

        if let Err(e) = self
            .directive_sender
            .send((directive.clone(), message.clone()))
            .await
        {
            warn!("Directive receiver dropped, {} not delivered", message.id);
            return Err(anyhow::anyhow!("Failed to forward directive: {}", e));
        }

        Ok(())
    }
}
