// src/moderation/mod.rs - Message analysis pipeline and the service that drives it

use futures_util::FutureExt;
use log::{error, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::platforms::ActionExecutor;
use crate::types::{ActionDirective, MessageEvent};

pub mod engine;
pub mod filter_registry;
pub mod media_policy;
pub mod normalizer;
pub mod pattern_compiler;
pub mod profanity;
pub mod spam_tracker;

pub use engine::ModerationEngine;
pub use filter_registry::{FilterRegistry, FilterSnapshot};

/// Feeds message events through the engine and hands directives to the
/// executor
pub struct ModerationService {
    engine: Arc<ModerationEngine>,
    executor: Arc<dyn ActionExecutor>,
}

impl ModerationService {
    pub fn new(engine: Arc<ModerationEngine>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { engine, executor }
    }

    pub fn engine(&self) -> &Arc<ModerationEngine> {
        &self.engine
    }

    /// Evaluate one event and apply the resulting directive, if any
    pub async fn handle_event(&self, event: &MessageEvent) -> Option<ActionDirective> {
        let directive = match event {
            MessageEvent::Created(message) => self.engine.on_message(message).await,
            MessageEvent::Edited(message) => self.engine.on_message_edit(message).await,
        }?;

        if let Err(e) = self.executor.apply(&directive, event.message()).await {
            error!("Failed to apply directive for message {}: {}", event.message().id, e);
        }

        Some(directive)
    }

    /// Like [`handle_event`](Self::handle_event), but a panic while handling
    /// the message is logged and swallowed
    async fn handle_guarded(&self, event: &MessageEvent) {
        let outcome = AssertUnwindSafe(self.handle_event(event)).catch_unwind().await;
        if outcome.is_err() {
            error!("Panic while moderating message {}, skipping", event.message().id);
        }
    }

    /// Process every queued event until all senders are dropped. Senders
    /// wait for space in the bounded queue, so a burst is slowed down
    /// rather than dropped.
    pub fn spawn_queued(self: Arc<Self>, mut receiver: mpsc::Receiver<MessageEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                self.handle_guarded(&event).await;
            }
            info!("Message queue closed, stopping moderation");
        })
    }

    /// Process events from a broadcast feed shared with other consumers,
    /// until the sender side closes. Events missed by a lagging receiver
    /// are logged and skipped.
    pub fn spawn(self: Arc<Self>, mut receiver: broadcast::Receiver<MessageEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => self.handle_guarded(&event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Moderation receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Message receiver closed, stopping moderation");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModerationConfig;
    use crate::platforms::executor::ChannelActionExecutor;
    use crate::types::{MessageRef, ViolationCategory};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::time::Duration;

    async fn engine() -> Arc<ModerationEngine> {
        let registry = Arc::new(FilterRegistry::new());
        registry.install(&["duck".to_string()], &[], &[]).await;
        Arc::new(ModerationEngine::from_config(Arc::new(ModerationConfig::default()), registry))
    }

    /// Panics on one message id, forwards everything else
    struct FlakyExecutor {
        forwarded: mpsc::Sender<String>,
    }

    #[async_trait]
    impl ActionExecutor for FlakyExecutor {
        async fn apply(&self, _directive: &ActionDirective, message: &MessageRef) -> Result<()> {
            if message.id == "boom" {
                panic!("transport exploded");
            }
            self.forwarded.send(message.id.clone()).await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handle_event_applies_directive() {
        let (executor, mut rx) = ChannelActionExecutor::new(8);
        let service = ModerationService::new(engine().await, Arc::new(executor));

        let clean = MessageEvent::Created(MessageRef::new("1", "u1", "general", "hello"));
        assert!(service.handle_event(&clean).await.is_none());

        let edited = MessageEvent::Edited(MessageRef::new("1", "u1", "general", "hello duck"));
        let directive = service.handle_event(&edited).await.unwrap();
        assert_eq!(directive.category(), Some(ViolationCategory::Profanity));

        let (applied, message) = rx.recv().await.unwrap();
        assert_eq!(applied, directive);
        assert_eq!(message.content, "hello duck");
    }

    #[tokio::test]
    async fn test_service_survives_panics_and_stops_on_close() {
        let (forwarded, mut rx) = mpsc::channel(8);
        let service = Arc::new(ModerationService::new(
            engine().await,
            Arc::new(FlakyExecutor { forwarded }),
        ));

        let (events, receiver) = broadcast::channel(16);
        let handle = service.spawn(receiver);

        events
            .send(MessageEvent::Created(MessageRef::new("boom", "u1", "general", "duck")))
            .unwrap();
        events
            .send(MessageEvent::Created(MessageRef::new("2", "u2", "general", "duck")))
            .unwrap();

        let id = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("service stalled after panic");
        assert_eq!(id.as_deref(), Some("2"));

        drop(events);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("service did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_queued_service_handles_every_event_in_a_burst() {
        let (executor, mut directives) = ChannelActionExecutor::new(4);
        let service = Arc::new(ModerationService::new(engine().await, Arc::new(executor)));

        let (events, receiver) = mpsc::channel(4);
        let handle = service.spawn_queued(receiver);

        let producer = tokio::spawn(async move {
            for id in 0..500 {
                let event = MessageEvent::Created(MessageRef::new(
                    id.to_string(),
                    format!("u{}", id),
                    "general",
                    "duck",
                ));
                events.send(event).await.unwrap();
            }
        });

        let mut received = 0;
        while received < 500 {
            let next = tokio::time::timeout(Duration::from_secs(5), directives.recv())
                .await
                .expect("directives stopped arriving");
            let (directive, message) = next.unwrap();
            assert_eq!(directive.category(), Some(ViolationCategory::Profanity));
            assert_eq!(message.id, received.to_string());
            received += 1;
        }

        producer.await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("service did not stop after the queue closed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_queued_service_survives_panics() {
        let (forwarded, mut rx) = mpsc::channel(8);
        let service = Arc::new(ModerationService::new(
            engine().await,
            Arc::new(FlakyExecutor { forwarded }),
        ));

        let (events, receiver) = mpsc::channel(2);
        let handle = service.spawn_queued(receiver);

        events
            .send(MessageEvent::Created(MessageRef::new("boom", "u1", "general", "duck")))
            .await
            .unwrap();
        events
            .send(MessageEvent::Created(MessageRef::new("2", "u2", "general", "duck")))
            .await
            .unwrap();

        let id = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("service stalled after panic");
        assert_eq!(id.as_deref(), Some("2"));

        drop(events);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("service did not stop")
            .unwrap();
    }
}
