// src/main.rs - Run the moderation filter over JSON message events read from stdin

use anyhow::Result;
use log::{error, info, warn};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use notafilter::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting notafilter v{}", notafilter::VERSION);

    let mut args = env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "moderation.yaml".to_string());
    let word_list_path = args.next().unwrap_or_else(|| "wordlists.yaml".to_string());

    let config = Arc::new(ModerationConfig::load(&config_path).await?);
    info!("Loaded configuration from {}", config_path);

    // Word lists: initial load, then follow file edits
    let store = Arc::new(YamlWordListStore::open(&word_list_path).await?);
    info!("Using word lists from {}", store.path().display());
    if let Err(e) = store.watch().await {
        warn!("Word list hot-reload disabled: {}", e);
    }

    let registry = Arc::new(FilterRegistry::new());
    if let Err(e) = registry.refresh(store.as_ref()).await {
        error!("Initial word list load failed, starting with empty filters: {}", e);
    }
    let refresh_task = registry.clone().spawn_refresh_task(store.clone());

    let engine = Arc::new(ModerationEngine::from_config(config, registry));
    let (executor, mut directives) = ChannelActionExecutor::new(100);
    let service = Arc::new(ModerationService::new(engine.clone(), Arc::new(executor)));

    // Bounded queue: reading stdin pauses while the service catches up
    let (events, receiver) = mpsc::channel(1000);
    let service_task = service.spawn_queued(receiver);

    // Directive printer: one JSON object per line
    let printer_task = tokio::spawn(async move {
        while let Some((directive, message)) = directives.recv().await {
            let line = serde_json::json!({
                "message_id": message.id,
                "channel_id": message.channel_id,
                "directive": directive,
            });
            println!("{}", line);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<MessageEvent>(&line) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    error!("Moderation service is not running");
                    break;
                }
            }
            Err(e) => warn!("Skipping malformed event: {}", e),
        }
    }

    // Closing the event channel lets the service drain and stop
    drop(events);
    service_task.await?;
    printer_task.await?;
    refresh_task.abort();

    info!("Final statistics: {}", serde_json::to_string(&engine.stats().await)?);
    Ok(())
}
