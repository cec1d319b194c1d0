//! Chainbook Indexer binary.
//!
//! Reads length-prefixed blocks from stdin and indexes them into PostgreSQL.

use std::sync::Arc;

use anyhow::Context;
use chainbook_indexer::{ChannelSink, FrameBlockSource, IndexerConfig, IndexerService, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chainbook_indexer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IndexerConfig::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    tracing::info!("Starting Chainbook Indexer");
    tracing::info!("Database max connections: {}", config.database_max_connections);
    tracing::info!("Websocket messages enabled: {}", config.send_websocket_messages);

    let store = PgStore::connect(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("failed to run migrations")?;

    let (sink, mut receiver) = ChannelSink::channel(1024);
    let consumer = tokio::spawn(async move {
        while let Some(batch) = receiver.recv().await {
            tracing::debug!(
                "Batch for {}: {} messages, {} bytes",
                batch.topic,
                batch.len(),
                batch.size_bytes()
            );
        }
    });

    let service = IndexerService::new(config, Arc::new(store), Arc::new(sink))
        .context("invalid configuration")?;
    service.start().await.context("failed to load indexer state")?;
    let service = Arc::new(service);

    // Stop at the next block boundary on Ctrl+C
    let signal_service = Arc::clone(&service);
    let signal_task = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down indexer");
                signal_service.stop();
            }
            Err(e) => tracing::warn!("Cannot listen for Ctrl+C: {}", e),
        }
    });

    let mut source = FrameBlockSource::new(tokio::io::stdin());
    let outcome = service.run(&mut source).await;

    signal_task.abort();
    let _ = signal_task.await;

    let snapshot = service.metrics().snapshot();
    tracing::info!("Final metrics: {:?}", snapshot);

    let blocks = outcome.context("indexing halted")?;
    tracing::info!("Indexer finished after {} blocks", blocks);

    drop(service);
    consumer.await.context("message consumer panicked")?;

    Ok(())
}
