//! Main indexer service.
//!
//! Feeds blocks from a source through the pipeline, retries transient store
//! failures and publishes the composed messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::cache::MarketCache;
use crate::config::{ConfigError, IndexerConfig};
use crate::error::IndexerError;
use crate::events::{Block, BlockPipeline, BlockSource, PipelineMetrics, ProcessingResult};
use crate::handlers::EventRegistry;
use crate::messages::{MessageSink, Publisher};
use crate::storage::Store;

/// The indexer service.
pub struct IndexerService {
    /// Configuration.
    config: IndexerConfig,

    /// Persistent store.
    store: Arc<dyn Store>,

    /// Market cache shared with the pipeline.
    cache: Arc<MarketCache>,

    /// Block pipeline; blocks run one at a time.
    pipeline: Mutex<BlockPipeline>,

    /// Outbound publisher.
    publisher: Publisher,

    /// Pipeline metrics.
    metrics: Arc<PipelineMetrics>,

    /// Whether the service is running.
    running: Arc<AtomicBool>,

    /// Set once a stop is requested.
    shutdown: watch::Sender<bool>,
}

impl IndexerService {
    /// Creates a new indexer service.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: IndexerConfig,
        store: Arc<dyn Store>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = Arc::new(MarketCache::new());
        let pipeline = BlockPipeline::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::new(EventRegistry::with_defaults()),
        )
        .with_max_concurrent_handlers(config.max_concurrent_handlers);
        let metrics = pipeline.metrics();
        let publisher = Publisher::new(
            sink,
            config.send_websocket_messages,
            config.max_batch_message_bytes,
        );

        Ok(Self {
            config,
            store,
            cache,
            pipeline: Mutex::new(pipeline),
            publisher,
            metrics,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: watch::channel(false).0,
        })
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Returns the market cache.
    #[must_use]
    pub fn cache(&self) -> Arc<MarketCache> {
        Arc::clone(&self.cache)
    }

    /// Returns true if the service is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the service after the block in flight.
    ///
    /// A block already handed to the pipeline is committed and published
    /// before [`run`](Self::run) returns. A pending read from the source is
    /// abandoned. Stopping is final: a later `run` returns immediately.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.shutdown.send_replace(true);
        info!("Indexer service stop requested");
    }

    /// Loads the market cache and the cursor from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn start(&self) -> Result<(), IndexerError> {
        let last_height = self.resync().await?;
        info!(
            "Indexer service ready: {} markets cached, last block {:?}",
            self.cache.len().await,
            last_height
        );
        Ok(())
    }

    async fn resync(&self) -> Result<Option<u64>, IndexerError> {
        self.cache.load_all(self.store.as_ref()).await?;
        let last_height = self.store.latest_block_height().await?;
        self.pipeline.lock().await.reset_cursor(last_height);
        Ok(last_height)
    }

    /// Processes one block and publishes its messages.
    ///
    /// Transient store failures re-run the identical block, after re-reading
    /// the cache and cursor from the store, until `max_store_retries` is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns validation, encoding and deterministic store errors
    /// immediately, transient store errors once retries are exhausted, and
    /// publish errors.
    pub async fn handle_block(&self, block: &Block) -> Result<ProcessingResult, IndexerError> {
        let mut retry = 0u32;

        loop {
            let attempt = self.pipeline.lock().await.process_block(block).await;
            match attempt {
                Ok(result) => {
                    if !result.skipped {
                        self.publisher.publish(result.messages.clone()).await?;
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && retry < self.config.max_store_retries => {
                    let backoff = self.calculate_backoff(retry);
                    warn!(
                        "Block {} failed ({}), retry {} in {:?}",
                        block.height,
                        e,
                        retry + 1,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    if let Err(resync_error) = self.resync().await {
                        warn!("Resync before retry failed: {}", resync_error);
                    }
                    retry += 1;
                }
                Err(e) => {
                    error!("Block {} failed: {}", block.height, e);
                    return Err(e);
                }
            }
        }
    }

    /// Runs the service over a block source until it is exhausted or the
    /// service is stopped. Returns the number of blocks handled.
    ///
    /// # Errors
    ///
    /// Returns the first error that halts indexing.
    pub async fn run<S: BlockSource>(&self, source: &mut S) -> Result<u64, IndexerError> {
        self.running.store(true, Ordering::Relaxed);
        info!("Indexer service started");

        let mut shutdown = self.shutdown.subscribe();
        let mut handled = 0u64;
        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(handled);
            }
            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => continue,
                next = source.next_block() => next,
            };
            let block = match next {
                Ok(Some(block)) => block,
                Ok(None) => break Ok(handled),
                Err(e) => break Err(e),
            };
            if let Err(e) = self.handle_block(&block).await {
                break Err(e);
            }
            handled += 1;
        };

        self.running.store(false, Ordering::Relaxed);
        info!("Indexer service stopped after {} blocks", handled);
        outcome
    }

    /// Calculates the backoff duration for a retry.
    #[must_use]
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let backoff = self.config.initial_backoff_ms as f64
            * self
                .config
                .backoff_multiplier
                .powi(i32::try_from(retry).unwrap_or(i32::MAX));
        let backoff = (backoff as u64).min(self.config.max_backoff_ms);
        Duration::from_millis(backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{encode_frame, Event, EventOrdering, FrameBlockSource};
    use crate::messages::{ChannelSink, MessageBatch, Topic};
    use crate::storage::{BlockRecord, MemoryStore, StoreError, WriteSet};
    use chainbook_sdk::proto::{
        ClobPairStatus, IndexerTendermintBlock, IndexerTendermintEvent,
        PerpetualMarketCreateEventV1, Timestamp, UpdatePerpetualEventV1,
    };
    use async_trait::async_trait;
    use chainbook_sdk::proto::block::indexer_tendermint_event::OrderingWithinBlock;
    use chrono::DateTime;
    use prost::Message;

    /// Requests a stop each time a block is read.
    struct StoppingSource {
        service: Arc<IndexerService>,
        blocks: Vec<Block>,
    }

    #[async_trait]
    impl BlockSource for StoppingSource {
        async fn next_block(&mut self) -> Result<Option<Block>, IndexerError> {
            self.service.stop();
            Ok(self.blocks.pop())
        }
    }

    /// Never yields a block.
    struct IdleSource;

    #[async_trait]
    impl BlockSource for IdleSource {
        async fn next_block(&mut self) -> Result<Option<Block>, IndexerError> {
            std::future::pending().await
        }
    }

    fn create_payload(id: u32) -> Vec<u8> {
        PerpetualMarketCreateEventV1 {
            id,
            clob_pair_id: id,
            ticker: format!("M{id}-USD"),
            market_id: id,
            status: ClobPairStatus::Active as i32,
            quantum_conversion_exponent: -9,
            atomic_resolution: -10,
            subticks_per_tick: 100,
            step_base_quantums: 10,
            liquidity_tier: 0,
            market_type: 0,
        }
        .encode_to_vec()
    }

    fn block(height: u64, subtype: &str, payload: Vec<u8>) -> Block {
        Block {
            height,
            time: DateTime::from_timestamp(1_700_000_000, 0).expect("valid time"),
            events: vec![Event {
                subtype: subtype.to_string(),
                version: 1,
                ordering: EventOrdering::Transaction(0),
                event_index: 0,
                payload,
            }],
            tx_hashes: vec!["tx".to_string()],
        }
    }

    fn config() -> IndexerConfig {
        IndexerConfig::default().with_store_retries(3, 1)
    }

    fn build_service(
        store: &Arc<MemoryStore>,
        config: IndexerConfig,
    ) -> (IndexerService, tokio::sync::mpsc::Receiver<MessageBatch>) {
        let (sink, receiver) = ChannelSink::channel(16);
        let store = Arc::clone(store) as Arc<dyn Store>;
        let service = IndexerService::new(config, store, Arc::new(sink)).expect("valid config");
        (service, receiver)
    }

    #[test]
    fn test_service_new_invalid_config() {
        let store = Arc::new(MemoryStore::new());
        let (sink, _receiver) = ChannelSink::channel(1);
        let config = IndexerConfig::default().with_max_concurrent_handlers(0);

        let service = IndexerService::new(config, store, Arc::new(sink));
        assert!(service.is_err());
    }

    #[test]
    fn test_calculate_backoff() {
        let store = Arc::new(MemoryStore::new());
        let (service, _receiver) = build_service(&store, IndexerConfig::default());

        assert_eq!(service.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(service.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(service.calculate_backoff(3), Duration::from_millis(800));
        assert_eq!(service.calculate_backoff(20), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_start_loads_cache_and_cursor() {
        let store = Arc::new(MemoryStore::new());
        let (seed, _receiver) = build_service(&store, config());
        seed.handle_block(&block(5, "perpetual_market", create_payload(1)))
            .await
            .expect("seed block");

        let (service, _receiver) = build_service(&store, config());
        service.start().await.expect("start");
        assert_eq!(service.cache().len().await, 1);

        let replay = service
            .handle_block(&block(5, "perpetual_market", create_payload(1)))
            .await
            .expect("replay");
        assert!(replay.skipped);
    }

    #[tokio::test]
    async fn test_store_failure_is_retried() {
        let store = Arc::new(MemoryStore::new());
        let (service, mut receiver) = build_service(&store, config());
        store.fail_next_commits(2);

        let result = service
            .handle_block(&block(1, "perpetual_market", create_payload(1)))
            .await
            .expect("third attempt commits");

        assert!(!result.skipped);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(service.metrics().store_failures(), 2);
        assert_eq!(service.cache().len().await, 1);
        let batch = receiver.recv().await.expect("published");
        assert_eq!(batch.topic, Topic::Markets);
    }

    #[tokio::test]
    async fn test_store_retries_are_bounded() {
        let store = Arc::new(MemoryStore::new());
        let (service, _receiver) = build_service(&store, config());
        store.fail_next_commits(10);

        let err = service
            .handle_block(&block(1, "perpetual_market", create_payload(1)))
            .await
            .expect_err("retries exhausted");

        assert!(matches!(err, IndexerError::Store(_)));
        assert_eq!(service.metrics().store_failures(), 4);
        assert!(service.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_corrupt_store_error_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let (service, mut receiver) = build_service(&store, config());
        store.corrupt_next_commits(1);

        let err = service
            .handle_block(&block(1, "perpetual_market", create_payload(1)))
            .await
            .expect_err("corrupt row surfaces");

        assert!(matches!(err, IndexerError::Store(StoreError::Corrupt(_))));
        assert_eq!(service.metrics().store_failures(), 1);
        assert_eq!(store.commit_count(), 0);
        assert!(service.cache().is_empty().await);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_finishes_block_in_flight() {
        let store = Arc::new(MemoryStore::new());
        let (service, mut receiver) = build_service(&store, config());
        let service = Arc::new(service);
        let mut source = StoppingSource {
            service: Arc::clone(&service),
            blocks: vec![
                block(2, "perpetual_market", create_payload(2)),
                block(1, "perpetual_market", create_payload(1)),
            ],
        };

        let handled = service.run(&mut source).await.expect("run");

        assert_eq!(handled, 1);
        assert!(!service.is_running());
        assert_eq!(store.block_count().await, 1);
        assert_eq!(source.blocks.len(), 1);
        let batch = receiver.recv().await.expect("block 1 published");
        assert_eq!(batch.topic, Topic::Markets);
    }

    #[tokio::test]
    async fn test_stop_interrupts_idle_source() {
        let store = Arc::new(MemoryStore::new());
        let (service, _receiver) = build_service(&store, config());
        let service = Arc::new(service);

        let runner = Arc::clone(&service);
        let task = tokio::spawn(async move {
            let mut source = IdleSource;
            let result = runner.run(&mut source).await;
            result
        });
        service.stop();

        let handled = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns after stop")
            .expect("task joins")
            .expect("run succeeds");
        assert_eq!(handled, 0);
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let (service, mut receiver) = build_service(&store, config());
        let payload = UpdatePerpetualEventV1 {
            id: 9,
            ..Default::default()
        }
        .encode_to_vec();

        let err = service
            .handle_block(&block(1, "update_perpetual", payload))
            .await
            .expect_err("market 9 is unknown");

        assert!(matches!(err, IndexerError::Validation(_)));
        assert_eq!(service.metrics().validation_failures(), 1);
        assert_eq!(store.commit_count(), 0);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_consumes_source() {
        let store = Arc::new(MemoryStore::new());
        store
            .commit(WriteSet {
                block: Some(BlockRecord {
                    height: 1,
                    time: DateTime::from_timestamp(1_699_999_000, 0).expect("valid time"),
                }),
                ..Default::default()
            })
            .await
            .expect("seed block");
        let (service, mut receiver) = build_service(&store, config());
        service.start().await.expect("start");

        let frames: Vec<u8> = (1..=3u32)
            .flat_map(|height| {
                encode_frame(&IndexerTendermintBlock {
                    height,
                    time: Some(Timestamp {
                        seconds: 1_700_000_000,
                        nanos: 0,
                    }),
                    events: vec![IndexerTendermintEvent {
                        subtype: "perpetual_market".to_string(),
                        ordering_within_block: Some(OrderingWithinBlock::TransactionIndex(0)),
                        event_index: 0,
                        version: 1,
                        data_bytes: create_payload(height),
                    }],
                    tx_hashes: vec!["tx".to_string()],
                })
            })
            .collect();
        let mut source = FrameBlockSource::new(frames.as_slice());

        let handled = service.run(&mut source).await.expect("run");

        assert_eq!(handled, 3);
        assert!(!service.is_running());
        // block 1 was already committed
        assert_eq!(service.metrics().blocks_skipped(), 1);
        assert_eq!(service.cache().len().await, 2);
        assert_eq!(store.block_count().await, 3);
        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_some());
        assert!(receiver.try_recv().is_err());
    }
}
