//! Block pipeline implementation.
//!
//! Runs one block at a time through `Validating → Handling → Committing →
//! Done`. Any failure moves the pipeline to `Failed` and discards the
//! block's transaction scope, so neither the store nor the cache sees a
//! partial block.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::cursor::BlockCursor;
use super::metrics::PipelineMetrics;
use super::scheduler::{AffinityKeys, ConcurrencyScheduler, Wave};
use super::types::{
    tendermint_event_id, Block, ConsolidatedOutboundEvent, DecodedEvent, ProcessingResult,
};
use crate::cache::MarketCache;
use crate::error::IndexerError;
use crate::handlers::{EventRegistry, Handler, RegistryEntry};
use crate::messages::MessageComposer;
use crate::storage::{
    BlockRecord, Store, TendermintEventRecord, TransactionRecord, TransactionScope,
};
use crate::validators::ValidationContext;

/// Default bound on handlers running at once within a wave.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 16;

/// Pipeline state for the block in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No block processed yet.
    Idle,
    /// Running validators in chain order.
    Validating,
    /// Running handler waves.
    Handling,
    /// Committing the block's writes.
    Committing,
    /// Block committed and composed.
    Done,
    /// Block abandoned.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Handling => "handling",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A decoded event with the pair that processes it.
struct Routed {
    event: DecodedEvent,
    entry: RegistryEntry,
}

/// Processes blocks against a store and market cache.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use chainbook_indexer::cache::MarketCache;
/// use chainbook_indexer::events::BlockPipeline;
/// use chainbook_indexer::handlers::EventRegistry;
/// use chainbook_indexer::storage::MemoryStore;
///
/// let mut pipeline = BlockPipeline::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(MarketCache::new()),
///     Arc::new(EventRegistry::with_defaults()),
/// );
/// let result = pipeline.process_block(&block).await?;
/// println!("{} events in {} waves", result.events_processed, result.waves);
/// ```
pub struct BlockPipeline {
    store: Arc<dyn Store>,
    cache: Arc<MarketCache>,
    registry: Arc<EventRegistry>,
    scheduler: ConcurrencyScheduler,
    composer: MessageComposer,
    cursor: BlockCursor,
    metrics: Arc<PipelineMetrics>,
    max_concurrent_handlers: usize,
    state: PipelineState,
}

impl BlockPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<MarketCache>,
        registry: Arc<EventRegistry>,
    ) -> Self {
        Self {
            store,
            cache,
            registry,
            scheduler: ConcurrencyScheduler::new(),
            composer: MessageComposer::new(),
            cursor: BlockCursor::new(),
            metrics: Arc::new(PipelineMetrics::new()),
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            state: PipelineState::Idle,
        }
    }

    /// Sets the bound on concurrently running handlers.
    #[must_use]
    pub fn with_max_concurrent_handlers(mut self, max: usize) -> Self {
        self.max_concurrent_handlers = max.max(1);
        self
    }

    /// Positions the cursor after `height`.
    #[must_use]
    pub fn with_last_height(mut self, height: Option<u64>) -> Self {
        self.cursor.reset_to(height);
        self
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the cursor.
    #[must_use]
    pub const fn cursor(&self) -> &BlockCursor {
        &self.cursor
    }

    /// Repositions the cursor, e.g. after re-reading the store.
    pub fn reset_cursor(&mut self, height: Option<u64>) {
        self.cursor.reset_to(height);
    }

    /// Returns the state of the last block.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Returns the market cache.
    #[must_use]
    pub fn cache(&self) -> Arc<MarketCache> {
        Arc::clone(&self.cache)
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    fn transition(&mut self, height: u64, next: PipelineState) {
        debug!("Block {}: {} -> {}", height, self.state, next);
        self.state = next;
    }

    /// Processes one block.
    ///
    /// Blocks at or below the last committed height are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first validation, encoding, handler or store error. The
    /// block left no trace in the store or the cache and may be retried.
    pub async fn process_block(&mut self, block: &Block) -> Result<ProcessingResult, IndexerError> {
        if self.cursor.is_processed(block.height) {
            debug!("Skipping block {}: already processed", block.height);
            self.metrics.record_skipped_block();
            return Ok(ProcessingResult::skipped(block.height));
        }

        let start = Instant::now();
        match self.run(block).await {
            Ok(result) => {
                self.metrics.record_block(
                    result.events_processed as u64,
                    result.waves as u64,
                    result.messages.len() as u64,
                    start.elapsed(),
                );
                Ok(result)
            }
            Err(e) => {
                self.transition(block.height, PipelineState::Failed);
                self.metrics.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn run(&mut self, block: &Block) -> Result<ProcessingResult, IndexerError> {
        let height = block.height;

        self.transition(height, PipelineState::Validating);
        let (routed, unknown_events) = self.decode(block)?;
        let mut ctx = ValidationContext::new(Arc::clone(&self.cache), Arc::clone(&self.store), height);
        for item in &routed {
            if let Err(e) = item.entry.validator.validate(&item.event, &ctx).await {
                if let IndexerError::Validation(invalid) = &e {
                    error!(
                        "Validation failed in block {}: {} (event: {:?})",
                        height, invalid.message, invalid.event
                    );
                }
                return Err(e);
            }
            ctx.record(&item.event);
        }

        let mut keys: Vec<AffinityKeys> = Vec::with_capacity(routed.len());
        for item in &routed {
            keys.push(item.entry.handler.affinity_keys(&item.event, &ctx).await);
        }
        let waves = self.scheduler.partition(&keys);

        self.transition(height, PipelineState::Handling);
        let scope = Arc::new(TransactionScope::begin(
            Arc::clone(&self.store),
            height,
            block.time,
        ));
        Self::stage_bookkeeping(block, &scope).await;
        let outputs = self.run_waves(&routed, &waves, &scope).await?;

        self.transition(height, PipelineState::Committing);
        let (writes, cache_upserts) = scope.finish().await;
        self.store.commit(writes).await?;
        for market in cache_upserts {
            self.cache.upsert(market).await;
        }
        self.cursor.mark_processed(height);

        let outbound = MessageComposer::consolidate(outputs.into_iter().flatten().collect());
        let messages = self.composer.compose(&outbound)?;
        self.transition(height, PipelineState::Done);

        info!(
            "Committed block {}: {} events in {} waves, {} messages",
            height,
            routed.len(),
            waves.len(),
            messages.len()
        );

        Ok(ProcessingResult {
            height,
            skipped: false,
            events_processed: routed.len(),
            unknown_events,
            waves: waves.len(),
            outbound,
            messages,
        })
    }

    /// Decodes events in chain order, dropping unknown subtypes.
    fn decode(&self, block: &Block) -> Result<(Vec<Routed>, usize), IndexerError> {
        let mut routed = Vec::with_capacity(block.events.len());
        let mut unknown = 0usize;

        for raw in block.events_in_chain_order() {
            let Some(event) = DecodedEvent::decode(raw)? else {
                error!(
                    "Unknown event subtype {} (v{}) in block {}, skipping",
                    raw.subtype, raw.version, block.height
                );
                self.metrics.record_unknown_event();
                unknown += 1;
                continue;
            };
            let entry = self.registry.get(event.kind()).cloned().ok_or_else(|| {
                IndexerError::Internal(format!("no handler registered for {}", event.kind()))
            })?;
            routed.push(Routed { event, entry });
        }

        Ok((routed, unknown))
    }

    async fn stage_bookkeeping(block: &Block, scope: &TransactionScope) {
        let transactions = block
            .tx_hashes
            .iter()
            .enumerate()
            .map(|(index, hash)| TransactionRecord {
                block_height: block.height,
                transaction_index: u32::try_from(index).unwrap_or(u32::MAX),
                transaction_hash: hash.clone(),
            })
            .collect();
        let events = block
            .events
            .iter()
            .map(|event| TendermintEventRecord {
                id: tendermint_event_id(block.height, event.ordering, event.event_index),
                block_height: block.height,
                transaction_index: event.ordering.storage_transaction_index(),
                event_index: event.event_index,
            })
            .collect();

        scope
            .stage_block(
                BlockRecord {
                    height: block.height,
                    time: block.time,
                },
                transactions,
                events,
            )
            .await;
    }

    /// Runs each wave to completion before starting the next. Returns the
    /// handler outputs indexed like `routed`.
    async fn run_waves(
        &self,
        routed: &[Routed],
        waves: &[Wave],
        scope: &Arc<TransactionScope>,
    ) -> Result<Vec<Vec<ConsolidatedOutboundEvent>>, IndexerError> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_handlers));
        let mut outputs: Vec<Vec<ConsolidatedOutboundEvent>> = vec![Vec::new(); routed.len()];

        for (number, wave) in waves.iter().enumerate() {
            debug!("Wave {}: {} events", number, wave.len());
            let mut tasks = JoinSet::new();

            for &index in wave {
                let Some(item) = routed.get(index) else {
                    return Err(IndexerError::Internal(format!(
                        "wave references missing event {index}"
                    )));
                };
                let handler: Arc<dyn Handler> = Arc::clone(&item.entry.handler);
                let event = item.event.clone();
                let scope = Arc::clone(scope);
                let permits = Arc::clone(&permits);

                tasks.spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| IndexerError::Internal(e.to_string()))?;
                    let out = handler.apply(&event, &scope).await?;
                    Ok::<_, IndexerError>((index, out))
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let (index, out) = match joined {
                    Ok(Ok(done)) => done,
                    Ok(Err(e)) => {
                        tasks.abort_all();
                        return Err(e);
                    }
                    Err(e) => {
                        tasks.abort_all();
                        return Err(IndexerError::Internal(format!("handler task failed: {e}")));
                    }
                };
                if let Some(slot) = outputs.get_mut(index) {
                    *slot = out;
                }
            }
        }

        Ok(outputs)
    }
}
