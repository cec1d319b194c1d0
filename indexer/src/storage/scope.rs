//! Per-block transaction scope.
//!
//! Handlers write through the scope, never to the store directly. Reads see
//! the scope's own staged writes first, then the committed store. The cache
//! upserts handlers request are buffered next to the writes so the pipeline
//! can apply both only after the commit succeeds. Dropping the scope without
//! calling [`TransactionScope::finish`] discards everything.

use std::sync::Arc;

use chainbook_sdk::{Order, PerpetualMarket};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::types::{BlockRecord, TendermintEventRecord, TransactionRecord, WriteSet};
use super::{Store, StoreError};

/// Staged writes and deferred cache upserts of one block.
pub struct TransactionScope {
    store: Arc<dyn Store>,
    height: u64,
    time: DateTime<Utc>,
    staged: Mutex<WriteSet>,
    cache_upserts: Mutex<Vec<PerpetualMarket>>,
}

impl TransactionScope {
    /// Opens a scope for the block at `height`.
    #[must_use]
    pub fn begin(store: Arc<dyn Store>, height: u64, time: DateTime<Utc>) -> Self {
        Self {
            store,
            height,
            time,
            staged: Mutex::new(WriteSet::default()),
            cache_upserts: Mutex::new(Vec::new()),
        }
    }

    /// Height of the block being written.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Time of the block being written.
    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Stages the block's own rows.
    pub async fn stage_block(
        &self,
        block: BlockRecord,
        transactions: Vec<TransactionRecord>,
        events: Vec<TendermintEventRecord>,
    ) {
        let mut staged = self.staged.lock().await;
        staged.block = Some(block);
        staged.transactions.extend(transactions);
        staged.events.extend(events);
    }

    /// Reads a market by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    pub async fn market(&self, id: u32) -> Result<Option<PerpetualMarket>, StoreError> {
        if let Some(market) = self.staged.lock().await.markets.get(&id) {
            return Ok(Some(market.clone()));
        }
        self.store.find_market(id).await
    }

    /// Reads a market by clob pair id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    pub async fn market_by_clob_pair(
        &self,
        clob_pair_id: u32,
    ) -> Result<Option<PerpetualMarket>, StoreError> {
        let staged = self
            .staged
            .lock()
            .await
            .markets
            .values()
            .find(|m| m.clob_pair_id == clob_pair_id)
            .cloned();
        match staged {
            Some(market) => Ok(Some(market)),
            None => self.store.find_market_by_clob_pair(clob_pair_id).await,
        }
    }

    /// Stages an insert or replace of a market.
    pub async fn upsert_market(&self, market: PerpetualMarket) {
        self.staged.lock().await.markets.insert(market.id, market);
    }

    /// Reads an order by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    pub async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        if let Some(order) = self.staged.lock().await.orders.get(&id) {
            return Ok(Some(order.clone()));
        }
        self.store.find_order(id).await
    }

    /// Stages an insert or replace of an order.
    pub async fn upsert_order(&self, order: Order) {
        self.staged.lock().await.orders.insert(order.id, order);
    }

    /// Buffers a cache upsert, applied only after the block commits.
    pub async fn defer_cache_upsert(&self, market: PerpetualMarket) {
        self.cache_upserts.lock().await.push(market);
    }

    /// Takes the staged writes and buffered cache upserts, leaving the scope
    /// empty.
    pub async fn finish(&self) -> (WriteSet, Vec<PerpetualMarket>) {
        let writes = std::mem::take(&mut *self.staged.lock().await);
        let upserts = std::mem::take(&mut *self.cache_upserts.lock().await);
        (writes, upserts)
    }
}
