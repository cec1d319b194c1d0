//! In-memory store.
//!
//! Backs tests and dry runs. Commits are atomic: a write set is checked
//! against the current tables before any of it is applied.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chainbook_sdk::{Order, PerpetualMarket};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{BlockRecord, TendermintEventRecord, TransactionRecord, WriteSet};
use super::{Store, StoreError};

#[derive(Debug, Default)]
struct Tables {
    blocks: BTreeMap<u64, BlockRecord>,
    transactions: Vec<TransactionRecord>,
    events: BTreeMap<Vec<u8>, TendermintEventRecord>,
    markets: BTreeMap<u32, PerpetualMarket>,
    orders: HashMap<Uuid, Order>,
}

/// Store keeping all tables in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing_commits: AtomicU32,
    corrupt_commits: AtomicU32,
    commits: AtomicU32,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a market directly, outside any block.
    pub async fn seed_market(&self, market: PerpetualMarket) {
        self.tables.write().await.markets.insert(market.id, market);
    }

    /// Makes the next `count` commits fail with [`StoreError::Unavailable`].
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::Relaxed);
    }

    /// Makes the next `count` commits fail with [`StoreError::Corrupt`].
    pub fn corrupt_next_commits(&self, count: u32) {
        self.corrupt_commits.store(count, Ordering::Relaxed);
    }

    /// Number of successful commits.
    #[must_use]
    pub fn commit_count(&self) -> u32 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Number of stored blocks.
    pub async fn block_count(&self) -> usize {
        self.tables.read().await.blocks.len()
    }

    /// Number of stored transactions.
    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }

    /// Number of stored events.
    pub async fn event_count(&self) -> usize {
        self.tables.read().await.events.len()
    }

    /// Number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    fn take_injected(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_markets(&self) -> Result<Vec<PerpetualMarket>, StoreError> {
        Ok(self.tables.read().await.markets.values().cloned().collect())
    }

    async fn find_market(&self, id: u32) -> Result<Option<PerpetualMarket>, StoreError> {
        Ok(self.tables.read().await.markets.get(&id).cloned())
    }

    async fn find_market_by_clob_pair(
        &self,
        clob_pair_id: u32,
    ) -> Result<Option<PerpetualMarket>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .markets
            .values()
            .find(|m| m.clob_pair_id == clob_pair_id)
            .cloned())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn latest_block_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.tables.read().await.blocks.keys().next_back().copied())
    }

    async fn commit(&self, writes: WriteSet) -> Result<(), StoreError> {
        if Self::take_injected(&self.failing_commits) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        if Self::take_injected(&self.corrupt_commits) {
            return Err(StoreError::Corrupt("injected corrupt row".to_string()));
        }

        let mut tables = self.tables.write().await;

        if let Some(block) = &writes.block {
            if tables.blocks.contains_key(&block.height) {
                return Err(StoreError::Constraint(format!(
                    "block {} already exists",
                    block.height
                )));
            }
        }
        if let Some(event) = writes.events.iter().find(|e| tables.events.contains_key(&e.id)) {
            return Err(StoreError::Constraint(format!(
                "event {:?} already exists",
                event.id
            )));
        }

        if let Some(block) = writes.block {
            tables.blocks.insert(block.height, block);
        }
        tables.transactions.extend(writes.transactions);
        for event in writes.events {
            tables.events.insert(event.id.clone(), event);
        }
        tables.markets.extend(writes.markets);
        tables.orders.extend(writes.orders);

        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
