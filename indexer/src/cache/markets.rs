//! Read-optimized mirror of perpetual markets.
//!
//! Entries are addressed by perpetual id and by clob pair id. The cache only
//! changes through [`MarketCache::load_all`] and [`MarketCache::upsert`]; it
//! never drops or invalidates an entry on its own. Callers upsert only after
//! the corresponding write is committed, so reads are never ahead of the
//! store.

use std::collections::HashMap;

use chainbook_sdk::PerpetualMarket;
use tokio::sync::RwLock;
use tracing::info;

use crate::storage::{Store, StoreError};

#[derive(Debug, Default)]
struct MarketIndex {
    by_id: HashMap<u32, PerpetualMarket>,
    id_by_clob_pair: HashMap<u32, u32>,
}

impl MarketIndex {
    fn insert(&mut self, market: PerpetualMarket) {
        if let Some(previous) = self.by_id.get(&market.id) {
            if previous.clob_pair_id != market.clob_pair_id {
                self.id_by_clob_pair.remove(&previous.clob_pair_id);
            }
        }
        self.id_by_clob_pair.insert(market.clob_pair_id, market.id);
        self.by_id.insert(market.id, market);
    }
}

/// Cache of perpetual markets.
#[derive(Debug, Default)]
pub struct MarketCache {
    index: RwLock<MarketIndex>,
}

impl MarketCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache contents with every market in the store.
    ///
    /// The previous contents stay readable until the new set is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read; the cache is unchanged.
    pub async fn load_all(&self, store: &dyn Store) -> Result<usize, StoreError> {
        let markets = store.load_markets().await?;
        let mut fresh = MarketIndex::default();
        for market in markets {
            fresh.insert(market);
        }
        let count = fresh.by_id.len();
        *self.index.write().await = fresh;
        info!("Loaded {} perpetual markets into cache", count);
        Ok(count)
    }

    /// Inserts or replaces a market, keyed by its id, and updates the clob
    /// pair index.
    pub async fn upsert(&self, market: PerpetualMarket) {
        self.index.write().await.insert(market);
    }

    /// Looks up a market by perpetual id.
    pub async fn get_by_id(&self, id: u32) -> Option<PerpetualMarket> {
        self.index.read().await.by_id.get(&id).cloned()
    }

    /// Looks up a market by clob pair id.
    pub async fn get_by_clob_pair_id(&self, clob_pair_id: u32) -> Option<PerpetualMarket> {
        let index = self.index.read().await;
        index
            .id_by_clob_pair
            .get(&clob_pair_id)
            .and_then(|id| index.by_id.get(id))
            .cloned()
    }

    /// Returns all markets ordered by id.
    pub async fn all(&self) -> Vec<PerpetualMarket> {
        let mut markets: Vec<PerpetualMarket> =
            self.index.read().await.by_id.values().cloned().collect();
        markets.sort_by_key(|m| m.id);
        markets
    }

    /// Number of cached markets.
    pub async fn len(&self) -> usize {
        self.index.read().await.by_id.len()
    }

    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.index.read().await.by_id.is_empty()
    }

    /// Empties the cache. Meant for tests and resets.
    pub async fn clear(&self) {
        *self.index.write().await = MarketIndex::default();
    }
}
