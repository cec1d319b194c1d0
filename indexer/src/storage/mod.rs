//! Persistent storage for indexed state.
//!
//! The pipeline only depends on the [`Store`] contract: key lookups plus an
//! all-or-nothing [`Store::commit`] of a block's [`WriteSet`].
//!
//! # Components
//!
//! - [`types`]: Block, transaction and event rows plus the staged write set
//! - [`scope`]: Per-block transaction scope with a read-through overlay
//! - [`memory`]: In-memory store
//! - [`postgres`]: Postgres store backed by sqlx

pub mod memory;
pub mod postgres;
pub mod scope;
pub mod types;

use async_trait::async_trait;
use chainbook_sdk::{Order, PerpetualMarket};
use uuid::Uuid;

pub use crate::error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use scope::TransactionScope;
pub use types::{BlockRecord, TendermintEventRecord, TransactionRecord, WriteSet};

/// Transaction and key-lookup contract over the persistent store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns every market, ordered by id.
    async fn load_markets(&self) -> Result<Vec<PerpetualMarket>, StoreError>;

    /// Finds a market by perpetual id.
    async fn find_market(&self, id: u32) -> Result<Option<PerpetualMarket>, StoreError>;

    /// Finds a market by clob pair id.
    async fn find_market_by_clob_pair(
        &self,
        clob_pair_id: u32,
    ) -> Result<Option<PerpetualMarket>, StoreError>;

    /// Finds an order by id.
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Height of the last committed block.
    async fn latest_block_height(&self) -> Result<Option<u64>, StoreError>;

    /// Applies a block's writes atomically.
    async fn commit(&self, writes: WriteSet) -> Result<(), StoreError>;
}
