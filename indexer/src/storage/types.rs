//! Rows written for every block, and the staged write set.

use std::collections::BTreeMap;

use chainbook_sdk::{Order, PerpetualMarket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block height.
    pub height: u64,
    /// Block time.
    pub time: DateTime<Utc>,
}

/// A transaction of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Block height.
    pub block_height: u64,
    /// Position in the block.
    pub transaction_index: u32,
    /// Transaction hash.
    pub transaction_hash: String,
}

/// An event of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TendermintEventRecord {
    /// Event id, see [`crate::events::types::tendermint_event_id`].
    pub id: Vec<u8>,
    /// Block height.
    pub block_height: u64,
    /// Storage transaction index.
    pub transaction_index: i32,
    /// Event index.
    pub event_index: u32,
}

/// Everything a block writes, applied in one commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    /// The block row.
    pub block: Option<BlockRecord>,
    /// Transaction rows.
    pub transactions: Vec<TransactionRecord>,
    /// Event rows.
    pub events: Vec<TendermintEventRecord>,
    /// Inserted or replaced markets, by id.
    pub markets: BTreeMap<u32, PerpetualMarket>,
    /// Inserted or replaced orders, by id.
    pub orders: BTreeMap<Uuid, Order>,
}

impl WriteSet {
    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.block.is_none()
            && self.transactions.is_empty()
            && self.events.is_empty()
            && self.markets.is_empty()
            && self.orders.is_empty()
    }
}
