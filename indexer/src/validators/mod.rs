//! Per-kind event validation.
//!
//! Validators run in chain order before any handler, against the market
//! cache, the committed store and what earlier events of the same block
//! have already established. They never write.
//!
//! # Components
//!
//! - [`ValidationContext`]: Read view of cache, store and pending block state
//! - [`Validator`]: Contract implemented once per event kind
//! - [`market`]: Market create and update validators
//! - [`stateful_order`]: Stateful order validator

pub mod market;
pub mod stateful_order;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chainbook_sdk::proto::stateful_order_event_v1::Event as StatefulEvent;
use chainbook_sdk::order_uuid;
use uuid::Uuid;

use crate::cache::MarketCache;
use crate::error::{IndexerError, ValidationError};
use crate::events::types::{DecodedEvent, EventKind, EventPayload};
use crate::storage::{Store, StoreError};

pub use market::{PerpetualMarketCreateValidator, UpdateClobPairValidator, UpdatePerpetualValidator};
pub use stateful_order::StatefulOrderValidator;

/// Read view used while validating one block.
///
/// Besides the cache and the store, the context remembers markets and orders
/// created by events already validated in this block, so that a later event
/// may reference them before the block commits.
pub struct ValidationContext {
    cache: Arc<MarketCache>,
    store: Arc<dyn Store>,
    block_height: u64,
    pending_markets: HashMap<u32, u32>,
    pending_clob_pairs: HashMap<u32, u32>,
    pending_orders: HashSet<Uuid>,
}

impl ValidationContext {
    /// Creates a context for the block at `block_height`.
    #[must_use]
    pub fn new(cache: Arc<MarketCache>, store: Arc<dyn Store>, block_height: u64) -> Self {
        Self {
            cache,
            store,
            block_height,
            pending_markets: HashMap::new(),
            pending_clob_pairs: HashMap::new(),
            pending_orders: HashSet::new(),
        }
    }

    /// Height of the block being validated.
    #[must_use]
    pub const fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Returns true if a market with this id exists.
    pub async fn market_exists(&self, id: u32) -> bool {
        self.pending_markets.contains_key(&id) || self.cache.get_by_id(id).await.is_some()
    }

    /// Resolves a clob pair id to its market id.
    pub async fn market_id_for_clob_pair(&self, clob_pair_id: u32) -> Option<u32> {
        if let Some(id) = self.pending_clob_pairs.get(&clob_pair_id) {
            return Some(*id);
        }
        self.cache
            .get_by_clob_pair_id(clob_pair_id)
            .await
            .map(|market| market.id)
    }

    /// Returns true if an order with this id exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    pub async fn order_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        if self.pending_orders.contains(&id) {
            return Ok(true);
        }
        Ok(self.store.find_order(id).await?.is_some())
    }

    /// Records what a validated event creates.
    pub fn record(&mut self, event: &DecodedEvent) {
        match &event.payload {
            EventPayload::PerpetualMarketCreate(create) => {
                self.pending_markets.insert(create.id, create.clob_pair_id);
                self.pending_clob_pairs.insert(create.clob_pair_id, create.id);
            }
            EventPayload::StatefulOrder(stateful) => {
                let placed = match &stateful.event {
                    Some(StatefulEvent::OrderPlace(p)) => p.order.as_ref(),
                    Some(StatefulEvent::LongTermOrderPlacement(p)) => p.order.as_ref(),
                    Some(StatefulEvent::ConditionalOrderPlacement(p)) => p.order.as_ref(),
                    _ => None,
                };
                if let Some(order_id) = placed.and_then(|order| order.order_id.as_ref()) {
                    self.pending_orders.insert(order_uuid(order_id));
                }
            }
            EventPayload::UpdatePerpetual(_) | EventPayload::UpdateClobPair(_) => {}
        }
    }
}

/// Semantic checks for one event kind.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Kind this validator accepts.
    fn kind(&self) -> EventKind;

    /// Checks the event against the context.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Validation`] if a precondition does not hold,
    /// or a store error if a lookup fails.
    async fn validate(&self, event: &DecodedEvent, ctx: &ValidationContext)
        -> Result<(), IndexerError>;
}

/// Builds a validation failure for `event`.
pub(crate) fn invalid(message: impl Into<String>, event: &DecodedEvent) -> IndexerError {
    IndexerError::Validation(ValidationError::new(message, event))
}

/// Error for an event routed to the wrong validator or handler.
pub(crate) fn dispatch_mismatch(expected: EventKind, event: &DecodedEvent) -> IndexerError {
    IndexerError::Internal(format!(
        "{} routed to the {expected} pipeline",
        event.kind()
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chainbook_sdk::{MarketType, PerpetualMarket, PerpetualMarketStatus};

    use crate::events::types::{DecodedEvent, EventOrdering, EventPayload};

    pub fn market(id: u32, clob_pair_id: u32, ticker: &str) -> PerpetualMarket {
        PerpetualMarket {
            id,
            clob_pair_id,
            ticker: ticker.to_string(),
            market_id: id,
            status: PerpetualMarketStatus::Active,
            quantum_conversion_exponent: -9,
            atomic_resolution: -10,
            subticks_per_tick: 10_000,
            step_base_quantums: 1_000_000,
            liquidity_tier: 0,
            market_type: MarketType::Cross,
        }
    }

    pub fn decoded(payload: EventPayload) -> DecodedEvent {
        DecodedEvent {
            ordering: EventOrdering::Transaction(0),
            event_index: 0,
            version: 1,
            payload,
        }
    }
}
