//! Handler for stateful order events.
//!
//! Placements insert the order, triggers reopen a conditional order and
//! removals cancel it. Every variant emits one subaccount-scoped
//! notification carrying the order as staged.

use async_trait::async_trait;
use chainbook_sdk::proto::indexer_order::GoodTilOneof;
use chainbook_sdk::proto::stateful_order_event_v1::Event as StatefulEvent;
use chainbook_sdk::proto::{IndexerOrder, IndexerOrderId, IndexerSubaccountId};
use chainbook_sdk::{
    is_conditional_order, order_uuid, subaccount_uuid, Order, OrderStatus, OrderType,
    PerpetualMarket, Side, TimeInForce,
};
use chrono::DateTime;
use rust_decimal::Decimal;
use tracing::debug;

use super::{sdk_invalid, Handler};
use crate::error::IndexerError;
use crate::events::scheduler::{AffinityKey, AffinityKeys};
use crate::events::types::{
    ConsolidatedOutboundEvent, DecodedEvent, EventKind, EventPayload, OrderTrigger,
};
use crate::storage::TransactionScope;
use crate::validators::{dispatch_mismatch, invalid, ValidationContext};

const EVENT_NAME: &str = "StatefulOrderEvent";

/// Applies `stateful_order` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatefulOrderHandler;

/// The order id an event refers to, whatever the variant.
fn referenced_order_id(event: &StatefulEvent) -> Option<&IndexerOrderId> {
    match event {
        StatefulEvent::OrderPlace(p) => p.order.as_ref()?.order_id.as_ref(),
        StatefulEvent::LongTermOrderPlacement(p) => p.order.as_ref()?.order_id.as_ref(),
        StatefulEvent::ConditionalOrderPlacement(p) => p.order.as_ref()?.order_id.as_ref(),
        StatefulEvent::OrderRemoval(r) => r.removed_order_id.as_ref(),
        StatefulEvent::ConditionalOrderTriggered(t) => t.triggered_order_id.as_ref(),
    }
}

impl StatefulOrderHandler {
    async fn market_for(
        clob_pair_id: u32,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<PerpetualMarket, IndexerError> {
        scope.market_by_clob_pair(clob_pair_id).await?.ok_or_else(|| {
            invalid(
                format!("{EVENT_NAME} clobPairId {clob_pair_id} does not exist"),
                event,
            )
        })
    }

    /// Builds the stored order for a placement.
    fn build_order(
        order: &IndexerOrder,
        order_id: &IndexerOrderId,
        market: &PerpetualMarket,
        status: OrderStatus,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Order, IndexerError> {
        let subaccount = order_id.subaccount_id.clone().unwrap_or_default();
        let (good_til_block, good_til_block_time) = match order.good_til_oneof {
            Some(GoodTilOneof::GoodTilBlock(block)) => (Some(block), None),
            Some(GoodTilOneof::GoodTilBlockTime(seconds)) => {
                (None, DateTime::from_timestamp(i64::from(seconds), 0))
            }
            None => (None, None),
        };
        let trigger_price = if is_conditional_order(order_id.order_flags)
            && order.conditional_order_trigger_subticks > 0
        {
            Some(
                market
                    .subticks_to_price(order.conditional_order_trigger_subticks)
                    .map_err(|e| sdk_invalid(&e, event))?,
            )
        } else {
            None
        };

        Ok(Order {
            id: order_uuid(order_id),
            subaccount_id: subaccount_uuid(&subaccount.owner, subaccount.number),
            client_id: order_id.client_id,
            clob_pair_id: order_id.clob_pair_id,
            side: Side::from_proto(order.side).map_err(|e| sdk_invalid(&e, event))?,
            size: market
                .quantums_to_size(order.quantums)
                .map_err(|e| sdk_invalid(&e, event))?,
            total_filled: Decimal::ZERO,
            price: market
                .subticks_to_price(order.subticks)
                .map_err(|e| sdk_invalid(&e, event))?,
            order_type: OrderType::from_flags(order_id.order_flags, order.condition_type),
            status,
            time_in_force: TimeInForce::from_proto(order.time_in_force)
                .map_err(|e| sdk_invalid(&e, event))?,
            reduce_only: order.reduce_only,
            order_flags: order_id.order_flags,
            good_til_block,
            good_til_block_time,
            created_at_height: Some(scope.height()),
            client_metadata: order.client_metadata,
            trigger_price,
            updated_at: Some(scope.time()),
            updated_at_height: Some(scope.height()),
        })
    }

    async fn place(
        order: Option<&IndexerOrder>,
        status: OrderStatus,
        trigger: OrderTrigger,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
        let Some((order, order_id)) = order.and_then(|o| Some((o, o.order_id.as_ref()?))) else {
            return Err(invalid(
                format!("{EVENT_NAME} stateful order: Order must contain an orderId"),
                event,
            ));
        };
        let market = Self::market_for(order_id.clob_pair_id, event, scope).await?;
        let record = Self::build_order(order, order_id, &market, status, event, scope)?;
        Self::write(record, order_id, market, trigger, event, scope).await
    }

    async fn transition(
        order_id: &IndexerOrderId,
        status: OrderStatus,
        trigger: OrderTrigger,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
        let id = order_uuid(order_id);
        let Some(mut record) = scope.order(id).await? else {
            return Err(invalid(format!("{EVENT_NAME} order {id} does not exist"), event));
        };
        let market = Self::market_for(record.clob_pair_id, event, scope).await?;

        debug!("Order {} {} -> {}", id, record.status, status);
        record.status = status;
        record.updated_at = Some(scope.time());
        record.updated_at_height = Some(scope.height());

        Self::write(record, order_id, market, trigger, event, scope).await
    }

    async fn write(
        record: Order,
        order_id: &IndexerOrderId,
        market: PerpetualMarket,
        trigger: OrderTrigger,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
        let id = record.id;
        scope.upsert_order(record).await;
        let written = scope
            .order(id)
            .await?
            .ok_or_else(|| IndexerError::Internal(format!("order {id} missing after upsert")))?;
        let subaccount: IndexerSubaccountId = order_id.subaccount_id.clone().unwrap_or_default();

        Ok(vec![ConsolidatedOutboundEvent::order(
            trigger,
            subaccount,
            written,
            market.ticker,
            event,
            scope.height(),
        )])
    }
}

#[async_trait]
impl Handler for StatefulOrderHandler {
    fn kind(&self) -> EventKind {
        EventKind::StatefulOrder
    }

    async fn affinity_keys(&self, event: &DecodedEvent, ctx: &ValidationContext) -> AffinityKeys {
        let EventPayload::StatefulOrder(stateful) = &event.payload else {
            return AffinityKeys::global();
        };
        let Some(order_id) = stateful.event.as_ref().and_then(referenced_order_id) else {
            return AffinityKeys::global();
        };
        let Some(subaccount) = &order_id.subaccount_id else {
            return AffinityKeys::global();
        };

        let keys = AffinityKeys::exclusive([
            AffinityKey::Order(order_uuid(order_id)),
            AffinityKey::Subaccount {
                owner: subaccount.owner.clone(),
                number: subaccount.number,
            },
        ]);
        match ctx.market_id_for_clob_pair(order_id.clob_pair_id).await {
            Some(market) => keys.with_shared([AffinityKey::Market(market)]),
            None => keys,
        }
    }

    async fn apply(
        &self,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
        let EventPayload::StatefulOrder(stateful) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };

        match &stateful.event {
            None => Err(invalid(format!("{EVENT_NAME} has no order event"), event)),
            Some(StatefulEvent::OrderPlace(p)) => {
                Self::place(
                    p.order.as_ref(),
                    OrderStatus::Open,
                    OrderTrigger::Placement,
                    event,
                    scope,
                )
                .await
            }
            Some(StatefulEvent::LongTermOrderPlacement(p)) => {
                Self::place(
                    p.order.as_ref(),
                    OrderStatus::Open,
                    OrderTrigger::Placement,
                    event,
                    scope,
                )
                .await
            }
            Some(StatefulEvent::ConditionalOrderPlacement(p)) => {
                Self::place(
                    p.order.as_ref(),
                    OrderStatus::Untriggered,
                    OrderTrigger::ConditionalPlacement,
                    event,
                    scope,
                )
                .await
            }
            Some(StatefulEvent::ConditionalOrderTriggered(t)) => {
                let Some(order_id) = &t.triggered_order_id else {
                    return Err(invalid(
                        format!("{EVENT_NAME} conditional order triggered must contain an orderId"),
                        event,
                    ));
                };
                Self::transition(
                    order_id,
                    OrderStatus::Open,
                    OrderTrigger::ConditionalTriggered,
                    event,
                    scope,
                )
                .await
            }
            Some(StatefulEvent::OrderRemoval(r)) => {
                let Some(order_id) = &r.removed_order_id else {
                    return Err(invalid(
                        format!("{EVENT_NAME} removal must contain an orderId"),
                        event,
                    ));
                };
                Self::transition(
                    order_id,
                    OrderStatus::Canceled,
                    OrderTrigger::Removal,
                    event,
                    scope,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use super::*;
    use crate::cache::MarketCache;
    use crate::events::types::OutboundKind;
    use crate::storage::{MemoryStore, Store};
    use crate::validators::test_support::{decoded, market};
    use chainbook_sdk::proto::indexer_order::{self, ConditionType};
    use chainbook_sdk::proto::stateful_order_event_v1::{
        ConditionalOrderPlacementV1, ConditionalOrderTriggeredV1, LongTermOrderPlacementV1,
        StatefulOrderRemovalV1,
    };
    use chainbook_sdk::proto::StatefulOrderEventV1;

    fn btc() -> PerpetualMarket {
        let mut m = market(0, 0, "BTC-USD");
        m.quantum_conversion_exponent = -8;
        m.atomic_resolution = -10;
        m
    }

    fn order_id(order_flags: u32) -> IndexerOrderId {
        IndexerOrderId {
            subaccount_id: Some(IndexerSubaccountId {
                owner: "dydx1owner".to_string(),
                number: 1,
            }),
            client_id: 42,
            order_flags,
            clob_pair_id: 0,
        }
    }

    fn order(order_flags: u32) -> IndexerOrder {
        IndexerOrder {
            order_id: Some(order_id(order_flags)),
            side: indexer_order::Side::Sell as i32,
            quantums: 25_000_000_000,
            subticks: 2_000_000_000,
            good_til_oneof: Some(GoodTilOneof::GoodTilBlockTime(1_700_000_600)),
            time_in_force: indexer_order::TimeInForce::PostOnly as i32,
            reduce_only: true,
            client_metadata: 5,
            ..Default::default()
        }
    }

    fn stateful(event: StatefulEvent) -> DecodedEvent {
        decoded(EventPayload::StatefulOrder(StatefulOrderEventV1 {
            event: Some(event),
        }))
    }

    async fn scope(store: Arc<MemoryStore>, height: u64) -> TransactionScope {
        TransactionScope::begin(
            store,
            height,
            DateTime::from_timestamp(1_700_000_000, 0).expect("valid time"),
        )
    }

    fn only_order(outbound: &[ConsolidatedOutboundEvent]) -> (&OrderTrigger, &Order, &str) {
        assert_eq!(outbound.len(), 1);
        match &outbound[0].kind {
            OutboundKind::Order {
                trigger,
                order,
                ticker,
                ..
            } => (trigger, order, ticker.as_str()),
            other => panic!("expected order notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_long_term_placement_opens_order() {
        let store = Arc::new(MemoryStore::new());
        store.seed_market(btc()).await;
        let scope = scope(store, 12).await;
        let event = stateful(StatefulEvent::LongTermOrderPlacement(LongTermOrderPlacementV1 {
            order: Some(order(64)),
        }));

        let outbound = StatefulOrderHandler
            .apply(&event, &scope)
            .await
            .expect("applies");
        let (trigger, placed, ticker) = only_order(&outbound);

        assert_eq!(*trigger, OrderTrigger::Placement);
        assert_eq!(ticker, "BTC-USD");
        assert_eq!(placed.id, order_uuid(&order_id(64)));
        assert_eq!(placed.subaccount_id, subaccount_uuid("dydx1owner", 1));
        assert_eq!(placed.status, OrderStatus::Open);
        assert_eq!(placed.side, Side::Sell);
        assert_eq!(placed.order_type, OrderType::Limit);
        assert_eq!(placed.time_in_force, TimeInForce::PostOnly);
        // 25e9 * 10^-10
        assert_eq!(placed.size, Decimal::from_str("2.5").expect("decimal"));
        // 2e9 * 10^(-8 + 10 - 6)
        assert_eq!(placed.price, Decimal::from_str("200000").expect("decimal"));
        assert_eq!(placed.trigger_price, None);
        assert_eq!(placed.created_at_height, Some(12));
        assert_eq!(placed.good_til_block, None);
        assert_eq!(
            placed.good_til_block_time.map(|t| t.timestamp()),
            Some(1_700_000_600)
        );
        assert_eq!(outbound[0].block_height, Some(12));

        let (writes, upserts) = scope.finish().await;
        assert_eq!(writes.orders.len(), 1);
        assert!(upserts.is_empty());
    }

    #[tokio::test]
    async fn test_conditional_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        store.seed_market(btc()).await;

        let mut conditional = order(32);
        conditional.condition_type = ConditionType::StopLoss as i32;
        conditional.conditional_order_trigger_subticks = 1_900_000_000;
        let placement = stateful(StatefulEvent::ConditionalOrderPlacement(
            ConditionalOrderPlacementV1 {
                order: Some(conditional),
            },
        ));

        let first = scope(Arc::clone(&store), 20).await;
        let outbound = StatefulOrderHandler
            .apply(&placement, &first)
            .await
            .expect("placement applies");
        let (trigger, placed, _) = only_order(&outbound);
        assert_eq!(*trigger, OrderTrigger::ConditionalPlacement);
        assert_eq!(placed.status, OrderStatus::Untriggered);
        assert_eq!(placed.order_type, OrderType::StopLimit);
        assert_eq!(
            placed.trigger_price,
            Some(Decimal::from_str("190000").expect("decimal"))
        );
        let (writes, _) = first.finish().await;
        store.commit(writes).await.expect("commit");

        let triggered = stateful(StatefulEvent::ConditionalOrderTriggered(
            ConditionalOrderTriggeredV1 {
                triggered_order_id: Some(order_id(32)),
            },
        ));
        let second = scope(Arc::clone(&store), 21).await;
        let outbound = StatefulOrderHandler
            .apply(&triggered, &second)
            .await
            .expect("trigger applies");
        let (trigger, reopened, _) = only_order(&outbound);
        assert_eq!(*trigger, OrderTrigger::ConditionalTriggered);
        assert_eq!(reopened.status, OrderStatus::Open);
        assert_eq!(reopened.created_at_height, Some(20));
        assert_eq!(reopened.updated_at_height, Some(21));
    }

    #[tokio::test]
    async fn test_removal_cancels_order_placed_in_same_scope() {
        let store = Arc::new(MemoryStore::new());
        store.seed_market(btc()).await;
        let scope = scope(store, 30).await;

        let placement = stateful(StatefulEvent::OrderPlace(
            chainbook_sdk::proto::stateful_order_event_v1::StatefulOrderPlacementV1 {
                order: Some(order(64)),
            },
        ));
        StatefulOrderHandler
            .apply(&placement, &scope)
            .await
            .expect("placement applies");

        let removal = stateful(StatefulEvent::OrderRemoval(StatefulOrderRemovalV1 {
            removed_order_id: Some(order_id(64)),
            reason: 3,
        }));
        let outbound = StatefulOrderHandler
            .apply(&removal, &scope)
            .await
            .expect("removal applies");
        let (trigger, removed, _) = only_order(&outbound);
        assert_eq!(*trigger, OrderTrigger::Removal);
        assert_eq!(removed.status, OrderStatus::Canceled);

        let (writes, _) = scope.finish().await;
        assert_eq!(writes.orders.len(), 1);
    }

    #[tokio::test]
    async fn test_removal_of_unknown_order_fails() {
        let store = Arc::new(MemoryStore::new());
        store.seed_market(btc()).await;
        let scope = scope(store, 30).await;
        let removal = stateful(StatefulEvent::OrderRemoval(StatefulOrderRemovalV1 {
            removed_order_id: Some(order_id(64)),
            reason: 3,
        }));

        let err = StatefulOrderHandler
            .apply(&removal, &scope)
            .await
            .expect_err("nothing to remove");
        assert!(matches!(err, IndexerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_affinity_keys_for_order_events() {
        let cache = Arc::new(MarketCache::new());
        cache.upsert(btc()).await;
        let ctx = ValidationContext::new(cache, Arc::new(MemoryStore::new()), 1);
        let event = stateful(StatefulEvent::LongTermOrderPlacement(LongTermOrderPlacementV1 {
            order: Some(order(64)),
        }));

        let keys = StatefulOrderHandler.affinity_keys(&event, &ctx).await;
        assert!(keys
            .exclusive
            .contains(&AffinityKey::Order(order_uuid(&order_id(64)))));
        assert!(keys.exclusive.contains(&AffinityKey::Subaccount {
            owner: "dydx1owner".to_string(),
            number: 1,
        }));
        assert!(keys.shared.contains(&AffinityKey::Market(0)));
    }
}
