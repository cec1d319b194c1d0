//! Handlers for market creation and updates.

use async_trait::async_trait;
use chainbook_sdk::{MarketType, PerpetualMarket, PerpetualMarketStatus};

use super::{sdk_invalid, Handler};
use crate::error::IndexerError;
use crate::events::scheduler::{AffinityKey, AffinityKeys};
use crate::events::types::{ConsolidatedOutboundEvent, DecodedEvent, EventKind, EventPayload};
use crate::storage::TransactionScope;
use crate::validators::{dispatch_mismatch, invalid, ValidationContext};

/// Stages `market`, reads it back and queues the read-back value for the
/// cache.
async fn write_market(
    market: PerpetualMarket,
    event: &DecodedEvent,
    scope: &TransactionScope,
) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
    let id = market.id;
    scope.upsert_market(market).await;
    let written = scope.market(id).await?.ok_or_else(|| {
        IndexerError::Internal(format!("market {id} missing after upsert"))
    })?;
    scope.defer_cache_upsert(written.clone()).await;
    Ok(vec![ConsolidatedOutboundEvent::market(written, event)])
}

/// Applies `perpetual_market` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerpetualMarketCreateHandler;

#[async_trait]
impl Handler for PerpetualMarketCreateHandler {
    fn kind(&self) -> EventKind {
        EventKind::PerpetualMarketCreate
    }

    async fn affinity_keys(&self, event: &DecodedEvent, _ctx: &ValidationContext) -> AffinityKeys {
        match &event.payload {
            EventPayload::PerpetualMarketCreate(create) => {
                AffinityKeys::exclusive([AffinityKey::Market(create.id)])
            }
            _ => AffinityKeys::global(),
        }
    }

    async fn apply(
        &self,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
        let EventPayload::PerpetualMarketCreate(create) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };

        let status = PerpetualMarketStatus::from_clob_pair_status(create.status)
            .map_err(|e| sdk_invalid(&e, event))?;
        // v1 payloads predate isolated markets
        let market_type = if event.version >= 2 {
            MarketType::from_proto(create.market_type).map_err(|e| sdk_invalid(&e, event))?
        } else {
            MarketType::Cross
        };

        let market = PerpetualMarket {
            id: create.id,
            clob_pair_id: create.clob_pair_id,
            ticker: create.ticker.clone(),
            market_id: create.market_id,
            status,
            quantum_conversion_exponent: create.quantum_conversion_exponent,
            atomic_resolution: create.atomic_resolution,
            subticks_per_tick: create.subticks_per_tick,
            step_base_quantums: create.step_base_quantums,
            liquidity_tier: create.liquidity_tier,
            market_type,
        };
        write_market(market, event, scope).await
    }
}

/// Applies `update_perpetual` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdatePerpetualHandler;

#[async_trait]
impl Handler for UpdatePerpetualHandler {
    fn kind(&self) -> EventKind {
        EventKind::UpdatePerpetual
    }

    async fn affinity_keys(&self, event: &DecodedEvent, _ctx: &ValidationContext) -> AffinityKeys {
        match &event.payload {
            EventPayload::UpdatePerpetual(update) => {
                AffinityKeys::exclusive([AffinityKey::Market(update.id)])
            }
            _ => AffinityKeys::global(),
        }
    }

    async fn apply(
        &self,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
        let EventPayload::UpdatePerpetual(update) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };

        let Some(mut market) = scope.market(update.id).await? else {
            return Err(invalid(
                format!("{} id {} does not exist", self.kind().event_name(), update.id),
                event,
            ));
        };
        market.ticker.clone_from(&update.ticker);
        market.market_id = update.market_id;
        market.atomic_resolution = update.atomic_resolution;
        market.liquidity_tier = update.liquidity_tier;

        write_market(market, event, scope).await
    }
}

/// Applies `update_clob_pair` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateClobPairHandler;

#[async_trait]
impl Handler for UpdateClobPairHandler {
    fn kind(&self) -> EventKind {
        EventKind::UpdateClobPair
    }

    async fn affinity_keys(&self, event: &DecodedEvent, ctx: &ValidationContext) -> AffinityKeys {
        let EventPayload::UpdateClobPair(update) = &event.payload else {
            return AffinityKeys::global();
        };
        // keyed by market id so it orders against update_perpetual
        match ctx.market_id_for_clob_pair(update.clob_pair_id).await {
            Some(id) => AffinityKeys::exclusive([AffinityKey::Market(id)]),
            None => AffinityKeys::global(),
        }
    }

    async fn apply(
        &self,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError> {
        let EventPayload::UpdateClobPair(update) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };

        let Some(mut market) = scope.market_by_clob_pair(update.clob_pair_id).await? else {
            return Err(invalid(
                format!(
                    "{} clobPairId {} does not exist",
                    self.kind().event_name(),
                    update.clob_pair_id
                ),
                event,
            ));
        };
        market.status = PerpetualMarketStatus::from_clob_pair_status(update.status)
            .map_err(|e| sdk_invalid(&e, event))?;
        market.quantum_conversion_exponent = update.quantum_conversion_exponent;
        market.subticks_per_tick = update.subticks_per_tick;
        market.step_base_quantums = update.step_base_quantums;

        write_market(market, event, scope).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::MarketCache;
    use crate::events::types::OutboundKind;
    use crate::storage::MemoryStore;
    use crate::validators::test_support::{decoded, market};
    use chainbook_sdk::proto::{
        ClobPairStatus, PerpetualMarketCreateEventV1, PerpetualMarketType, UpdateClobPairEventV1,
        UpdatePerpetualEventV1,
    };
    use chrono::DateTime;

    async fn scope_with(markets: Vec<PerpetualMarket>) -> TransactionScope {
        let store = Arc::new(MemoryStore::new());
        for m in markets {
            store.seed_market(m).await;
        }
        TransactionScope::begin(
            store,
            50,
            DateTime::from_timestamp(1_700_000_000, 0).expect("valid time"),
        )
    }

    fn create_event(version: u32, market_type: PerpetualMarketType) -> DecodedEvent {
        let mut event = decoded(EventPayload::PerpetualMarketCreate(
            PerpetualMarketCreateEventV1 {
                id: 3,
                clob_pair_id: 30,
                ticker: "SOL-USD".to_string(),
                market_id: 3,
                status: ClobPairStatus::Initializing as i32,
                quantum_conversion_exponent: -8,
                atomic_resolution: -7,
                subticks_per_tick: 1_000,
                step_base_quantums: 1_000_000,
                liquidity_tier: 2,
                market_type: market_type as i32,
            },
        ));
        event.version = version;
        event
    }

    fn market_of(outbound: &ConsolidatedOutboundEvent) -> &PerpetualMarket {
        match &outbound.kind {
            OutboundKind::Market { market } => market,
            other => panic!("expected market notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_stages_market_and_cache_upsert() {
        let scope = scope_with(Vec::new()).await;
        let event = create_event(2, PerpetualMarketType::Isolated);

        let outbound = PerpetualMarketCreateHandler
            .apply(&event, &scope)
            .await
            .expect("applies");
        assert_eq!(outbound.len(), 1);
        let created = market_of(&outbound[0]);
        assert_eq!(created.ticker, "SOL-USD");
        assert_eq!(created.status, PerpetualMarketStatus::Initializing);
        assert_eq!(created.market_type, MarketType::Isolated);

        let (writes, upserts) = scope.finish().await;
        assert_eq!(writes.markets.get(&3), Some(created));
        assert_eq!(upserts, vec![created.clone()]);
    }

    #[tokio::test]
    async fn test_create_v1_defaults_to_cross() {
        let scope = scope_with(Vec::new()).await;
        let event = create_event(1, PerpetualMarketType::Isolated);

        let outbound = PerpetualMarketCreateHandler
            .apply(&event, &scope)
            .await
            .expect("applies");
        assert_eq!(market_of(&outbound[0]).market_type, MarketType::Cross);
    }

    #[tokio::test]
    async fn test_update_perpetual_replaces_perpetual_fields() {
        let scope = scope_with(vec![market(1, 10, "BTC-USD")]).await;
        let event = decoded(EventPayload::UpdatePerpetual(UpdatePerpetualEventV1 {
            id: 1,
            ticker: "XBT-USD".to_string(),
            market_id: 9,
            atomic_resolution: -8,
            liquidity_tier: 3,
        }));

        let outbound = UpdatePerpetualHandler
            .apply(&event, &scope)
            .await
            .expect("applies");
        let updated = market_of(&outbound[0]);
        assert_eq!(updated.ticker, "XBT-USD");
        assert_eq!(updated.market_id, 9);
        assert_eq!(updated.atomic_resolution, -8);
        assert_eq!(updated.liquidity_tier, 3);
        assert_eq!(updated.clob_pair_id, 10);
    }

    #[tokio::test]
    async fn test_update_clob_pair_replaces_pair_fields() {
        let scope = scope_with(vec![market(1, 10, "BTC-USD")]).await;
        let event = decoded(EventPayload::UpdateClobPair(UpdateClobPairEventV1 {
            clob_pair_id: 10,
            status: ClobPairStatus::FinalSettlement as i32,
            quantum_conversion_exponent: -7,
            subticks_per_tick: 5,
            step_base_quantums: 50,
        }));

        let outbound = UpdateClobPairHandler
            .apply(&event, &scope)
            .await
            .expect("applies");
        let updated = market_of(&outbound[0]);
        assert_eq!(updated.status, PerpetualMarketStatus::FinalSettlement);
        assert_eq!(updated.quantum_conversion_exponent, -7);
        assert_eq!(updated.subticks_per_tick, 5);
        assert_eq!(updated.step_base_quantums, 50);
        assert_eq!(updated.ticker, "BTC-USD");
    }

    #[tokio::test]
    async fn test_update_of_missing_market_fails() {
        let scope = scope_with(Vec::new()).await;
        let event = decoded(EventPayload::UpdatePerpetual(UpdatePerpetualEventV1 {
            id: 4,
            ..Default::default()
        }));

        let err = UpdatePerpetualHandler
            .apply(&event, &scope)
            .await
            .expect_err("market 4 is unknown");
        assert!(matches!(err, IndexerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_updates_share_market_key() {
        let cache = Arc::new(MarketCache::new());
        cache.upsert(market(1, 10, "BTC-USD")).await;
        let ctx = ValidationContext::new(cache, Arc::new(MemoryStore::new()), 50);

        let perpetual = decoded(EventPayload::UpdatePerpetual(UpdatePerpetualEventV1 {
            id: 1,
            ..Default::default()
        }));
        let clob_pair = decoded(EventPayload::UpdateClobPair(UpdateClobPairEventV1 {
            clob_pair_id: 10,
            ..Default::default()
        }));

        assert_eq!(
            UpdatePerpetualHandler.affinity_keys(&perpetual, &ctx).await,
            UpdateClobPairHandler.affinity_keys(&clob_pair, &ctx).await
        );
    }
}
