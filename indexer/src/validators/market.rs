//! Validators for market creation and updates.

use async_trait::async_trait;
use chainbook_sdk::{MarketType, PerpetualMarketStatus};

use super::{dispatch_mismatch, invalid, ValidationContext, Validator};
use crate::error::IndexerError;
use crate::events::types::{DecodedEvent, EventKind, EventPayload};

/// Validates `perpetual_market` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerpetualMarketCreateValidator;

#[async_trait]
impl Validator for PerpetualMarketCreateValidator {
    fn kind(&self) -> EventKind {
        EventKind::PerpetualMarketCreate
    }

    async fn validate(
        &self,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        let EventPayload::PerpetualMarketCreate(create) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };
        let name = self.kind().event_name();

        if ctx.market_exists(create.id).await {
            return Err(invalid(format!("{name} id {} already exists", create.id), event));
        }
        if ctx.market_id_for_clob_pair(create.clob_pair_id).await.is_some() {
            return Err(invalid(
                format!("{name} clobPairId {} already exists", create.clob_pair_id),
                event,
            ));
        }
        if create.ticker.is_empty() {
            return Err(invalid(format!("{name} ticker must not be empty"), event));
        }
        if PerpetualMarketStatus::from_clob_pair_status(create.status).is_err() {
            return Err(invalid(format!("{name} status is invalid"), event));
        }
        if event.version >= 2 && MarketType::from_proto(create.market_type).is_err() {
            return Err(invalid(format!("{name} marketType is invalid"), event));
        }
        Ok(())
    }
}

/// Validates `update_perpetual` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdatePerpetualValidator;

#[async_trait]
impl Validator for UpdatePerpetualValidator {
    fn kind(&self) -> EventKind {
        EventKind::UpdatePerpetual
    }

    async fn validate(
        &self,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        let EventPayload::UpdatePerpetual(update) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };

        if !ctx.market_exists(update.id).await {
            return Err(invalid(
                format!("{} id {} does not exist", self.kind().event_name(), update.id),
                event,
            ));
        }
        Ok(())
    }
}

/// Validates `update_clob_pair` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateClobPairValidator;

#[async_trait]
impl Validator for UpdateClobPairValidator {
    fn kind(&self) -> EventKind {
        EventKind::UpdateClobPair
    }

    async fn validate(
        &self,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        let EventPayload::UpdateClobPair(update) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };
        let name = self.kind().event_name();

        if ctx.market_id_for_clob_pair(update.clob_pair_id).await.is_none() {
            return Err(invalid(
                format!("{name} clobPairId {} does not exist", update.clob_pair_id),
                event,
            ));
        }
        if PerpetualMarketStatus::from_clob_pair_status(update.status).is_err() {
            return Err(invalid(format!("{name} status is invalid"), event));
        }
        Ok(())
    }
}
