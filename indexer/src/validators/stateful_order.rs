//! Validator for stateful order events.
//!
//! Checks the shape of the order carried by each variant, the placement
//! flags each variant requires, and that referenced markets and orders
//! exist.

use async_trait::async_trait;
use chainbook_sdk::proto::indexer_order::{ConditionType, GoodTilOneof, Side};
use chainbook_sdk::proto::stateful_order_event_v1::Event as StatefulEvent;
use chainbook_sdk::proto::{IndexerOrder, IndexerOrderId};
use chainbook_sdk::order_id::ORDER_FLAG_TWAP_SUBORDER;
use chainbook_sdk::{is_conditional_order, is_long_term_order, order_uuid};

use super::{dispatch_mismatch, invalid, ValidationContext, Validator};
use crate::error::IndexerError;
use crate::events::types::{DecodedEvent, EventKind, EventPayload};

const EVENT_NAME: &str = "StatefulOrderEvent";

/// Validates `stateful_order` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatefulOrderValidator;

impl StatefulOrderValidator {
    /// Checks fields every stateful order must carry.
    fn validate_order_shape(
        order: Option<&IndexerOrder>,
        event: &DecodedEvent,
    ) -> Result<(), IndexerError> {
        let prefix = format!("{EVENT_NAME} stateful order:");
        let Some(order) = order else {
            return Err(invalid(format!("{prefix} Order must contain an orderId"), event));
        };
        let Some(order_id) = &order.order_id else {
            return Err(invalid(format!("{prefix} Order must contain an orderId"), event));
        };
        if order_id.subaccount_id.is_none() {
            return Err(invalid(
                format!("{prefix} OrderId must contain a subaccountId"),
                event,
            ));
        }
        if !matches!(Side::try_from(order.side), Ok(Side::Buy | Side::Sell)) {
            return Err(invalid(
                format!("{prefix} Order must specify an order side"),
                event,
            ));
        }
        let Some(good_til) = &order.good_til_oneof else {
            return Err(invalid(
                format!("{prefix} Order must contain a defined goodTilOneof"),
                event,
            ));
        };
        if !matches!(good_til, GoodTilOneof::GoodTilBlockTime(_)) {
            return Err(invalid(
                format!("{prefix} order must have goodTilBlockTime"),
                event,
            ));
        }
        Ok(())
    }

    async fn validate_market(
        order_id: &IndexerOrderId,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        if ctx.market_id_for_clob_pair(order_id.clob_pair_id).await.is_none() {
            return Err(invalid(
                format!(
                    "{EVENT_NAME} clobPairId {} does not exist",
                    order_id.clob_pair_id
                ),
                event,
            ));
        }
        Ok(())
    }

    async fn validate_order_exists(
        order_id: &IndexerOrderId,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        let id = order_uuid(order_id);
        if !ctx.order_exists(id).await? {
            return Err(invalid(format!("{EVENT_NAME} order {id} does not exist"), event));
        }
        Ok(())
    }

    async fn validate_long_term_placement(
        order: Option<&IndexerOrder>,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        Self::validate_order_shape(order, event)?;
        let Some(order_id) = order.and_then(|o| o.order_id.as_ref()) else {
            return Err(invalid(
                format!("{EVENT_NAME} stateful order: Order must contain an orderId"),
                event,
            ));
        };
        // TWAP suborders are placed through the long-term path.
        if !is_long_term_order(order_id.order_flags)
            && order_id.order_flags != ORDER_FLAG_TWAP_SUBORDER
        {
            return Err(invalid(
                format!("{EVENT_NAME} long term order must have order flag 64 or 256"),
                event,
            ));
        }
        Self::validate_market(order_id, event, ctx).await
    }

    async fn validate_conditional_placement(
        order: Option<&IndexerOrder>,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        Self::validate_order_shape(order, event)?;
        let (Some(order), Some(order_id)) = (order, order.and_then(|o| o.order_id.as_ref()))
        else {
            return Err(invalid(
                format!("{EVENT_NAME} stateful order: Order must contain an orderId"),
                event,
            ));
        };
        if !is_conditional_order(order_id.order_flags) {
            return Err(invalid(
                format!("{EVENT_NAME} conditional order must have order flag 32"),
                event,
            ));
        }
        if order.conditional_order_trigger_subticks == 0 {
            return Err(invalid(
                format!("{EVENT_NAME} conditional order must have trigger price > 0"),
                event,
            ));
        }
        if !matches!(
            ConditionType::try_from(order.condition_type),
            Ok(ConditionType::StopLoss | ConditionType::TakeProfit)
        ) {
            return Err(invalid(
                format!("{EVENT_NAME} conditional order must have valid condition type"),
                event,
            ));
        }
        Self::validate_market(order_id, event, ctx).await
    }
}

#[async_trait]
impl Validator for StatefulOrderValidator {
    fn kind(&self) -> EventKind {
        EventKind::StatefulOrder
    }

    async fn validate(
        &self,
        event: &DecodedEvent,
        ctx: &ValidationContext,
    ) -> Result<(), IndexerError> {
        let EventPayload::StatefulOrder(stateful) = &event.payload else {
            return Err(dispatch_mismatch(self.kind(), event));
        };

        match &stateful.event {
            None => Err(invalid(
                format!(
                    "One of orderPlace, orderRemoval, conditionalOrderPlacement, \
                     conditionalOrderTriggered, or longTermOrderPlacement must be defined in \
                     {EVENT_NAME}"
                ),
                event,
            )),
            Some(StatefulEvent::OrderPlace(placement)) => {
                Self::validate_long_term_placement(placement.order.as_ref(), event, ctx).await
            }
            Some(StatefulEvent::LongTermOrderPlacement(placement)) => {
                Self::validate_long_term_placement(placement.order.as_ref(), event, ctx).await
            }
            Some(StatefulEvent::ConditionalOrderPlacement(placement)) => {
                Self::validate_conditional_placement(placement.order.as_ref(), event, ctx).await
            }
            Some(StatefulEvent::OrderRemoval(removal)) => {
                let Some(order_id) = &removal.removed_order_id else {
                    return Err(invalid(
                        format!("{EVENT_NAME} removal must contain an orderId"),
                        event,
                    ));
                };
                if removal.reason <= 0 {
                    return Err(invalid(
                        format!("{EVENT_NAME} removal must contain a valid reason"),
                        event,
                    ));
                }
                Self::validate_order_exists(order_id, event, ctx).await
            }
            Some(StatefulEvent::ConditionalOrderTriggered(triggered)) => {
                let Some(order_id) = &triggered.triggered_order_id else {
                    return Err(invalid(
                        format!("{EVENT_NAME} conditional order triggered must contain an orderId"),
                        event,
                    ));
                };
                if !is_conditional_order(order_id.order_flags) {
                    return Err(invalid(
                        format!(
                            "{EVENT_NAME} conditional order triggered must have order flag 32"
                        ),
                        event,
                    ));
                }
                Self::validate_order_exists(order_id, event, ctx).await
            }
        }
    }
}
