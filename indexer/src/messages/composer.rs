//! Construction of outbound envelopes.
//!
//! Order changes become one `SubaccountMessage` each, keyed by the encoded
//! subaccount id. Market changes of a block are merged into a single
//! `MarketMessage` keyed by ticker.

use std::collections::{BTreeMap, HashMap};

use chainbook_sdk::proto::{IndexerSubaccountId, MarketMessage, SubaccountMessage};
use chainbook_sdk::{Order, OrderStatus, OrderType, PerpetualMarket, Side, TimeInForce};
use chrono::{DateTime, SecondsFormat, Utc};
use prost::Message;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{OutboundMessage, Topic};
use crate::error::IndexerError;
use crate::events::types::{ConsolidatedOutboundEvent, OrderTrigger, OutboundKind};

/// Envelope version of subaccount messages.
pub const SUBACCOUNTS_MESSAGE_VERSION: u32 = 3;

/// Envelope version of market messages.
pub const MARKETS_MESSAGE_VERSION: u32 = 1;

/// One order as published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderContents {
    /// Order id.
    pub id: Uuid,
    /// Subaccount id.
    pub subaccount_id: Uuid,
    /// Client nonce.
    pub client_id: String,
    /// Clob pair id.
    pub pair_id: String,
    /// Order side.
    pub side: Side,
    /// Size in whole base units.
    pub size: Decimal,
    /// Limit price.
    pub price: Decimal,
    /// Status implied by the triggering event.
    pub status: OrderStatus,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Outbound time in force.
    pub time_in_force: TimeInForce,
    /// Maker-only flag.
    pub post_only: bool,
    /// Reduce-only flag.
    pub reduce_only: bool,
    /// Placement flags.
    pub order_flags: String,
    /// Expiry block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_til_block: Option<String>,
    /// Expiry time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_til_block_time: Option<String>,
    /// Market ticker.
    pub ticker: String,
    /// Placement height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_height: Option<String>,
    /// Time of the last change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Height of the last change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_height: Option<String>,
    /// Client metadata.
    pub client_metadata: String,
    /// Trigger price of conditional orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
}

/// Contents of a subaccount message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubaccountContents {
    /// Changed orders.
    pub orders: Vec<OrderContents>,
    /// Height of the block that changed them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<String>,
}

fn iso_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialization_error(err: serde_json::Error) -> IndexerError {
    IndexerError::Internal(format!("cannot serialize message contents: {err}"))
}

/// Builds outbound envelopes from notification records.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageComposer;

impl MessageComposer {
    /// Creates a composer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Status published for an order change.
    #[must_use]
    pub const fn status_for(trigger: OrderTrigger) -> OrderStatus {
        match trigger {
            OrderTrigger::Placement | OrderTrigger::ConditionalTriggered => OrderStatus::Open,
            OrderTrigger::ConditionalPlacement => OrderStatus::Untriggered,
            OrderTrigger::Removal => OrderStatus::Canceled,
        }
    }

    /// Outbound view of a stored order.
    #[must_use]
    pub fn order_contents(order: &Order, ticker: &str, status: OrderStatus) -> OrderContents {
        OrderContents {
            id: order.id,
            subaccount_id: order.subaccount_id,
            client_id: order.client_id.to_string(),
            pair_id: order.clob_pair_id.to_string(),
            side: order.side,
            size: order.size,
            price: order.price,
            status,
            order_type: order.order_type,
            time_in_force: order.time_in_force.outbound(),
            post_only: order.time_in_force.is_post_only(),
            reduce_only: order.reduce_only,
            order_flags: order.order_flags.to_string(),
            good_til_block: order.good_til_block.map(|b| b.to_string()),
            good_til_block_time: order.good_til_block_time.map(iso_time),
            ticker: ticker.to_string(),
            created_at_height: order.created_at_height.map(|h| h.to_string()),
            updated_at: order.updated_at.map(iso_time),
            updated_at_height: order.updated_at_height.map(|h| h.to_string()),
            client_metadata: order.client_metadata.to_string(),
            trigger_price: order.trigger_price,
        }
    }

    /// Merges market records of the same market into the last one, so a
    /// block reports each market once with its final value.
    #[must_use]
    pub fn consolidate(outbound: Vec<ConsolidatedOutboundEvent>) -> Vec<ConsolidatedOutboundEvent> {
        let mut last: HashMap<u32, usize> = HashMap::new();
        for (index, record) in outbound.iter().enumerate() {
            if let OutboundKind::Market { market } = &record.kind {
                last.insert(market.id, index);
            }
        }

        outbound
            .into_iter()
            .enumerate()
            .filter(|(index, record)| match &record.kind {
                OutboundKind::Market { market } => last.get(&market.id) == Some(index),
                OutboundKind::Order { .. } => true,
            })
            .map(|(_, record)| record)
            .collect()
    }

    /// Composes the messages for a committed block's records, given in
    /// chain order.
    ///
    /// # Errors
    ///
    /// Returns an error if contents cannot be serialized.
    pub fn compose(
        &self,
        outbound: &[ConsolidatedOutboundEvent],
    ) -> Result<Vec<OutboundMessage>, IndexerError> {
        let mut messages = Vec::new();
        let mut markets: BTreeMap<String, Value> = BTreeMap::new();

        for record in outbound {
            match &record.kind {
                OutboundKind::Order {
                    trigger,
                    subaccount_id,
                    order,
                    ticker,
                } => {
                    messages.push(self.subaccount_message(
                        record,
                        *trigger,
                        subaccount_id,
                        order,
                        ticker,
                    )?);
                }
                OutboundKind::Market { market } => Self::merge_market(&mut markets, market)?,
            }
        }

        if !markets.is_empty() {
            messages.push(self.market_message(markets)?);
        }
        Ok(messages)
    }

    fn merge_market(
        markets: &mut BTreeMap<String, Value>,
        market: &PerpetualMarket,
    ) -> Result<(), IndexerError> {
        let Value::Object(fields) = serde_json::to_value(market).map_err(serialization_error)?
        else {
            return Err(IndexerError::Internal(
                "market did not serialize to an object".to_string(),
            ));
        };
        match markets.get_mut(&market.ticker) {
            Some(Value::Object(existing)) => existing.extend(fields),
            _ => {
                markets.insert(market.ticker.clone(), Value::Object(fields));
            }
        }
        Ok(())
    }

    fn subaccount_message(
        &self,
        record: &ConsolidatedOutboundEvent,
        trigger: OrderTrigger,
        subaccount_id: &IndexerSubaccountId,
        order: &Order,
        ticker: &str,
    ) -> Result<OutboundMessage, IndexerError> {
        let contents = SubaccountContents {
            orders: vec![Self::order_contents(order, ticker, Self::status_for(trigger))],
            block_height: record.block_height.map(|h| h.to_string()),
        };
        let envelope = SubaccountMessage {
            block_height: record.block_height.map(|h| h.to_string()).unwrap_or_default(),
            transaction_index: record.transaction_index,
            event_index: record.event_index,
            contents: serde_json::to_string(&contents).map_err(serialization_error)?,
            subaccount_id: Some(subaccount_id.clone()),
            version: SUBACCOUNTS_MESSAGE_VERSION,
        };

        Ok(OutboundMessage {
            topic: Topic::Subaccounts,
            key: subaccount_id.encode_to_vec(),
            value: envelope.encode_to_vec(),
        })
    }

    fn market_message(
        &self,
        markets: BTreeMap<String, Value>,
    ) -> Result<OutboundMessage, IndexerError> {
        let mut contents = Map::new();
        contents.insert("trading".to_string(), Value::Object(markets.into_iter().collect()));
        let envelope = MarketMessage {
            contents: Value::Object(contents).to_string(),
            version: MARKETS_MESSAGE_VERSION,
        };

        Ok(OutboundMessage {
            topic: Topic::Markets,
            key: Vec::new(),
            value: envelope.encode_to_vec(),
        })
    }
}
