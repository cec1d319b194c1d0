//! Types for block processing.
//!
//! Provides the inbound block and event model, the decoded per-kind event
//! payloads, the notification records handlers produce, and the result of
//! processing one block.

use std::fmt;

use chainbook_sdk::proto::block::indexer_tendermint_event::OrderingWithinBlock;
use chainbook_sdk::proto::{
    BlockEvent, IndexerSubaccountId, IndexerTendermintBlock, IndexerTendermintEvent,
    PerpetualMarketCreateEventV1, StatefulOrderEventV1, UpdateClobPairEventV1,
    UpdatePerpetualEventV1,
};
use chainbook_sdk::{Order, PerpetualMarket};
use chrono::{DateTime, Utc};
use prost::Message;
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;
use crate::messages::OutboundMessage;

/// Position of an event within its block.
///
/// Variant order is chain order: begin-block events, then transaction
/// events, then end-block events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventOrdering {
    /// Emitted before any transaction.
    BeginBlock,
    /// Emitted by the transaction at this index.
    Transaction(u32),
    /// Emitted after all transactions.
    EndBlock,
}

impl EventOrdering {
    /// Transaction index, absent for block-level events.
    #[must_use]
    pub const fn transaction_index(&self) -> Option<u32> {
        match self {
            Self::Transaction(index) => Some(*index),
            Self::BeginBlock | Self::EndBlock => None,
        }
    }

    /// Transaction index as persisted: `-2` for begin-block and `-1` for
    /// end-block events.
    #[must_use]
    pub fn storage_transaction_index(&self) -> i32 {
        match self {
            Self::BeginBlock => -2,
            Self::EndBlock => -1,
            Self::Transaction(index) => i32::try_from(*index).unwrap_or(i32::MAX),
        }
    }
}

/// An event as received, payload still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Kind discriminator.
    pub subtype: String,
    /// Payload schema version.
    pub version: u32,
    /// Position in the block.
    pub ordering: EventOrdering,
    /// Tiebreaker within the transaction or block phase.
    pub event_index: u32,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

impl Event {
    /// Sort key giving chain order.
    #[must_use]
    pub const fn chain_position(&self) -> (EventOrdering, u32) {
        (self.ordering, self.event_index)
    }
}

impl TryFrom<IndexerTendermintEvent> for Event {
    type Error = EncodingError;

    fn try_from(event: IndexerTendermintEvent) -> Result<Self, Self::Error> {
        let ordering = match event.ordering_within_block {
            Some(OrderingWithinBlock::TransactionIndex(index)) => EventOrdering::Transaction(index),
            Some(OrderingWithinBlock::BlockEvent(phase)) => match BlockEvent::try_from(phase) {
                Ok(BlockEvent::BeginBlock) => EventOrdering::BeginBlock,
                Ok(BlockEvent::EndBlock) => EventOrdering::EndBlock,
                _ => {
                    return Err(EncodingError::new(
                        event.subtype,
                        event.version,
                        format!("invalid block event {phase}"),
                    ))
                }
            },
            None => {
                return Err(EncodingError::new(
                    event.subtype,
                    event.version,
                    "event has neither a transaction index nor a block event",
                ))
            }
        };

        Ok(Self {
            subtype: event.subtype,
            version: event.version,
            ordering,
            event_index: event.event_index,
            payload: event.data_bytes,
        })
    }
}

/// A block of events in the order the chain produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block height.
    pub height: u64,
    /// Block time.
    pub time: DateTime<Utc>,
    /// Events, in any order; see [`Block::events_in_chain_order`].
    pub events: Vec<Event>,
    /// Transaction hashes indexed by transaction position.
    pub tx_hashes: Vec<String>,
}

impl Block {
    /// Returns the events sorted into chain order.
    #[must_use]
    pub fn events_in_chain_order(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.iter().collect();
        events.sort_by_key(|event| event.chain_position());
        events
    }
}

impl TryFrom<IndexerTendermintBlock> for Block {
    type Error = EncodingError;

    fn try_from(block: IndexerTendermintBlock) -> Result<Self, Self::Error> {
        let time = block
            .time
            .and_then(|t| {
                let nanos = u32::try_from(t.nanos).ok()?;
                DateTime::from_timestamp(t.seconds, nanos)
            })
            .ok_or_else(|| EncodingError::new("block", 0, "missing or invalid block time"))?;

        let events = block
            .events
            .into_iter()
            .map(Event::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            height: u64::from(block.height),
            time,
            events,
            tx_hashes: block.tx_hashes,
        })
    }
}

/// Persisted id of an event: height, shifted storage transaction index and
/// event index, all big-endian.
#[must_use]
pub fn tendermint_event_id(height: u64, ordering: EventOrdering, event_index: u32) -> Vec<u8> {
    // storage index is >= -2, so the shifted value is never negative
    let shifted = u32::try_from(i64::from(ordering.storage_transaction_index()) + 2).unwrap_or(0);
    let mut id = Vec::with_capacity(16);
    id.extend_from_slice(&height.to_be_bytes());
    id.extend_from_slice(&shifted.to_be_bytes());
    id.extend_from_slice(&event_index.to_be_bytes());
    id
}

/// Event kinds the indexer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// A new perpetual market.
    PerpetualMarketCreate,
    /// Perpetual parameters of an existing market changed.
    UpdatePerpetual,
    /// Clob pair parameters of an existing market changed.
    UpdateClobPair,
    /// Stateful order lifecycle change.
    StatefulOrder,
}

impl EventKind {
    /// All kinds.
    pub const ALL: [Self; 4] = [
        Self::PerpetualMarketCreate,
        Self::UpdatePerpetual,
        Self::UpdateClobPair,
        Self::StatefulOrder,
    ];

    /// Looks up a kind by its subtype string.
    #[must_use]
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.subtype() == subtype)
    }

    /// Subtype string on the wire.
    #[must_use]
    pub const fn subtype(&self) -> &'static str {
        match self {
            Self::PerpetualMarketCreate => "perpetual_market",
            Self::UpdatePerpetual => "update_perpetual",
            Self::UpdateClobPair => "update_clob_pair",
            Self::StatefulOrder => "stateful_order",
        }
    }

    /// Name used in validation messages.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::PerpetualMarketCreate => "PerpetualMarketCreateEvent",
            Self::UpdatePerpetual => "UpdatePerpetualEvent",
            Self::UpdateClobPair => "UpdateClobPairEvent",
            Self::StatefulOrder => "StatefulOrderEvent",
        }
    }

    /// Payload versions with a known schema.
    #[must_use]
    pub const fn supports_version(&self, version: u32) -> bool {
        match self {
            Self::PerpetualMarketCreate => matches!(version, 1 | 2),
            Self::UpdatePerpetual | Self::UpdateClobPair | Self::StatefulOrder => version == 1,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subtype())
    }
}

/// Decoded payload, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// See [`EventKind::PerpetualMarketCreate`].
    PerpetualMarketCreate(PerpetualMarketCreateEventV1),
    /// See [`EventKind::UpdatePerpetual`].
    UpdatePerpetual(UpdatePerpetualEventV1),
    /// See [`EventKind::UpdateClobPair`].
    UpdateClobPair(UpdateClobPairEventV1),
    /// See [`EventKind::StatefulOrder`].
    StatefulOrder(StatefulOrderEventV1),
}

impl EventPayload {
    /// Kind of this payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PerpetualMarketCreate(_) => EventKind::PerpetualMarketCreate,
            Self::UpdatePerpetual(_) => EventKind::UpdatePerpetual,
            Self::UpdateClobPair(_) => EventKind::UpdateClobPair,
            Self::StatefulOrder(_) => EventKind::StatefulOrder,
        }
    }
}

/// An event with its payload decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Position in the block.
    pub ordering: EventOrdering,
    /// Tiebreaker within the transaction or block phase.
    pub event_index: u32,
    /// Schema version the payload was decoded with.
    pub version: u32,
    /// Decoded payload.
    pub payload: EventPayload,
}

impl DecodedEvent {
    /// Decodes an event. Returns `Ok(None)` for subtypes this indexer does
    /// not know.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] if the version has no schema or the
    /// payload bytes do not decode.
    pub fn decode(event: &Event) -> Result<Option<Self>, EncodingError> {
        let Some(kind) = EventKind::from_subtype(&event.subtype) else {
            return Ok(None);
        };

        if !kind.supports_version(event.version) {
            return Err(EncodingError::new(
                &event.subtype,
                event.version,
                "unsupported version",
            ));
        }

        let bytes = event.payload.as_slice();
        let payload = match kind {
            EventKind::PerpetualMarketCreate => {
                PerpetualMarketCreateEventV1::decode(bytes).map(EventPayload::PerpetualMarketCreate)
            }
            EventKind::UpdatePerpetual => {
                UpdatePerpetualEventV1::decode(bytes).map(EventPayload::UpdatePerpetual)
            }
            EventKind::UpdateClobPair => {
                UpdateClobPairEventV1::decode(bytes).map(EventPayload::UpdateClobPair)
            }
            EventKind::StatefulOrder => {
                StatefulOrderEventV1::decode(bytes).map(EventPayload::StatefulOrder)
            }
        }
        .map_err(|e| EncodingError::new(&event.subtype, event.version, e.to_string()))?;

        Ok(Some(Self {
            ordering: event.ordering,
            event_index: event.event_index,
            version: event.version,
            payload,
        }))
    }

    /// Kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Which lifecycle change produced an order notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderTrigger {
    /// Long-term placement.
    Placement,
    /// Conditional placement, awaiting its trigger.
    ConditionalPlacement,
    /// Conditional order triggered.
    ConditionalTriggered,
    /// Stateful order removed.
    Removal,
}

/// Kind-specific contents of a notification record.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundKind {
    /// A market was created or changed.
    Market {
        /// Market as persisted.
        market: PerpetualMarket,
    },
    /// An order changed.
    Order {
        /// Lifecycle change that produced the record.
        trigger: OrderTrigger,
        /// Subaccount the order belongs to.
        subaccount_id: IndexerSubaccountId,
        /// Order as persisted.
        order: Order,
        /// Ticker of the order's market.
        ticker: String,
    },
}

/// A change notification produced by a handler, before composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedOutboundEvent {
    /// What changed.
    pub kind: OutboundKind,
    /// Block height, carried by subaccount-scoped notifications.
    pub block_height: Option<u64>,
    /// Storage transaction index of the producing event.
    pub transaction_index: i32,
    /// Index of the producing event.
    pub event_index: u32,
}

impl ConsolidatedOutboundEvent {
    /// Notification for a market change.
    #[must_use]
    pub fn market(market: PerpetualMarket, event: &DecodedEvent) -> Self {
        Self {
            kind: OutboundKind::Market { market },
            block_height: None,
            transaction_index: event.ordering.storage_transaction_index(),
            event_index: event.event_index,
        }
    }

    /// Notification for an order change.
    #[must_use]
    pub fn order(
        trigger: OrderTrigger,
        subaccount_id: IndexerSubaccountId,
        order: Order,
        ticker: String,
        event: &DecodedEvent,
        block_height: u64,
    ) -> Self {
        Self {
            kind: OutboundKind::Order {
                trigger,
                subaccount_id,
                order,
                ticker,
            },
            block_height: Some(block_height),
            transaction_index: event.ordering.storage_transaction_index(),
            event_index: event.event_index,
        }
    }
}

/// Result of processing one block.
#[derive(Debug, Clone, Default)]
pub struct ProcessingResult {
    /// Block height.
    pub height: u64,
    /// True if the block was at or below the last committed height.
    pub skipped: bool,
    /// Events validated and handled.
    pub events_processed: usize,
    /// Events with an unknown subtype.
    pub unknown_events: usize,
    /// Waves executed.
    pub waves: usize,
    /// Notification records in chain order.
    pub outbound: Vec<ConsolidatedOutboundEvent>,
    /// Composed messages, ready for the transport.
    pub messages: Vec<OutboundMessage>,
}

impl ProcessingResult {
    /// Result for a block that was not processed again.
    #[must_use]
    pub fn skipped(height: u64) -> Self {
        Self {
            height,
            skipped: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbook_sdk::proto::Timestamp;

    fn event(subtype: &str, version: u32, ordering: EventOrdering, event_index: u32) -> Event {
        Event {
            subtype: subtype.to_string(),
            version,
            ordering,
            event_index,
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_chain_order() {
        let block = Block {
            height: 5,
            time: DateTime::from_timestamp(0, 0).expect("epoch"),
            events: vec![
                event("a", 1, EventOrdering::EndBlock, 0),
                event("b", 1, EventOrdering::Transaction(1), 0),
                event("c", 1, EventOrdering::Transaction(0), 1),
                event("d", 1, EventOrdering::BeginBlock, 0),
                event("e", 1, EventOrdering::Transaction(0), 0),
            ],
            tx_hashes: vec!["h0".to_string(), "h1".to_string()],
        };

        let order: Vec<&str> = block
            .events_in_chain_order()
            .iter()
            .map(|e| e.subtype.as_str())
            .collect();
        assert_eq!(order, vec!["d", "e", "c", "b", "a"]);
    }

    #[test]
    fn test_storage_transaction_index() {
        assert_eq!(EventOrdering::BeginBlock.storage_transaction_index(), -2);
        assert_eq!(EventOrdering::EndBlock.storage_transaction_index(), -1);
        assert_eq!(EventOrdering::Transaction(3).storage_transaction_index(), 3);
        assert_eq!(EventOrdering::Transaction(3).transaction_index(), Some(3));
        assert_eq!(EventOrdering::EndBlock.transaction_index(), None);
    }

    #[test]
    fn test_tendermint_event_id() {
        let id = tendermint_event_id(1, EventOrdering::BeginBlock, 2);
        assert_eq!(id, vec![0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2]);

        let id = tendermint_event_id(258, EventOrdering::Transaction(1), 0);
        assert_eq!(id, vec![0, 0, 0, 0, 0, 0, 1, 2, 0, 0, 0, 3, 0, 0, 0, 0]);
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(
            EventKind::from_subtype("update_clob_pair"),
            Some(EventKind::UpdateClobPair)
        );
        assert_eq!(EventKind::from_subtype("transfer"), None);
        assert!(EventKind::PerpetualMarketCreate.supports_version(2));
        assert!(!EventKind::UpdatePerpetual.supports_version(2));
    }

    #[test]
    fn test_decode_unknown_subtype_is_none() {
        let decoded = DecodedEvent::decode(&event("transfer", 1, EventOrdering::Transaction(0), 0));
        assert_eq!(decoded, Ok(None));
    }

    #[test]
    fn test_decode_unknown_version_is_error() {
        let decoded =
            DecodedEvent::decode(&event("update_perpetual", 3, EventOrdering::Transaction(0), 0));
        assert!(decoded.is_err());
    }

    #[test]
    fn test_decode_malformed_payload_is_error() {
        let mut bad = event("update_perpetual", 1, EventOrdering::Transaction(0), 0);
        bad.payload = vec![0x0a, 0xff];
        assert!(DecodedEvent::decode(&bad).is_err());
    }

    #[test]
    fn test_decode_update_perpetual() {
        let payload = UpdatePerpetualEventV1 {
            id: 4,
            ticker: "ETH-USD".to_string(),
            market_id: 1,
            atomic_resolution: -9,
            liquidity_tier: 1,
        };
        let mut raw = event("update_perpetual", 1, EventOrdering::Transaction(2), 3);
        raw.payload = payload.encode_to_vec();

        let decoded = DecodedEvent::decode(&raw).expect("decodes").expect("known kind");
        assert_eq!(decoded.kind(), EventKind::UpdatePerpetual);
        assert_eq!(decoded.payload, EventPayload::UpdatePerpetual(payload));
        assert_eq!(decoded.ordering, EventOrdering::Transaction(2));
        assert_eq!(decoded.event_index, 3);
    }

    #[test]
    fn test_block_from_proto() {
        let proto = IndexerTendermintBlock {
            height: 12,
            time: Some(Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            }),
            events: vec![IndexerTendermintEvent {
                subtype: "stateful_order".to_string(),
                ordering_within_block: Some(OrderingWithinBlock::BlockEvent(
                    BlockEvent::EndBlock as i32,
                )),
                event_index: 0,
                version: 1,
                data_bytes: Vec::new(),
            }],
            tx_hashes: Vec::new(),
        };

        let block = Block::try_from(proto).expect("valid block");
        assert_eq!(block.height, 12);
        assert_eq!(block.time.timestamp(), 1_700_000_000);
        assert_eq!(block.events.len(), 1);
        assert_eq!(block.events[0].ordering, EventOrdering::EndBlock);
    }

    #[test]
    fn test_block_event_without_ordering_is_error() {
        let proto = IndexerTendermintEvent {
            subtype: "stateful_order".to_string(),
            ordering_within_block: None,
            event_index: 0,
            version: 1,
            data_bytes: Vec::new(),
        };
        assert!(Event::try_from(proto).is_err());
    }
}
