//! Protobuf wire messages exchanged with the chain and downstream consumers.
//!
//! Field numbers follow the chain's published schema; the order-id encoding in
//! particular feeds the order hash and must not drift.
//!
//! # Components
//!
//! - [`clob`]: Subaccount ids, order ids, orders and their enumerations
//! - [`events`]: Event payloads carried inside blocks
//! - [`block`]: Inbound block and event framing
//! - [`socks`]: Outbound notification envelopes

pub mod block;
pub mod clob;
pub mod events;
pub mod socks;

pub use block::{BlockEvent, IndexerTendermintBlock, IndexerTendermintEvent, Timestamp};
pub use clob::{indexer_order, ClobPairStatus, IndexerOrder, IndexerOrderId, IndexerSubaccountId};
pub use events::{
    stateful_order_event_v1, PerpetualMarketCreateEventV1, PerpetualMarketType, StatefulOrderEventV1,
    UpdateClobPairEventV1, UpdatePerpetualEventV1,
};
pub use socks::{MarketMessage, SubaccountMessage};
