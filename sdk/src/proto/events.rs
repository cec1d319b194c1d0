//! Event payloads carried in a block's `data_bytes`.

use super::clob::{IndexerOrder, IndexerOrderId};

/// A new perpetual market and its clob pair.
///
/// Version 2 appends `market_type`; version 1 payloads leave it unset.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PerpetualMarketCreateEventV1 {
    /// Perpetual id.
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Clob pair id.
    #[prost(uint32, tag = "2")]
    pub clob_pair_id: u32,
    /// Market ticker, e.g. `BTC-USD`.
    #[prost(string, tag = "3")]
    pub ticker: ::prost::alloc::string::String,
    /// Oracle market id.
    #[prost(uint32, tag = "4")]
    pub market_id: u32,
    /// Initial clob pair status.
    #[prost(enumeration = "super::clob::ClobPairStatus", tag = "5")]
    pub status: i32,
    /// Exponent converting subticks to quote quantums.
    #[prost(sint32, tag = "6")]
    pub quantum_conversion_exponent: i32,
    /// Exponent converting base quantums to whole units.
    #[prost(sint32, tag = "7")]
    pub atomic_resolution: i32,
    /// Subticks per price tick.
    #[prost(uint32, tag = "8")]
    pub subticks_per_tick: u32,
    /// Minimum order size step in base quantums.
    #[prost(uint64, tag = "9")]
    pub step_base_quantums: u64,
    /// Liquidity tier id.
    #[prost(uint32, tag = "10")]
    pub liquidity_tier: u32,
    /// Margin model, present from version 2.
    #[prost(enumeration = "PerpetualMarketType", tag = "11")]
    pub market_type: i32,
}

/// Margin model of a perpetual market.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PerpetualMarketType {
    /// Unset; treated as cross margin.
    Unspecified = 0,
    /// Cross margined.
    Cross = 1,
    /// Isolated margin.
    Isolated = 2,
}

/// Updates perpetual level parameters of an existing market.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdatePerpetualEventV1 {
    /// Perpetual id.
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// New ticker.
    #[prost(string, tag = "2")]
    pub ticker: ::prost::alloc::string::String,
    /// New oracle market id.
    #[prost(uint32, tag = "3")]
    pub market_id: u32,
    /// New atomic resolution.
    #[prost(sint32, tag = "4")]
    pub atomic_resolution: i32,
    /// New liquidity tier.
    #[prost(uint32, tag = "5")]
    pub liquidity_tier: u32,
}

/// Updates clob pair level parameters of an existing market.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateClobPairEventV1 {
    /// Clob pair id.
    #[prost(uint32, tag = "1")]
    pub clob_pair_id: u32,
    /// New status.
    #[prost(enumeration = "super::clob::ClobPairStatus", tag = "2")]
    pub status: i32,
    /// New quantum conversion exponent.
    #[prost(sint32, tag = "3")]
    pub quantum_conversion_exponent: i32,
    /// New subticks per tick.
    #[prost(uint32, tag = "4")]
    pub subticks_per_tick: u32,
    /// New step base quantums.
    #[prost(uint64, tag = "5")]
    pub step_base_quantums: u64,
}

/// Lifecycle change of a stateful (conditional or long-term) order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatefulOrderEventV1 {
    /// Which lifecycle change occurred.
    #[prost(oneof = "stateful_order_event_v1::Event", tags = "1, 4, 5, 6, 7")]
    pub event: ::core::option::Option<stateful_order_event_v1::Event>,
}

/// Nested types for [`StatefulOrderEventV1`].
pub mod stateful_order_event_v1 {
    use super::{IndexerOrder, IndexerOrderId};

    /// Placement of a stateful order.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatefulOrderPlacementV1 {
        /// Placed order.
        #[prost(message, optional, tag = "1")]
        pub order: ::core::option::Option<IndexerOrder>,
    }

    /// Removal of a stateful order.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatefulOrderRemovalV1 {
        /// Removed order id.
        #[prost(message, optional, tag = "1")]
        pub removed_order_id: ::core::option::Option<IndexerOrderId>,
        /// Removal reason; zero is unspecified.
        #[prost(int32, tag = "2")]
        pub reason: i32,
    }

    /// Placement of a conditional order, not yet triggered.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ConditionalOrderPlacementV1 {
        /// Placed order.
        #[prost(message, optional, tag = "1")]
        pub order: ::core::option::Option<IndexerOrder>,
    }

    /// A conditional order's trigger fired.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ConditionalOrderTriggeredV1 {
        /// Triggered order id.
        #[prost(message, optional, tag = "1")]
        pub triggered_order_id: ::core::option::Option<IndexerOrderId>,
    }

    /// Placement of a long-term order.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LongTermOrderPlacementV1 {
        /// Placed order.
        #[prost(message, optional, tag = "1")]
        pub order: ::core::option::Option<IndexerOrder>,
    }

    /// Stateful order lifecycle variants.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Event {
        /// Legacy stateful placement.
        #[prost(message, tag = "1")]
        OrderPlace(StatefulOrderPlacementV1),
        /// Removal.
        #[prost(message, tag = "4")]
        OrderRemoval(StatefulOrderRemovalV1),
        /// Conditional placement.
        #[prost(message, tag = "5")]
        ConditionalOrderPlacement(ConditionalOrderPlacementV1),
        /// Conditional trigger.
        #[prost(message, tag = "6")]
        ConditionalOrderTriggered(ConditionalOrderTriggeredV1),
        /// Long-term placement.
        #[prost(message, tag = "7")]
        LongTermOrderPlacement(LongTermOrderPlacementV1),
    }
}
