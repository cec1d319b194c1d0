//! Order and subaccount identity messages.

/// Identifies a subaccount: an owner address plus a sub-ledger number.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct IndexerSubaccountId {
    /// Owner address.
    #[prost(string, tag = "1")]
    pub owner: ::prost::alloc::string::String,
    /// Subaccount number under the owner.
    #[prost(uint32, tag = "2")]
    pub number: u32,
}

/// Identifies an order on chain.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct IndexerOrderId {
    /// Owning subaccount.
    #[prost(message, optional, tag = "1")]
    pub subaccount_id: ::core::option::Option<IndexerSubaccountId>,
    /// Client chosen nonce.
    #[prost(fixed32, tag = "2")]
    pub client_id: u32,
    /// Placement flags (short-term, conditional, long-term, ...).
    #[prost(uint32, tag = "3")]
    pub order_flags: u32,
    /// Pair the order trades on.
    #[prost(uint32, tag = "4")]
    pub clob_pair_id: u32,
}

/// A full order as emitted by the chain.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexerOrder {
    /// Order identity.
    #[prost(message, optional, tag = "1")]
    pub order_id: ::core::option::Option<IndexerOrderId>,
    /// Buy or sell.
    #[prost(enumeration = "indexer_order::Side", tag = "2")]
    pub side: i32,
    /// Size in base quantums.
    #[prost(uint64, tag = "3")]
    pub quantums: u64,
    /// Price in subticks.
    #[prost(uint64, tag = "4")]
    pub subticks: u64,
    /// Expiry, by block or by time.
    #[prost(oneof = "indexer_order::GoodTilOneof", tags = "5, 6")]
    pub good_til_oneof: ::core::option::Option<indexer_order::GoodTilOneof>,
    /// Time in force.
    #[prost(enumeration = "indexer_order::TimeInForce", tag = "7")]
    pub time_in_force: i32,
    /// Whether the order may only reduce a position.
    #[prost(bool, tag = "8")]
    pub reduce_only: bool,
    /// Opaque client metadata.
    #[prost(uint32, tag = "9")]
    pub client_metadata: u32,
    /// Trigger condition for conditional orders.
    #[prost(enumeration = "indexer_order::ConditionType", tag = "10")]
    pub condition_type: i32,
    /// Trigger price in subticks for conditional orders.
    #[prost(uint64, tag = "11")]
    pub conditional_order_trigger_subticks: u64,
}

/// Nested types for [`IndexerOrder`].
pub mod indexer_order {
    /// Order side.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Side {
        /// Unset.
        Unspecified = 0,
        /// Bid.
        Buy = 1,
        /// Ask.
        Sell = 2,
    }

    /// Time in force.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum TimeInForce {
        /// Good til time (the chain's default).
        Unspecified = 0,
        /// Immediate or cancel.
        Ioc = 1,
        /// Maker only.
        PostOnly = 2,
        /// Fill or kill.
        FillOrKill = 3,
    }

    /// Conditional order trigger type.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ConditionType {
        /// Not a conditional order.
        Unspecified = 0,
        /// Stop loss trigger.
        StopLoss = 1,
        /// Take profit trigger.
        TakeProfit = 2,
    }

    /// Order expiry.
    #[derive(Clone, PartialEq, Eq, ::prost::Oneof)]
    pub enum GoodTilOneof {
        /// Last block the order is valid in.
        #[prost(uint32, tag = "5")]
        GoodTilBlock(u32),
        /// Unix seconds after which the order expires.
        #[prost(fixed32, tag = "6")]
        GoodTilBlockTime(u32),
    }
}

/// Trading status of a clob pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ClobPairStatus {
    /// Unset.
    Unspecified = 0,
    /// Fully trading.
    Active = 1,
    /// No trading.
    Paused = 2,
    /// Only cancellations accepted.
    CancelOnly = 3,
    /// Only maker orders accepted.
    PostOnly = 4,
    /// Created but not yet trading.
    Initializing = 5,
    /// Settling positions before delisting.
    FinalSettlement = 6,
}
