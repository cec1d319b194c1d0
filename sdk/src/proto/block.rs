//! Inbound block framing.

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct Timestamp {
    /// Whole seconds.
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    /// Sub-second nanoseconds.
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// A block as emitted by the chain's indexer hook.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexerTendermintBlock {
    /// Block height.
    #[prost(uint32, tag = "1")]
    pub height: u32,
    /// Block time.
    #[prost(message, optional, tag = "2")]
    pub time: ::core::option::Option<Timestamp>,
    /// Events in the block.
    #[prost(message, repeated, tag = "3")]
    pub events: ::prost::alloc::vec::Vec<IndexerTendermintEvent>,
    /// Transaction hashes, indexed by transaction position.
    #[prost(string, repeated, tag = "4")]
    pub tx_hashes: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// One event inside a block.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexerTendermintEvent {
    /// Event kind discriminator.
    #[prost(string, tag = "1")]
    pub subtype: ::prost::alloc::string::String,
    /// Position of the event: in a transaction or in a block phase.
    #[prost(oneof = "indexer_tendermint_event::OrderingWithinBlock", tags = "3, 4")]
    pub ordering_within_block:
        ::core::option::Option<indexer_tendermint_event::OrderingWithinBlock>,
    /// Index within its transaction or block phase.
    #[prost(uint32, tag = "5")]
    pub event_index: u32,
    /// Payload schema version.
    #[prost(uint32, tag = "6")]
    pub version: u32,
    /// Encoded payload.
    #[prost(bytes = "vec", tag = "7")]
    pub data_bytes: ::prost::alloc::vec::Vec<u8>,
}

/// Nested types for [`IndexerTendermintEvent`].
pub mod indexer_tendermint_event {
    /// Where in the block the event was produced.
    #[derive(Clone, Copy, PartialEq, Eq, ::prost::Oneof)]
    pub enum OrderingWithinBlock {
        /// Index of the producing transaction.
        #[prost(uint32, tag = "3")]
        TransactionIndex(u32),
        /// Block phase, see [`super::BlockEvent`].
        #[prost(enumeration = "super::BlockEvent", tag = "4")]
        BlockEvent(i32),
    }
}

/// Block phase for events not tied to a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BlockEvent {
    /// Unset.
    Unspecified = 0,
    /// Emitted before any transaction.
    BeginBlock = 1,
    /// Emitted after all transactions.
    EndBlock = 2,
}
