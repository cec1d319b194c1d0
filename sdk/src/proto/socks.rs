//! Outbound notification envelopes.

use super::clob::IndexerSubaccountId;

/// Change notification scoped to one subaccount.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubaccountMessage {
    /// Height of the block that produced the change.
    #[prost(string, tag = "1")]
    pub block_height: ::prost::alloc::string::String,
    /// Storage transaction index of the producing event.
    #[prost(int32, tag = "2")]
    pub transaction_index: i32,
    /// Index of the producing event.
    #[prost(uint32, tag = "3")]
    pub event_index: u32,
    /// JSON contents.
    #[prost(string, tag = "4")]
    pub contents: ::prost::alloc::string::String,
    /// Subaccount the change belongs to.
    #[prost(message, optional, tag = "5")]
    pub subaccount_id: ::core::option::Option<IndexerSubaccountId>,
    /// Envelope version.
    #[prost(uint32, tag = "6")]
    pub version: u32,
}

/// Change notification for market reference data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MarketMessage {
    /// JSON contents.
    #[prost(string, tag = "1")]
    pub contents: ::prost::alloc::string::String,
    /// Envelope version.
    #[prost(uint32, tag = "2")]
    pub version: u32,
}
