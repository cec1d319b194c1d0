//! Chainbook SDK - wire types and identity rules shared with the chain.
//!
//! This crate holds the pieces of the indexer that must agree with the chain
//! byte for byte, plus the domain records built from them.
//!
//! # Components
//!
//! - [`integer`]: Canonical signed-integer byte codec and its base64 text form
//! - [`order_id`]: Order hash, deterministic ids, order-flag classification
//! - [`proto`]: Protobuf messages for blocks, events and outbound envelopes
//! - [`types`]: Market and order records
//!
//! # Example
//!
//! ```rust
//! use chainbook_sdk::integer::{bigint_to_bytes, bytes_to_bigint};
//! use chainbook_sdk::order_id::{is_long_term_order, is_stateful_order};
//! use num_bigint::BigInt;
//!
//! let bytes = bigint_to_bytes(&BigInt::from(-1));
//! assert_eq!(bytes, vec![0x03, 0x01]);
//! assert_eq!(bytes_to_bigint(&bytes), BigInt::from(-1));
//!
//! assert!(is_stateful_order("32"));
//! assert!(!is_long_term_order(32u32));
//! ```

pub mod error;
pub mod integer;
pub mod order_id;
pub mod proto;
pub mod types;

pub use error::SdkError;
pub use integer::{base64_to_bytes, bigint_to_bytes, bytes_to_base64, bytes_to_bigint};
pub use order_id::{
    is_conditional_order, is_long_term_order, is_stateful_order, order_id_hash, order_uuid,
    subaccount_uuid, OrderFlagKind,
};
pub use types::{
    MarketType, Order, OrderStatus, OrderType, PerpetualMarket, PerpetualMarketStatus, Side,
    TimeInForce,
};
