//! Domain types shared by the indexer and its consumers.
//!
//! - [`market`]: Perpetual market records and status
//! - [`order`]: Order records and the enumerations used to describe them

pub mod market;
pub mod order;

pub use market::{MarketType, PerpetualMarket, PerpetualMarketStatus};
pub use order::{Order, OrderStatus, OrderType, Side, TimeInForce};
