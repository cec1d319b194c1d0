//! In-memory reference data.
//!
//! - [`markets`]: Perpetual markets by id and by clob pair id

pub mod markets;

pub use markets::MarketCache;
