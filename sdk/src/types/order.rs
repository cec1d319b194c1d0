//! Order types for the Chainbook SDK.
//!
//! Provides the persisted order record and the enumerations used to describe
//! it, plus conversions from the chain's protobuf enumerations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SdkError;
use crate::order_id::{ORDER_FLAG_CONDITIONAL, ORDER_FLAG_TWAP, ORDER_FLAG_TWAP_SUBORDER};
use crate::proto::clob::indexer_order;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl Side {
    /// Converts the chain's side enumeration.
    ///
    /// # Errors
    ///
    /// Returns an error for unspecified or unknown values.
    pub fn from_proto(value: i32) -> Result<Self, SdkError> {
        match indexer_order::Side::try_from(value) {
            Ok(indexer_order::Side::Buy) => Ok(Self::Buy),
            Ok(indexer_order::Side::Sell) => Ok(Self::Sell),
            _ => Err(SdkError::UnknownEnumValue {
                kind: "side",
                value: value.to_string(),
            }),
        }
    }

    /// Returns the outbound name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            _ => Err(SdkError::UnknownEnumValue {
                kind: "side",
                value: s.to_string(),
            }),
        }
    }
}

/// Time in force as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Good til time.
    Gtt,
    /// Fill or kill.
    Fok,
    /// Immediate or cancel.
    Ioc,
    /// Maker only.
    PostOnly,
}

impl TimeInForce {
    /// Converts the chain's time-in-force enumeration.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown values.
    pub fn from_proto(value: i32) -> Result<Self, SdkError> {
        match indexer_order::TimeInForce::try_from(value) {
            Ok(indexer_order::TimeInForce::Unspecified) => Ok(Self::Gtt),
            Ok(indexer_order::TimeInForce::Ioc) => Ok(Self::Ioc),
            Ok(indexer_order::TimeInForce::PostOnly) => Ok(Self::PostOnly),
            Ok(indexer_order::TimeInForce::FillOrKill) => Ok(Self::Fok),
            Err(_) => Err(SdkError::UnknownEnumValue {
                kind: "time in force",
                value: value.to_string(),
            }),
        }
    }

    /// Time in force as published to subscribers. Post-only is reported as
    /// good-til-time with the separate `postOnly` flag set.
    #[must_use]
    pub const fn outbound(&self) -> Self {
        match self {
            Self::PostOnly => Self::Gtt,
            other => *other,
        }
    }

    /// Returns true for maker-only orders.
    #[must_use]
    pub const fn is_post_only(&self) -> bool {
        matches!(self, Self::PostOnly)
    }

    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gtt => "GTT",
            Self::Fok => "FOK",
            Self::Ioc => "IOC",
            Self::PostOnly => "POST_ONLY",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeInForce {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GTT" => Ok(Self::Gtt),
            "FOK" => Ok(Self::Fok),
            "IOC" => Ok(Self::Ioc),
            "POST_ONLY" => Ok(Self::PostOnly),
            _ => Err(SdkError::UnknownEnumValue {
                kind: "time in force",
                value: s.to_string(),
            }),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Limit order.
    Limit,
    /// Conditional stop-loss limit order.
    StopLimit,
    /// Conditional take-profit limit order.
    TakeProfit,
    /// TWAP parent order.
    Twap,
    /// TWAP child order.
    TwapSuborder,
}

impl OrderType {
    /// Derives the order type from placement flags and condition type.
    #[must_use]
    pub fn from_flags(order_flags: u32, condition_type: i32) -> Self {
        match order_flags {
            ORDER_FLAG_CONDITIONAL => match indexer_order::ConditionType::try_from(condition_type)
            {
                Ok(indexer_order::ConditionType::StopLoss) => Self::StopLimit,
                Ok(indexer_order::ConditionType::TakeProfit) => Self::TakeProfit,
                _ => Self::Limit,
            },
            ORDER_FLAG_TWAP => Self::Twap,
            ORDER_FLAG_TWAP_SUBORDER => Self::TwapSuborder,
            _ => Self::Limit,
        }
    }

    /// Returns the outbound name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Limit => "LIMIT",
            Self::StopLimit => "STOP_LIMIT",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::Twap => "TWAP",
            Self::TwapSuborder => "TWAP_SUBORDER",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIMIT" => Ok(Self::Limit),
            "STOP_LIMIT" => Ok(Self::StopLimit),
            "TAKE_PROFIT" => Ok(Self::TakeProfit),
            "TWAP" => Ok(Self::Twap),
            "TWAP_SUBORDER" => Ok(Self::TwapSuborder),
            _ => Err(SdkError::UnknownEnumValue {
                kind: "order type",
                value: s.to_string(),
            }),
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Resting on the book.
    Open,
    /// Completely filled.
    Filled,
    /// Canceled.
    Canceled,
    /// Cancel observed off chain, not yet final.
    BestEffortCanceled,
    /// Conditional order waiting for its trigger.
    Untriggered,
    /// Placement observed off chain, not yet final.
    BestEffortOpened,
}

impl OrderStatus {
    /// Returns the outbound name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::BestEffortCanceled => "BEST_EFFORT_CANCELED",
            Self::Untriggered => "UNTRIGGERED",
            Self::BestEffortOpened => "BEST_EFFORT_OPENED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "FILLED" => Ok(Self::Filled),
            "CANCELED" => Ok(Self::Canceled),
            "BEST_EFFORT_CANCELED" => Ok(Self::BestEffortCanceled),
            "UNTRIGGERED" => Ok(Self::Untriggered),
            "BEST_EFFORT_OPENED" => Ok(Self::BestEffortOpened),
            _ => Err(SdkError::UnknownEnumValue {
                kind: "order status",
                value: s.to_string(),
            }),
        }
    }
}

/// A persisted stateful order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Deterministic order id.
    pub id: Uuid,
    /// Deterministic subaccount id.
    pub subaccount_id: Uuid,
    /// Client chosen nonce.
    pub client_id: u32,
    /// Pair the order trades on.
    pub clob_pair_id: u32,
    /// Order side.
    pub side: Side,
    /// Size in whole base units.
    pub size: Decimal,
    /// Filled size in whole base units.
    pub total_filled: Decimal,
    /// Limit price in quote units.
    pub price: Decimal,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Current status.
    pub status: OrderStatus,
    /// Stored time in force.
    pub time_in_force: TimeInForce,
    /// Reduce-only flag.
    pub reduce_only: bool,
    /// Placement flags.
    pub order_flags: u32,
    /// Expiry block, for block-bounded orders.
    pub good_til_block: Option<u32>,
    /// Expiry time, for time-bounded orders.
    pub good_til_block_time: Option<DateTime<Utc>>,
    /// Height the order was placed at.
    pub created_at_height: Option<u64>,
    /// Opaque client metadata.
    pub client_metadata: u32,
    /// Trigger price for conditional orders.
    pub trigger_price: Option<Decimal>,
    /// Block time of the last change.
    pub updated_at: Option<DateTime<Utc>>,
    /// Height of the last change.
    pub updated_at_height: Option<u64>,
}
