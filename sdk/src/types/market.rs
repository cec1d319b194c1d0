//! Market types for the Chainbook SDK.
//!
//! Provides the perpetual market reference record and the quantum/subtick
//! conversions that depend on it.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SdkError;
use crate::proto::{ClobPairStatus, PerpetualMarketType};

/// Atomic resolution of the quote currency.
pub const QUOTE_CURRENCY_ATOMIC_RESOLUTION: i32 = -6;

/// Trading status of a perpetual market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerpetualMarketStatus {
    /// Fully trading.
    Active,
    /// No trading.
    Paused,
    /// Only cancellations accepted.
    CancelOnly,
    /// Only maker orders accepted.
    PostOnly,
    /// Created but not yet trading.
    Initializing,
    /// Settling before delisting.
    FinalSettlement,
}

impl PerpetualMarketStatus {
    /// Converts the chain's clob pair status.
    ///
    /// # Errors
    ///
    /// Returns an error for unspecified or unknown values.
    pub fn from_clob_pair_status(value: i32) -> Result<Self, SdkError> {
        match ClobPairStatus::try_from(value) {
            Ok(ClobPairStatus::Active) => Ok(Self::Active),
            Ok(ClobPairStatus::Paused) => Ok(Self::Paused),
            Ok(ClobPairStatus::CancelOnly) => Ok(Self::CancelOnly),
            Ok(ClobPairStatus::PostOnly) => Ok(Self::PostOnly),
            Ok(ClobPairStatus::Initializing) => Ok(Self::Initializing),
            Ok(ClobPairStatus::FinalSettlement) => Ok(Self::FinalSettlement),
            Ok(ClobPairStatus::Unspecified) | Err(_) => Err(SdkError::UnknownEnumValue {
                kind: "clob pair status",
                value: value.to_string(),
            }),
        }
    }

    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::CancelOnly => "CANCEL_ONLY",
            Self::PostOnly => "POST_ONLY",
            Self::Initializing => "INITIALIZING",
            Self::FinalSettlement => "FINAL_SETTLEMENT",
        }
    }
}

impl fmt::Display for PerpetualMarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerpetualMarketStatus {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "PAUSED" => Ok(Self::Paused),
            "CANCEL_ONLY" => Ok(Self::CancelOnly),
            "POST_ONLY" => Ok(Self::PostOnly),
            "INITIALIZING" => Ok(Self::Initializing),
            "FINAL_SETTLEMENT" => Ok(Self::FinalSettlement),
            _ => Err(SdkError::UnknownEnumValue {
                kind: "market status",
                value: s.to_string(),
            }),
        }
    }
}

/// Margin model of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketType {
    /// Cross margined.
    Cross,
    /// Isolated margin.
    Isolated,
}

impl MarketType {
    /// Converts the chain's market type; unset means cross.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown values.
    pub fn from_proto(value: i32) -> Result<Self, SdkError> {
        match PerpetualMarketType::try_from(value) {
            Ok(PerpetualMarketType::Unspecified | PerpetualMarketType::Cross) => Ok(Self::Cross),
            Ok(PerpetualMarketType::Isolated) => Ok(Self::Isolated),
            Err(_) => Err(SdkError::UnknownEnumValue {
                kind: "market type",
                value: value.to_string(),
            }),
        }
    }

    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cross => "CROSS",
            Self::Isolated => "ISOLATED",
        }
    }
}

impl FromStr for MarketType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CROSS" => Ok(Self::Cross),
            "ISOLATED" => Ok(Self::Isolated),
            _ => Err(SdkError::UnknownEnumValue {
                kind: "market type",
                value: s.to_string(),
            }),
        }
    }
}

/// A tradable perpetual market.
///
/// Addressed by its perpetual `id` and, independently, by its
/// `clob_pair_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpetualMarket {
    /// Perpetual id.
    pub id: u32,
    /// Clob pair id.
    pub clob_pair_id: u32,
    /// Market ticker, e.g. `BTC-USD`.
    pub ticker: String,
    /// Oracle market id.
    pub market_id: u32,
    /// Trading status.
    pub status: PerpetualMarketStatus,
    /// Exponent converting subticks to quote quantums.
    pub quantum_conversion_exponent: i32,
    /// Exponent converting base quantums to whole units.
    pub atomic_resolution: i32,
    /// Subticks per price tick.
    pub subticks_per_tick: u32,
    /// Size step in base quantums.
    pub step_base_quantums: u64,
    /// Liquidity tier id.
    pub liquidity_tier: u32,
    /// Margin model.
    pub market_type: MarketType,
}

impl PerpetualMarket {
    /// Converts a size in base quantums to whole base units.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Overflow`] if the result is not representable.
    pub fn quantums_to_size(&self, quantums: u64) -> Result<Decimal, SdkError> {
        scale_by_power_of_ten(quantums, self.atomic_resolution)
    }

    /// Converts a price in subticks to quote units per whole base unit.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Overflow`] if the result is not representable.
    pub fn subticks_to_price(&self, subticks: u64) -> Result<Decimal, SdkError> {
        let exponent = self
            .quantum_conversion_exponent
            .checked_sub(self.atomic_resolution)
            .and_then(|e| e.checked_add(QUOTE_CURRENCY_ATOMIC_RESOLUTION))
            .ok_or(SdkError::Overflow)?;
        scale_by_power_of_ten(subticks, exponent)
    }
}

/// Largest power of ten a [`Decimal`] can scale by in either direction.
const MAX_DECIMAL_EXPONENT: u32 = 28;

/// Computes `value * 10^exponent` exactly, normalized.
fn scale_by_power_of_ten(value: u64, exponent: i32) -> Result<Decimal, SdkError> {
    if value == 0 {
        return Ok(Decimal::ZERO);
    }
    if exponent.unsigned_abs() > MAX_DECIMAL_EXPONENT {
        return Err(SdkError::Overflow);
    }
    if exponent < 0 {
        return Decimal::try_from_i128_with_scale(i128::from(value), exponent.unsigned_abs())
            .map(|d| d.normalize())
            .map_err(|_| SdkError::Overflow);
    }

    let mut result = Decimal::from(value);
    for _ in 0..exponent {
        result = result.checked_mul(Decimal::TEN).ok_or(SdkError::Overflow)?;
    }
    Ok(result.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> PerpetualMarket {
        PerpetualMarket {
            id: 0,
            clob_pair_id: 0,
            ticker: "BTC-USD".to_string(),
            market_id: 0,
            status: PerpetualMarketStatus::Active,
            quantum_conversion_exponent: -8,
            atomic_resolution: -10,
            subticks_per_tick: 10_000,
            step_base_quantums: 1_000_000,
            liquidity_tier: 0,
            market_type: MarketType::Cross,
        }
    }

    #[test]
    fn test_quantums_to_size() {
        let market = btc();
        assert_eq!(
            market.quantums_to_size(1_000_000_000).expect("size").to_string(),
            "0.1"
        );
        assert_eq!(market.quantums_to_size(0).expect("size").to_string(), "0");
    }

    #[test]
    fn test_subticks_to_price() {
        let market = btc();
        // exponent = -8 - (-10) - 6 = -4
        assert_eq!(
            market.subticks_to_price(100_000_000).expect("price").to_string(),
            "10000"
        );
        assert_eq!(
            market.subticks_to_price(12_345).expect("price").to_string(),
            "1.2345"
        );
    }

    #[test]
    fn test_positive_exponent() {
        let market = PerpetualMarket {
            atomic_resolution: 2,
            ..btc()
        };
        assert_eq!(market.quantums_to_size(15).expect("size").to_string(), "1500");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let market = PerpetualMarket {
            atomic_resolution: 40,
            ..btc()
        };
        assert_eq!(market.quantums_to_size(u64::MAX), Err(SdkError::Overflow));

        let market = PerpetualMarket {
            atomic_resolution: -40,
            ..btc()
        };
        assert_eq!(market.quantums_to_size(1), Err(SdkError::Overflow));
    }

    #[test]
    fn test_zero_scales_at_any_exponent() {
        let market = PerpetualMarket {
            atomic_resolution: -29,
            ..btc()
        };
        assert_eq!(market.quantums_to_size(0), Ok(Decimal::ZERO));

        let market = PerpetualMarket {
            atomic_resolution: i32::MAX,
            ..btc()
        };
        assert_eq!(market.quantums_to_size(0), Ok(Decimal::ZERO));
    }

    #[test]
    fn test_exponent_beyond_decimal_range_is_rejected() {
        let market = PerpetualMarket {
            atomic_resolution: i32::MAX,
            ..btc()
        };
        assert_eq!(market.quantums_to_size(1), Err(SdkError::Overflow));

        let market = PerpetualMarket {
            atomic_resolution: i32::MIN,
            ..btc()
        };
        assert_eq!(market.quantums_to_size(1), Err(SdkError::Overflow));

        let market = PerpetualMarket {
            atomic_resolution: 28,
            ..btc()
        };
        let expected = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
        assert_eq!(market.quantums_to_size(1), Ok(expected));
    }

    #[test]
    fn test_status_from_clob_pair_status() {
        assert_eq!(
            PerpetualMarketStatus::from_clob_pair_status(1).expect("active"),
            PerpetualMarketStatus::Active
        );
        assert_eq!(
            PerpetualMarketStatus::from_clob_pair_status(6).expect("final"),
            PerpetualMarketStatus::FinalSettlement
        );
        assert!(PerpetualMarketStatus::from_clob_pair_status(0).is_err());
        assert!(PerpetualMarketStatus::from_clob_pair_status(42).is_err());
    }

    #[test]
    fn test_market_type_defaults_to_cross() {
        assert_eq!(MarketType::from_proto(0).expect("cross"), MarketType::Cross);
        assert_eq!(MarketType::from_proto(2).expect("isolated"), MarketType::Isolated);
        assert!(MarketType::from_proto(3).is_err());
    }

    #[test]
    fn test_market_serializes_camel_case() {
        let json = serde_json::to_value(btc()).expect("serialize");
        assert_eq!(json["clobPairId"], 0);
        assert_eq!(json["ticker"], "BTC-USD");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["quantumConversionExponent"], -8);
    }
}
