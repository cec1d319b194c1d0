//! Order identity: the chain-compatible order hash, deterministic ids and
//! order-flag classification.

use prost::Message;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::proto::IndexerOrderId;

/// Flag for short-term orders.
pub const ORDER_FLAG_SHORT_TERM: u32 = 0;
/// Flag for conditional orders.
pub const ORDER_FLAG_CONDITIONAL: u32 = 32;
/// Flag for long-term orders.
pub const ORDER_FLAG_LONG_TERM: u32 = 64;
/// Flag for TWAP parent orders.
pub const ORDER_FLAG_TWAP: u32 = 128;
/// Flag for TWAP suborders.
pub const ORDER_FLAG_TWAP_SUBORDER: u32 = 256;

/// Namespace for deterministic subaccount and order ids.
pub const ID_NAMESPACE: Uuid = Uuid::from_u128(0x0f9d_a948_a6fb_4c45_9edc_4685_c3f3_317d);

/// Hashes an order id exactly as the chain does: SHA-256 over its protobuf
/// encoding.
#[must_use]
pub fn order_id_hash(order_id: &IndexerOrderId) -> [u8; 32] {
    Sha256::digest(order_id.encode_to_vec()).into()
}

/// Deterministic id of a subaccount.
#[must_use]
pub fn subaccount_uuid(owner: &str, number: u32) -> Uuid {
    Uuid::new_v5(&ID_NAMESPACE, format!("{owner}-{number}").as_bytes())
}

/// Deterministic id of an order.
#[must_use]
pub fn order_uuid(order_id: &IndexerOrderId) -> Uuid {
    let subaccount = order_id
        .subaccount_id
        .as_ref()
        .map(|s| subaccount_uuid(&s.owner, s.number))
        .unwrap_or_else(|| subaccount_uuid("", 0));
    let name = format!(
        "{}-{}-{}-{}",
        subaccount, order_id.client_id, order_id.clob_pair_id, order_id.order_flags
    );
    Uuid::new_v5(&ID_NAMESPACE, name.as_bytes())
}

/// Known order placement flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderFlagKind {
    /// Lives only in the in-memory book.
    ShortTerm,
    /// Waits in chain state for a trigger price.
    Conditional,
    /// Rests in chain state until expiry.
    LongTerm,
    /// TWAP parent.
    Twap,
    /// TWAP child order.
    TwapSuborder,
}

const FLAG_TABLE: [(u64, OrderFlagKind); 5] = [
    (ORDER_FLAG_SHORT_TERM as u64, OrderFlagKind::ShortTerm),
    (ORDER_FLAG_CONDITIONAL as u64, OrderFlagKind::Conditional),
    (ORDER_FLAG_LONG_TERM as u64, OrderFlagKind::LongTerm),
    (ORDER_FLAG_TWAP as u64, OrderFlagKind::Twap),
    (ORDER_FLAG_TWAP_SUBORDER as u64, OrderFlagKind::TwapSuborder),
];

impl OrderFlagKind {
    /// Looks up a raw flag value.
    #[must_use]
    pub fn from_flag(flag: u64) -> Option<Self> {
        FLAG_TABLE
            .iter()
            .find(|(value, _)| *value == flag)
            .map(|(_, kind)| *kind)
    }

    /// Returns true if the order's lifecycle is tracked in chain state.
    #[must_use]
    pub const fn is_stateful(&self) -> bool {
        matches!(self, Self::Conditional | Self::LongTerm)
    }

    /// Returns true for long-term orders.
    #[must_use]
    pub const fn is_long_term(&self) -> bool {
        matches!(self, Self::LongTerm)
    }

    /// Returns true for conditional orders.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::Conditional)
    }
}

/// A value that may name an order flag: an integer or its decimal string.
pub trait OrderFlagInput {
    /// Returns the flag as a non-negative integer, if it is one.
    fn to_order_flag(&self) -> Option<u64>;
}

impl OrderFlagInput for u32 {
    fn to_order_flag(&self) -> Option<u64> {
        Some(u64::from(*self))
    }
}

impl OrderFlagInput for u64 {
    fn to_order_flag(&self) -> Option<u64> {
        Some(*self)
    }
}

impl OrderFlagInput for i32 {
    fn to_order_flag(&self) -> Option<u64> {
        u64::try_from(*self).ok()
    }
}

impl OrderFlagInput for i64 {
    fn to_order_flag(&self) -> Option<u64> {
        u64::try_from(*self).ok()
    }
}

impl OrderFlagInput for &str {
    fn to_order_flag(&self) -> Option<u64> {
        self.trim().parse::<u64>().ok()
    }
}

impl OrderFlagInput for String {
    fn to_order_flag(&self) -> Option<u64> {
        self.as_str().to_order_flag()
    }
}

fn classify(flag: &impl OrderFlagInput) -> Option<OrderFlagKind> {
    flag.to_order_flag().and_then(OrderFlagKind::from_flag)
}

/// Returns true for conditional and long-term flags. Never fails: anything
/// that is not a known non-negative flag is not stateful.
#[must_use]
pub fn is_stateful_order(flag: impl OrderFlagInput) -> bool {
    classify(&flag).is_some_and(|kind| kind.is_stateful())
}

/// Returns true only for the long-term flag.
#[must_use]
pub fn is_long_term_order(flag: impl OrderFlagInput) -> bool {
    classify(&flag).is_some_and(|kind| kind.is_long_term())
}

/// Returns true only for the conditional flag.
#[must_use]
pub fn is_conditional_order(flag: impl OrderFlagInput) -> bool {
    classify(&flag).is_some_and(|kind| kind.is_conditional())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::IndexerSubaccountId;

    const OWNER: &str = "dydx1n88uc38xhjgxzw9nwre4ep2c8ga4fjxc565lnf";

    fn order_id(owner: &str, client_id: u32, order_flags: u32, clob_pair_id: u32) -> IndexerOrderId {
        IndexerOrderId {
            subaccount_id: Some(IndexerSubaccountId {
                owner: owner.to_string(),
                number: 0,
            }),
            client_id,
            order_flags,
            clob_pair_id,
        }
    }

    #[test]
    fn test_order_hash_fixed_digest() {
        let hash = order_id_hash(&order_id(OWNER, 0, 0, 0));
        assert_eq!(
            hex::encode(hash),
            "bbe50e7f43302371a758514b10f4afc5eab3de020f7bca2df87265107bbadf64"
        );
    }

    #[test]
    fn test_order_hash_empty_owner() {
        let hash = order_id_hash(&order_id("", 0, 0, 0));
        assert_eq!(
            hex::encode(hash),
            "102b51b9765a56a3e899f7cf0ee38e5251f9c503b357b330a49183eb7b155604"
        );
        assert_ne!(hash, order_id_hash(&order_id(OWNER, 0, 0, 0)));
    }

    #[test]
    fn test_order_hash_all_fields() {
        let id = order_id(OWNER, 1, ORDER_FLAG_LONG_TERM, 1);
        let mut expected = vec![0x0a, 0x2d, 0x0a, 0x2b];
        expected.extend_from_slice(OWNER.as_bytes());
        expected.extend_from_slice(&[0x15, 0x01, 0x00, 0x00, 0x00, 0x18, 0x40, 0x20, 0x01]);
        assert_eq!(id.encode_to_vec(), expected);
        assert_eq!(
            hex::encode(order_id_hash(&id)),
            "ce61f39cd4f46cbe1c9744173325076c0da295ba1a00890bb2995e29e672bad0"
        );
    }

    #[test]
    fn test_order_hash_deterministic() {
        let a = order_id(OWNER, 7, ORDER_FLAG_CONDITIONAL, 3);
        let b = a.clone();
        assert_eq!(order_id_hash(&a), order_id_hash(&b));
    }

    #[test]
    fn test_subaccount_uuid() {
        assert_eq!(
            subaccount_uuid(OWNER, 0).to_string(),
            "df91255d-5e17-5e2e-824a-87ddf3c5214a"
        );
    }

    #[test]
    fn test_order_uuid() {
        let id = order_id(OWNER, 1, ORDER_FLAG_LONG_TERM, 1);
        assert_eq!(
            order_uuid(&id).to_string(),
            "ac7aa570-f884-5305-bf52-37913402ebad"
        );
    }

    #[test]
    fn test_classification_rejects_malformed() {
        assert!(!is_stateful_order("abc"));
        assert!(!is_long_term_order("abc"));
        assert!(!is_stateful_order(3u32));
        assert!(!is_long_term_order(3u32));
        assert!(!is_stateful_order("4"));
        assert!(!is_long_term_order("4"));
        assert!(!is_stateful_order(-32i64));
        assert!(!is_stateful_order(""));
    }

    #[test]
    fn test_classification_conditional() {
        assert!(is_stateful_order(32u32));
        assert!(!is_long_term_order(32u32));
        assert!(is_conditional_order(32u32));
        assert!(is_stateful_order("32"));
        assert!(!is_long_term_order("32"));
    }

    #[test]
    fn test_classification_long_term() {
        assert!(is_stateful_order(64u32));
        assert!(is_long_term_order(64u32));
        assert!(is_stateful_order("64"));
        assert!(is_long_term_order("64".to_string()));
        assert!(is_long_term_order(64i32));
    }

    #[test]
    fn test_classification_other_known_flags() {
        assert!(!is_stateful_order(ORDER_FLAG_SHORT_TERM));
        assert!(!is_stateful_order(ORDER_FLAG_TWAP));
        assert!(!is_stateful_order(ORDER_FLAG_TWAP_SUBORDER));
        assert_eq!(
            OrderFlagKind::from_flag(u64::from(ORDER_FLAG_TWAP)),
            Some(OrderFlagKind::Twap)
        );
        assert_eq!(OrderFlagKind::from_flag(5), None);
    }
}
