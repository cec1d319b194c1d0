//! Outbound change notifications.
//!
//! Handlers produce [`ConsolidatedOutboundEvent`] records; once the block
//! commits the [`MessageComposer`] turns them into versioned envelopes and
//! the [`Publisher`] hands them, batched per topic, to a [`MessageSink`].
//!
//! # Components
//!
//! - [`composer`]: Envelope and contents construction
//! - [`publisher`]: Per-topic batching and the sink contract
//!
//! [`ConsolidatedOutboundEvent`]: crate::events::types::ConsolidatedOutboundEvent

pub mod composer;
pub mod publisher;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use composer::{
    MessageComposer, OrderContents, MARKETS_MESSAGE_VERSION, SUBACCOUNTS_MESSAGE_VERSION,
};
pub use publisher::{batch_messages, ChannelSink, MessageBatch, MessageSink, Publisher};

/// Destination topic of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Market reference data changes.
    Markets,
    /// Per-subaccount order changes.
    Subaccounts,
}

impl Topic {
    /// Topic name on the bus.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markets => "to-websockets-markets",
            Self::Subaccounts => "to-websockets-subaccounts",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded envelope ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination topic.
    pub topic: Topic,
    /// Partition key; empty for unkeyed topics.
    pub key: Vec<u8>,
    /// Encoded envelope.
    pub value: Vec<u8>,
}

impl OutboundMessage {
    /// Envelope size counted against batch limits.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.value.len()
    }
}
