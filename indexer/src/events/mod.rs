//! Block processing for the chainbook indexer.
//!
//! This module turns inbound blocks into committed state and composed
//! change notifications.
//!
//! # Components
//!
//! - [`types`]: Block, event, decoded payload and notification types
//! - [`scheduler`]: ConcurrencyScheduler partitioning events into waves
//! - [`processor`]: BlockPipeline state machine
//! - [`cursor`]: BlockCursor for idempotent replay
//! - [`metrics`]: Pipeline metrics
//! - [`source`]: BlockSource contract and length-prefixed frame reader

pub mod cursor;
pub mod metrics;
pub mod processor;
pub mod scheduler;
pub mod source;
pub mod types;

pub use cursor::BlockCursor;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use processor::{BlockPipeline, PipelineState};
pub use scheduler::{AffinityKey, AffinityKeys, ConcurrencyScheduler, Wave};
pub use source::{encode_frame, BlockSource, FrameBlockSource};
pub use types::{
    Block, ConsolidatedOutboundEvent, DecodedEvent, Event, EventKind, EventOrdering,
    EventPayload, OrderTrigger, OutboundKind, ProcessingResult,
};
