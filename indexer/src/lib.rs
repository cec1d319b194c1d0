//! Chainbook Indexer - Block ingestion for an exchange chain.
//!
//! This crate ingests finalized blocks, validates and applies each block's
//! events atomically against the store, keeps an in-memory market cache
//! consistent with committed state, and composes change notifications for
//! downstream real-time consumers.
//!
//! # Components
//!
//! - [`config`]: Indexer configuration
//! - [`error`]: Error types
//! - [`events`]: Block model, scheduling and the block pipeline
//! - [`validators`]: Per-event precondition checks
//! - [`handlers`]: Per-event state changes and the event registry
//! - [`cache`]: Market reference cache
//! - [`storage`]: Store abstraction with PostgreSQL and in-memory backends
//! - [`messages`]: Outbound message composition and publishing
//! - [`service`]: Main indexer service

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod messages;
pub mod service;
pub mod storage;
pub mod validators;

pub use cache::MarketCache;
pub use config::{ConfigError, IndexerConfig};
pub use error::{EncodingError, IndexerError, StoreError, ValidationError};
pub use events::{Block, BlockPipeline, BlockSource, FrameBlockSource, PipelineMetrics, ProcessingResult};
pub use handlers::EventRegistry;
pub use messages::{ChannelSink, MessageComposer, MessageSink, OutboundMessage, Publisher, Topic};
pub use service::IndexerService;
pub use storage::{MemoryStore, PgStore, Store};
