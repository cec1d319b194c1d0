//! Metrics tracking for the block pipeline.
//!
//! Provides atomic counters for monitoring block processing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::IndexerError;

/// Metrics for the block pipeline.
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Blocks committed.
    blocks_processed: AtomicU64,

    /// Blocks skipped as replays.
    blocks_skipped: AtomicU64,

    /// Events validated and handled.
    events_processed: AtomicU64,

    /// Events skipped for an unknown subtype.
    unknown_events: AtomicU64,

    /// Handler waves executed.
    waves_executed: AtomicU64,

    /// Blocks failed on validation.
    validation_failures: AtomicU64,

    /// Blocks failed on undecodable payloads.
    encoding_failures: AtomicU64,

    /// Blocks failed on the store.
    store_failures: AtomicU64,

    /// Outbound messages composed.
    messages_composed: AtomicU64,

    /// Total processing time in nanoseconds.
    total_processing_time_ns: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks_processed: AtomicU64::new(0),
            blocks_skipped: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            unknown_events: AtomicU64::new(0),
            waves_executed: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            encoding_failures: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            messages_composed: AtomicU64::new(0),
            total_processing_time_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a committed block.
    pub fn record_block(&self, events: u64, waves: u64, messages: u64, duration: Duration) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
        self.events_processed.fetch_add(events, Ordering::Relaxed);
        self.waves_executed.fetch_add(waves, Ordering::Relaxed);
        self.messages_composed.fetch_add(messages, Ordering::Relaxed);
        self.total_processing_time_ns.fetch_add(
            u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    /// Records a replayed block.
    pub fn record_skipped_block(&self) {
        self.blocks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an event with an unknown subtype.
    pub fn record_unknown_event(&self) {
        self.unknown_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed block by error class.
    pub fn record_failure(&self, error: &IndexerError) {
        let counter = match error {
            IndexerError::Validation(_) => &self.validation_failures,
            IndexerError::Encoding(_) => &self.encoding_failures,
            IndexerError::Store(_) => &self.store_failures,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the blocks committed.
    #[must_use]
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed.load(Ordering::Relaxed)
    }

    /// Returns the blocks skipped.
    #[must_use]
    pub fn blocks_skipped(&self) -> u64 {
        self.blocks_skipped.load(Ordering::Relaxed)
    }

    /// Returns the events processed.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    /// Returns the unknown events skipped.
    #[must_use]
    pub fn unknown_events(&self) -> u64 {
        self.unknown_events.load(Ordering::Relaxed)
    }

    /// Returns the waves executed.
    #[must_use]
    pub fn waves_executed(&self) -> u64 {
        self.waves_executed.load(Ordering::Relaxed)
    }

    /// Returns the validation failures.
    #[must_use]
    pub fn validation_failures(&self) -> u64 {
        self.validation_failures.load(Ordering::Relaxed)
    }

    /// Returns the encoding failures.
    #[must_use]
    pub fn encoding_failures(&self) -> u64 {
        self.encoding_failures.load(Ordering::Relaxed)
    }

    /// Returns the store failures.
    #[must_use]
    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }

    /// Returns the messages composed.
    #[must_use]
    pub fn messages_composed(&self) -> u64 {
        self.messages_composed.load(Ordering::Relaxed)
    }

    /// Returns the average processing time per committed block.
    #[must_use]
    pub fn average_block_time(&self) -> Duration {
        let count = self.blocks_processed();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_processing_time_ns.load(Ordering::Relaxed) / count)
    }

    /// Returns the blocks per second since start.
    #[must_use]
    pub fn blocks_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.blocks_processed() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_processed: self.blocks_processed(),
            blocks_skipped: self.blocks_skipped(),
            events_processed: self.events_processed(),
            unknown_events: self.unknown_events(),
            waves_executed: self.waves_executed(),
            validation_failures: self.validation_failures(),
            encoding_failures: self.encoding_failures(),
            store_failures: self.store_failures(),
            messages_composed: self.messages_composed(),
            average_block_time: self.average_block_time(),
            blocks_per_second: self.blocks_per_second(),
        }
    }
}

/// A point-in-time snapshot of pipeline metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Blocks committed.
    pub blocks_processed: u64,
    /// Blocks skipped.
    pub blocks_skipped: u64,
    /// Events processed.
    pub events_processed: u64,
    /// Unknown events skipped.
    pub unknown_events: u64,
    /// Waves executed.
    pub waves_executed: u64,
    /// Validation failures.
    pub validation_failures: u64,
    /// Encoding failures.
    pub encoding_failures: u64,
    /// Store failures.
    pub store_failures: u64,
    /// Messages composed.
    pub messages_composed: u64,
    /// Average time per block.
    pub average_block_time: Duration,
    /// Blocks per second.
    pub blocks_per_second: f64,
}
