//! Block cursor for tracking processing progress.
//!
//! Provides height tracking for idempotent block processing.

use serde::{Deserialize, Serialize};

/// Cursor over committed block heights.
///
/// Blocks at or below the last committed height are replays and are not
/// processed again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCursor {
    /// Height of the last committed block, if any.
    pub last_height: Option<u64>,

    /// Number of blocks committed through this cursor.
    pub blocks_processed: u64,
}

impl BlockCursor {
    /// Creates a cursor that has seen no blocks.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_height: None,
            blocks_processed: 0,
        }
    }

    /// Creates a cursor positioned after `height`.
    #[must_use]
    pub const fn with_last_height(height: u64) -> Self {
        Self {
            last_height: Some(height),
            blocks_processed: 0,
        }
    }

    /// Returns true if the block at `height` has already been committed.
    #[must_use]
    pub const fn is_processed(&self, height: u64) -> bool {
        match self.last_height {
            Some(last) => height <= last,
            None => false,
        }
    }

    /// Returns true if the block at `height` should be processed.
    #[must_use]
    pub const fn should_process(&self, height: u64) -> bool {
        !self.is_processed(height)
    }

    /// Marks a height as committed. Never moves backwards.
    pub fn mark_processed(&mut self, height: u64) {
        if self.should_process(height) {
            self.last_height = Some(height);
            self.blocks_processed = self.blocks_processed.saturating_add(1);
        }
    }

    /// Repositions the cursor, e.g. after re-reading the store.
    pub fn reset_to(&mut self, height: Option<u64>) {
        self.last_height = height;
    }
}
