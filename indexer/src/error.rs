//! Indexer error types.
//!
//! Validation and encoding failures are fatal to the block that raised them.
//! Transient store failures allow the identical block to be retried; any
//! other store failure is surfaced like a validation failure.

use crate::events::types::DecodedEvent;

/// A semantic precondition of an event did not hold.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Human readable description naming the event kind and field.
    pub message: String,
    /// The offending event.
    pub event: Box<DecodedEvent>,
}

impl ValidationError {
    /// Creates a validation error for an event.
    #[must_use]
    pub fn new(message: impl Into<String>, event: &DecodedEvent) -> Self {
        Self {
            message: message.into(),
            event: Box::new(event.clone()),
        }
    }
}

/// Event bytes could not be decoded into the claimed kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot decode {subtype} v{version}: {reason}")]
pub struct EncodingError {
    /// Claimed subtype.
    pub subtype: String,
    /// Claimed version.
    pub version: u32,
    /// What went wrong.
    pub reason: String,
}

impl EncodingError {
    /// Creates an encoding error.
    #[must_use]
    pub fn new(subtype: impl Into<String>, version: u32, reason: impl Into<String>) -> Self {
        Self {
            subtype: subtype.into(),
            version,
            reason: reason.into(),
        }
    }
}

/// Persistent store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store could not be reached or refused the transaction.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A stored row could not be mapped back into a record.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns true for failures that may clear on their own: lost
    /// connections, an exhausted pool, serialization failures and deadlocks.
    ///
    /// Any other error the database reports for a statement is deterministic,
    /// as are constraint violations, corrupt rows and failed migrations.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            // serialization failure, deadlock
            Self::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001" | "40P01"))
            }
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            Self::Migration(_) | Self::Constraint(_) | Self::Corrupt(_) => false,
        }
    }
}

/// Errors surfaced by the indexer.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Semantic precondition failure.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed event payload.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Block source failure.
    #[error("block source error: {0}")]
    Source(String),

    /// Outbound publishing failure.
    #[error("publish error: {0}")]
    Publish(String),

    /// Internal invariant broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexerError {
    /// Returns true if re-running the identical block may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
