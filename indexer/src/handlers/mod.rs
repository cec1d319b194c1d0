//! Per-kind event handlers and the kind registry.
//!
//! A handler declares the entities an event touches, then applies the event
//! inside the block's [`TransactionScope`] and returns the notifications
//! describing the change. Handlers never touch the cache directly: they
//! queue the value read back from the scope and the pipeline applies it
//! after the block commits.
//!
//! # Components
//!
//! - [`Handler`]: Contract implemented once per event kind
//! - [`EventRegistry`]: Kind to validator and handler lookup
//! - [`market`]: Market create and update handlers
//! - [`stateful_order`]: Stateful order handler

pub mod market;
pub mod stateful_order;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chainbook_sdk::SdkError;

use crate::error::IndexerError;
use crate::events::scheduler::AffinityKeys;
use crate::events::types::{ConsolidatedOutboundEvent, DecodedEvent, EventKind};
use crate::storage::TransactionScope;
use crate::validators::{
    invalid, PerpetualMarketCreateValidator, StatefulOrderValidator, UpdateClobPairValidator,
    UpdatePerpetualValidator, ValidationContext, Validator,
};

pub use market::{PerpetualMarketCreateHandler, UpdateClobPairHandler, UpdatePerpetualHandler};
pub use stateful_order::StatefulOrderHandler;

/// Applies one event kind.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Kind this handler applies.
    fn kind(&self) -> EventKind;

    /// Entities the event reads and writes, for wave scheduling.
    ///
    /// Called after the whole block validated, so `ctx` also knows the
    /// markets and orders earlier events of the block create.
    async fn affinity_keys(&self, event: &DecodedEvent, ctx: &ValidationContext) -> AffinityKeys;

    /// Stages the event's writes and returns its notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if a store lookup fails or the event references
    /// state that does not exist.
    async fn apply(
        &self,
        event: &DecodedEvent,
        scope: &TransactionScope,
    ) -> Result<Vec<ConsolidatedOutboundEvent>, IndexerError>;
}

/// A validator and handler registered for one kind.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Validator for the kind.
    pub validator: Arc<dyn Validator>,
    /// Handler for the kind.
    pub handler: Arc<dyn Handler>,
}

/// Maps each event kind to its validator and handler.
#[derive(Clone, Default)]
pub struct EventRegistry {
    entries: HashMap<EventKind, RegistryEntry>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in kind registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();
        let pairs: [(Arc<dyn Validator>, Arc<dyn Handler>); 4] = [
            (
                Arc::new(PerpetualMarketCreateValidator),
                Arc::new(PerpetualMarketCreateHandler),
            ),
            (Arc::new(UpdatePerpetualValidator), Arc::new(UpdatePerpetualHandler)),
            (Arc::new(UpdateClobPairValidator), Arc::new(UpdateClobPairHandler)),
            (Arc::new(StatefulOrderValidator), Arc::new(StatefulOrderHandler)),
        ];
        for (validator, handler) in pairs {
            entries.insert(handler.kind(), RegistryEntry { validator, handler });
        }
        Self { entries }
    }

    /// Registers a validator and handler, replacing any previous pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the validator and handler disagree on the kind.
    pub fn register(
        &mut self,
        validator: Arc<dyn Validator>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), IndexerError> {
        let kind = handler.kind();
        if validator.kind() != kind {
            return Err(IndexerError::Internal(format!(
                "validator for {} registered with handler for {kind}",
                validator.kind()
            )));
        }
        self.entries.insert(kind, RegistryEntry { validator, handler });
        Ok(())
    }

    /// Looks up the pair for a kind.
    #[must_use]
    pub fn get(&self, kind: EventKind) -> Option<&RegistryEntry> {
        self.entries.get(&kind)
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Converts a conversion failure on event data into a validation error.
pub(crate) fn sdk_invalid(err: &SdkError, event: &DecodedEvent) -> IndexerError {
    invalid(format!("{} {err}", event.kind().event_name()), event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_kind() {
        let registry = EventRegistry::with_defaults();
        assert_eq!(registry.len(), EventKind::ALL.len());
        for kind in EventKind::ALL {
            let entry = registry.get(kind).expect("registered");
            assert_eq!(entry.validator.kind(), kind);
            assert_eq!(entry.handler.kind(), kind);
        }
    }

    #[test]
    fn test_register_rejects_mismatched_pair() {
        let mut registry = EventRegistry::new();
        assert!(registry.is_empty());

        let result = registry.register(
            Arc::new(UpdatePerpetualValidator),
            Arc::new(UpdateClobPairHandler),
        );
        assert!(result.is_err());
        assert!(registry.is_empty());

        registry
            .register(Arc::new(UpdateClobPairValidator), Arc::new(UpdateClobPairHandler))
            .expect("matching pair");
        assert!(registry.get(EventKind::UpdateClobPair).is_some());
    }
}
