//! Wave scheduling of a block's events.
//!
//! Each event declares the entities it touches as [`AffinityKeys`]. Events
//! are assigned, in chain order, to the earliest wave after every earlier
//! event they conflict with. Events in one wave share no conflicting key and
//! may run concurrently; waves run one after another.
//!
//! Two events conflict when one holds a key exclusively and the other holds
//! the same key exclusively or shared. Shared keys mark read-only
//! dependencies, so many readers of a market may share a wave as long as no
//! writer of that market is in it. An event with no keys at all conflicts
//! with everything and runs alone.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

/// An entity an event touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AffinityKey {
    /// A perpetual market, by id.
    Market(u32),
    /// A subaccount.
    Subaccount {
        /// Owner address.
        owner: String,
        /// Subaccount number.
        number: u32,
    },
    /// An order, by id.
    Order(Uuid),
}

/// Keys an event writes (exclusive) and reads (shared).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffinityKeys {
    /// Keys the event mutates.
    pub exclusive: BTreeSet<AffinityKey>,
    /// Keys the event only reads.
    pub shared: BTreeSet<AffinityKey>,
}

impl AffinityKeys {
    /// No keys: the event is serialized against all others.
    #[must_use]
    pub fn global() -> Self {
        Self::default()
    }

    /// Keys the event mutates.
    #[must_use]
    pub fn exclusive(keys: impl IntoIterator<Item = AffinityKey>) -> Self {
        Self {
            exclusive: keys.into_iter().collect(),
            shared: BTreeSet::new(),
        }
    }

    /// Adds keys the event only reads.
    #[must_use]
    pub fn with_shared(mut self, keys: impl IntoIterator<Item = AffinityKey>) -> Self {
        self.shared.extend(keys);
        self
    }

    /// Returns true if the event declared no keys.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.exclusive.is_empty() && self.shared.is_empty()
    }
}

/// Indices into the block's event list, in chain order.
pub type Wave = Vec<usize>;

/// Partitions events into waves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrencyScheduler;

impl ConcurrencyScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Assigns each event, given in chain order, to a wave.
    #[must_use]
    pub fn partition(&self, keys: &[AffinityKeys]) -> Vec<Wave> {
        // last wave in which a key was used at all, and used exclusively
        let mut last_any: HashMap<&AffinityKey, usize> = HashMap::new();
        let mut last_exclusive: HashMap<&AffinityKey, usize> = HashMap::new();
        // earliest wave any later event may use
        let mut barrier = 0usize;
        let mut waves: Vec<Wave> = Vec::new();

        for (index, event_keys) in keys.iter().enumerate() {
            let wave = if event_keys.is_global() {
                waves.len().max(barrier)
            } else {
                let after_exclusive = event_keys
                    .exclusive
                    .iter()
                    .filter_map(|k| last_any.get(k).map(|w| w + 1));
                let after_shared = event_keys
                    .shared
                    .iter()
                    .filter_map(|k| last_exclusive.get(k).map(|w| w + 1));
                after_exclusive.chain(after_shared).fold(barrier, usize::max)
            };

            if event_keys.is_global() {
                barrier = wave + 1;
            }
            for key in &event_keys.exclusive {
                last_any.insert(key, wave);
                last_exclusive.insert(key, wave);
            }
            for key in &event_keys.shared {
                let entry = last_any.entry(key).or_insert(wave);
                *entry = (*entry).max(wave);
            }

            if waves.len() <= wave {
                waves.resize_with(wave + 1, Vec::new);
            }
            if let Some(slot) = waves.get_mut(wave) {
                slot.push(index);
            }
        }

        waves
    }
}
