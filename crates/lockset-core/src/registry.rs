//! Process-wide lock ordering registry.
//!
//! Every handle that takes part in a composite lock is given a [`Rank`] the
//! first time it is registered. Composite locks acquire their handles in
//! ascending rank order, so any two composites that share handles walk the
//! shared ones in the same relative order and can never wait on each other
//! in a cycle.
//!
//! Entries are reference counted by the composites using them and removed
//! once the last one is disposed. A handle registered again after removal
//! gets a fresh, larger rank; ranks already handed out never change.
//!
//! ## Locking
//!
//! ```text
//! register: read lock → hit? bump refcount            (fast path)
//!           write lock → re-check → bump or insert     (slow path)
//! release:  read lock → decrement → non-zero? done
//!           write lock → same entry, still zero? remove
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicU64, Ordering},
    },
};

use lockset_types::{HandleKey, Locker, LocksetError, Rank, RegistryConfig, Result, constants};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

static GLOBAL: LazyLock<Arc<OrderRegistry>> = LazyLock::new(|| Arc::new(OrderRegistry::new()));

/// Rank and reference count of one registered handle.
#[derive(Debug)]
struct OrderEntry {
    rank: Rank,
    /// Live composite references. Zero only between the final decrement and
    /// removal under the write lock.
    refcount: AtomicU64,
}

impl OrderEntry {
    fn new(rank: Rank) -> Self {
        Self {
            rank,
            refcount: AtomicU64::new(1),
        }
    }

    /// Take one more reference, returning the entry's rank.
    fn retain(&self, key: HandleKey) -> Rank {
        if self.refcount.fetch_add(1, Ordering::AcqRel) == 0 {
            tracing::trace!(handle = %key, rank = %self.rank, "Order entry revived");
        }
        self.rank
    }
}

#[derive(Debug)]
struct RegistryState {
    entries: HashMap<HandleKey, Arc<OrderEntry>>,
    next_rank: u64,
}

/// Assigns every lock handle a stable rank in the global acquisition order.
///
/// Use [`OrderRegistry::global`] for the process-wide instance. Separate
/// instances order only the composites built against them, which is useful
/// for isolating tests.
#[derive(Debug)]
pub struct OrderRegistry {
    state: RwLock<RegistryState>,
    config: RegistryConfig,
}

impl OrderRegistry {
    /// Create an empty registry with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_config(RegistryConfig::default())
    }

    /// Create an empty registry with the given config.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                entries: HashMap::with_capacity(config.initial_capacity),
                next_rank: constants::FIRST_RANK,
            }),
            config,
        }
    }

    /// The process-wide registry used by [`crate::CompositeLock::new`].
    pub fn global() -> &'static Arc<OrderRegistry> {
        &GLOBAL
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Take a reference on `handle`'s entry, creating it if needed, and
    /// return the handle's rank.
    ///
    /// # Errors
    /// Returns [`LocksetError::RankSpaceExhausted`] if the handle is new and
    /// every rank below the configured limit has been handed out.
    pub fn register(&self, handle: &Arc<dyn Locker>) -> Result<Rank> {
        let key = HandleKey::of(handle);

        {
            let state = self.state.read();
            if let Some(entry) = state.entries.get(&key) {
                return Ok(entry.retain(key));
            }
        }

        let mut state = self.state.write();
        // Another thread may have inserted it while we waited.
        if let Some(entry) = state.entries.get(&key) {
            return Ok(entry.retain(key));
        }

        if state.next_rank >= self.config.rank_limit {
            tracing::warn!(
                handle = %key,
                limit = self.config.rank_limit,
                "Rank space exhausted"
            );
            return Err(LocksetError::RankSpaceExhausted {
                limit: self.config.rank_limit,
            });
        }

        let rank = Rank(state.next_rank);
        state.next_rank += 1;
        state.entries.insert(key, Arc::new(OrderEntry::new(rank)));

        tracing::debug!(
            handle = %key,
            rank = %rank,
            entries = state.entries.len(),
            "Order entry created"
        );
        Ok(rank)
    }

    /// Drop one reference on `handle`'s entry, removing the entry when no
    /// references remain.
    ///
    /// # Panics
    /// Panics if `handle` has no entry or its refcount is already zero.
    /// Both mean the registry's accounting is broken.
    pub fn release(&self, handle: &Arc<dyn Locker>) {
        let key = HandleKey::of(handle);

        let entry = {
            let state = self.state.read();
            let Some(entry) = state.entries.get(&key) else {
                tracing::error!(handle = %key, "Release of unregistered handle");
                panic!("lockset registry: release of unregistered handle {key}");
            };
            let previous = entry.refcount.fetch_sub(1, Ordering::AcqRel);
            if previous == 0 {
                tracing::error!(handle = %key, rank = %entry.rank, "Refcount underflow");
                panic!("lockset registry: refcount underflow for handle {key}");
            }
            if previous > 1 {
                return;
            }
            Arc::clone(entry)
        };

        let mut state = self.state.write();
        // A concurrent register may have revived the entry, or a concurrent
        // release may have removed it and a new entry taken its key.
        let still_unused = state.entries.get(&key).is_some_and(|current| {
            Arc::ptr_eq(current, &entry) && current.refcount.load(Ordering::Acquire) == 0
        });
        if still_unused {
            state.entries.remove(&key);
            tracing::debug!(
                handle = %key,
                rank = %entry.rank,
                entries = state.entries.len(),
                "Order entry removed"
            );
        }
    }

    /// Rank currently assigned to `handle`, if it is registered.
    #[must_use]
    pub fn rank_of(&self, handle: &Arc<dyn Locker>) -> Option<Rank> {
        let key = HandleKey::of(handle);
        self.state.read().entries.get(&key).map(|e| e.rank)
    }

    /// Number of live composite references on `handle`, if it is registered.
    #[must_use]
    pub fn refcount_of(&self, handle: &Arc<dyn Locker>) -> Option<u64> {
        let key = HandleKey::of(handle);
        self.state
            .read()
            .entries
            .get(&key)
            .map(|e| e.refcount.load(Ordering::Acquire))
    }

    /// The rank the next new handle will receive.
    #[must_use]
    pub fn next_rank(&self) -> Rank {
        Rank(self.state.read().next_rank)
    }

    /// Number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Point-in-time copy of every entry, sorted by rank.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        let mut entries: Vec<EntrySnapshot> = state
            .entries
            .iter()
            .map(|(key, entry)| EntrySnapshot {
                handle: key.addr(),
                rank: entry.rank,
                refcount: entry.refcount.load(Ordering::Acquire),
            })
            .collect();
        entries.sort_by_key(|e| e.rank);
        RegistrySnapshot {
            next_rank: Rank(state.next_rank),
            entries,
        }
    }
}

impl Default for OrderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostic copy of a registry's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub next_rank: Rank,
    /// Entries in ascending rank order.
    pub entries: Vec<EntrySnapshot>,
}

/// One registry entry in a [`RegistrySnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Handle address.
    pub handle: usize,
    pub rank: Rank,
    pub refcount: u64,
}
