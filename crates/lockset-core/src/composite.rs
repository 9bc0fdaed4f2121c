//! Composite locks: a fixed set of handles locked and unlocked as one.
//!
//! A [`CompositeLock`] registers its handles with an [`OrderRegistry`] when
//! it is built and keeps them sorted by rank. [`CompositeLock::acquire`]
//! takes them in ascending rank order and [`CompositeLock::release`] gives
//! them back in the reverse order.
//!
//! ## Deadlock safety
//!
//! Composites built against the same registry never deadlock each other as
//! long as every thread holds at most one top-level lock (a composite or a
//! plain handle) at a time. Locks taken outside this mechanism, and other
//! blocking operations performed while holding a lock, are not covered.
//!
//! Composites are not reentrant: do not acquire a held composite, do not
//! release one that is not held, and do not put a composite inside another
//! composite.

use std::{collections::HashSet, fmt, sync::Arc};

use lockset_types::{DuplicatePolicy, HandleKey, Locker, LocksetError, Rank, Result};

use crate::OrderRegistry;

/// A single logical lock over a fixed, rank-ordered set of handles.
///
/// Dropping the composite (or calling [`CompositeLock::dispose`]) returns its
/// references to the registry. It never owns the locking state of its
/// handles; they may be shared with other composites or locked directly.
pub struct CompositeLock {
    /// Handles in ascending rank order. Never mutated after construction.
    sequence: Box<[Arc<dyn Locker>]>,
    /// `ranks[i]` is the rank `sequence[i]` had at construction.
    ranks: Box<[Rank]>,
    registry: Arc<OrderRegistry>,
}

impl CompositeLock {
    /// Build a composite lock ordered by the process-wide registry.
    ///
    /// # Errors
    /// See [`CompositeLock::with_registry`].
    pub fn new<I>(handles: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Locker>>,
    {
        Self::with_registry(OrderRegistry::global(), handles)
    }

    /// Build a composite lock ordered by `registry`.
    ///
    /// Every handle is registered (bumping its refcount) and the handles are
    /// stably sorted by rank.
    ///
    /// # Errors
    /// - [`LocksetError::EmptyInput`] if `handles` is empty.
    /// - [`LocksetError::DuplicateHandle`] if a handle appears twice and the
    ///   registry's policy is [`DuplicatePolicy::Reject`].
    /// - [`LocksetError::RankSpaceExhausted`] if a new handle cannot be
    ///   ranked.
    ///
    /// No registry references are held after an error.
    pub fn with_registry<I>(registry: &Arc<OrderRegistry>, handles: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Locker>>,
    {
        let handles: Vec<Arc<dyn Locker>> = handles.into_iter().collect();
        if handles.is_empty() {
            return Err(LocksetError::EmptyInput);
        }

        if let Some(key) = first_duplicate(&handles) {
            match registry.config().duplicates {
                DuplicatePolicy::Reject => {
                    tracing::warn!(handle = %key, "Duplicate handle rejected");
                    return Err(LocksetError::DuplicateHandle { key });
                }
                DuplicatePolicy::Allow => {
                    tracing::warn!(
                        handle = %key,
                        "Duplicate handle allowed: acquiring this composite will self-deadlock \
                         on a non-reentrant handle"
                    );
                }
            }
        }

        let mut ranked: Vec<(Rank, Arc<dyn Locker>)> = Vec::with_capacity(handles.len());
        for handle in handles {
            match registry.register(&handle) {
                Ok(rank) => ranked.push((rank, handle)),
                Err(err) => {
                    for (_, registered) in &ranked {
                        registry.release(registered);
                    }
                    return Err(err);
                }
            }
        }
        ranked.sort_by_key(|(rank, _)| *rank);

        let (ranks, sequence): (Vec<Rank>, Vec<Arc<dyn Locker>>) = ranked.into_iter().unzip();

        tracing::debug!(
            handles = sequence.len(),
            first_rank = %ranks[0],
            last_rank = %ranks[ranks.len() - 1],
            "Composite lock built"
        );

        Ok(Self {
            sequence: sequence.into_boxed_slice(),
            ranks: ranks.into_boxed_slice(),
            registry: Arc::clone(registry),
        })
    }

    /// Lock every handle, lowest rank first, blocking until all are held.
    pub fn acquire(&self) {
        for handle in &self.sequence {
            handle.acquire();
        }
    }

    /// Unlock every handle, highest rank first.
    ///
    /// Must follow a matching [`CompositeLock::acquire`].
    pub fn release(&self) {
        for handle in self.sequence.iter().rev() {
            handle.release();
        }
    }

    /// Acquire the composite for the lifetime of the returned guard.
    pub fn lock(&self) -> CompositeGuard<'_> {
        self.acquire();
        CompositeGuard { lock: self }
    }

    /// Return this composite's references to its registry.
    ///
    /// Equivalent to dropping it.
    pub fn dispose(self) {
        drop(self);
    }

    /// Number of handles, counting repeats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Always `false`: a composite holds at least one handle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Ranks of the handles at construction, in acquisition order.
    #[must_use]
    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    /// Handles in acquisition order.
    pub fn handles(&self) -> impl ExactSizeIterator<Item = &Arc<dyn Locker>> + '_ {
        self.sequence.iter()
    }

    /// The registry this composite was ordered by.
    #[must_use]
    pub fn registry(&self) -> &Arc<OrderRegistry> {
        &self.registry
    }
}

fn first_duplicate(handles: &[Arc<dyn Locker>]) -> Option<HandleKey> {
    let mut seen = HashSet::with_capacity(handles.len());
    handles
        .iter()
        .map(HandleKey::of)
        .find(|key| !seen.insert(*key))
}

impl Locker for CompositeLock {
    fn acquire(&self) {
        CompositeLock::acquire(self);
    }

    fn release(&self) {
        CompositeLock::release(self);
    }
}

impl Drop for CompositeLock {
    fn drop(&mut self) {
        for handle in &self.sequence {
            self.registry.release(handle);
        }
        tracing::debug!(handles = self.sequence.len(), "Composite lock disposed");
    }
}

impl fmt::Debug for CompositeLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeLock")
            .field("ranks", &self.ranks)
            .finish_non_exhaustive()
    }
}

/// Holds a [`CompositeLock`] and releases it when dropped.
#[must_use = "if unused, the composite lock will immediately unlock"]
pub struct CompositeGuard<'a> {
    lock: &'a CompositeLock,
}

impl CompositeGuard<'_> {
    /// Release the composite now.
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for CompositeGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl fmt::Debug for CompositeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeGuard")
            .field("lock", self.lock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use lockset_types::{Call, CallLog, RecordingLock, RegistryConfig};

    use super::*;

    fn handle(label: u32, log: &CallLog) -> Arc<dyn Locker> {
        Arc::new(RecordingLock::new(label, log))
    }

    fn registry() -> Arc<OrderRegistry> {
        Arc::new(OrderRegistry::new())
    }

    #[test]
    fn empty_input_rejected_without_mutation() {
        let registry = registry();
        let err = CompositeLock::with_registry(&registry, Vec::<Arc<dyn Locker>>::new()).unwrap_err();
        assert_eq!(err, LocksetError::EmptyInput);
        assert!(registry.is_empty());
        assert_eq!(registry.next_rank(), Rank(0));
    }

    #[test]
    fn single_handle() {
        let registry = registry();
        let log = CallLog::new();
        let ml = CompositeLock::with_registry(&registry, [handle(1, &log)]).unwrap();

        ml.acquire();
        ml.release();

        assert_eq!(log.calls(), vec![Call::Acquire(1), Call::Release(1)]);
        assert_eq!(ml.len(), 1);
        assert!(!ml.is_empty());
    }

    #[test]
    fn handles_sorted_by_rank_not_input_order() {
        let registry = registry();
        let log = CallLog::new();
        let h1 = handle(1, &log);
        let h2 = handle(2, &log);
        let h3 = handle(3, &log);
        // Establish ranks 1 < 2 < 3.
        for h in [&h1, &h2, &h3] {
            registry.register(h).unwrap();
        }

        let ml = CompositeLock::with_registry(
            &registry,
            [Arc::clone(&h3), Arc::clone(&h1), Arc::clone(&h2)],
        )
        .unwrap();

        assert_eq!(ml.ranks(), &[Rank(0), Rank(1), Rank(2)]);
        ml.acquire();
        ml.release();
        assert_eq!(log.acquired(), vec![1, 2, 3]);
        assert_eq!(log.released(), vec![3, 2, 1]);
    }

    #[test]
    fn guard_releases_on_drop() {
        let registry = registry();
        let log = CallLog::new();
        let ml =
            CompositeLock::with_registry(&registry, [handle(1, &log), handle(2, &log)]).unwrap();

        {
            let _guard = ml.lock();
            assert_eq!(log.acquired(), vec![1, 2]);
            assert!(log.released().is_empty());
        }
        assert_eq!(log.released(), vec![2, 1]);

        log.clear();
        ml.lock().unlock();
        assert_eq!(log.released(), vec![2, 1]);
    }

    #[test]
    fn guard_releases_on_unwind() {
        let registry = registry();
        let log = CallLog::new();
        let ml =
            CompositeLock::with_registry(&registry, [handle(1, &log), handle(2, &log)]).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ml.lock();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(log.released(), vec![2, 1]);
    }

    #[test]
    fn drop_releases_registry_references() {
        let registry = registry();
        let log = CallLog::new();
        let a = handle(1, &log);
        let b = handle(2, &log);

        let ml1 =
            CompositeLock::with_registry(&registry, [Arc::clone(&a), Arc::clone(&b)]).unwrap();
        let ml2 = CompositeLock::with_registry(&registry, [Arc::clone(&b)]).unwrap();
        assert_eq!(registry.refcount_of(&b), Some(2));

        ml1.dispose();
        assert_eq!(registry.rank_of(&a), None);
        assert_eq!(registry.refcount_of(&b), Some(1));

        drop(ml2);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_rejected_by_default() {
        let registry = registry();
        let log = CallLog::new();
        let a = handle(1, &log);

        let err = CompositeLock::with_registry(&registry, [Arc::clone(&a), Arc::clone(&a)])
            .unwrap_err();
        assert_eq!(
            err,
            LocksetError::DuplicateHandle {
                key: HandleKey::of(&a)
            }
        );
        assert!(registry.is_empty());
        assert_eq!(registry.next_rank(), Rank(0));
    }

    #[test]
    fn duplicate_allowed_registers_every_occurrence() {
        let registry = Arc::new(
            OrderRegistry::with_config(RegistryConfig {
                duplicates: DuplicatePolicy::Allow,
                ..RegistryConfig::default()
            })
            .unwrap(),
        );
        let log = CallLog::new();
        let a = handle(1, &log);
        let b = handle(2, &log);

        let ml = CompositeLock::with_registry(
            &registry,
            [Arc::clone(&a), Arc::clone(&b), Arc::clone(&a)],
        )
        .unwrap();
        assert_eq!(ml.len(), 3);
        assert_eq!(registry.refcount_of(&a), Some(2));
        assert_eq!(ml.ranks(), &[Rank(0), Rank(0), Rank(1)]);

        // Recording handles never block, so the repeated acquire is visible.
        ml.acquire();
        assert_eq!(log.acquired(), vec![1, 1, 2]);
        ml.release();

        drop(ml);
        assert!(registry.is_empty());
    }

    #[test]
    fn rank_exhaustion_rolls_back() {
        let registry = Arc::new(
            OrderRegistry::with_config(RegistryConfig {
                rank_limit: 2,
                ..RegistryConfig::default()
            })
            .unwrap(),
        );
        let log = CallLog::new();
        let a = handle(1, &log);
        let b = handle(2, &log);
        let c = handle(3, &log);

        let keep = CompositeLock::with_registry(&registry, [Arc::clone(&a)]).unwrap();
        let err = CompositeLock::with_registry(
            &registry,
            [Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)],
        )
        .unwrap_err();
        assert_eq!(err, LocksetError::RankSpaceExhausted { limit: 2 });

        assert_eq!(registry.refcount_of(&a), Some(1));
        assert_eq!(registry.rank_of(&b), None);
        assert_eq!(registry.len(), 1);
        drop(keep);
    }

    #[test]
    fn composite_usable_as_locker() {
        let registry = registry();
        let log = CallLog::new();
        let ml: Arc<dyn Locker> = Arc::new(
            CompositeLock::with_registry(&registry, [handle(1, &log), handle(2, &log)]).unwrap(),
        );
        ml.acquire();
        ml.release();
        assert_eq!(log.acquired(), vec![1, 2]);
        assert_eq!(log.released(), vec![2, 1]);
    }

    #[test]
    fn debug_shows_ranks() {
        let registry = registry();
        let log = CallLog::new();
        let ml = CompositeLock::with_registry(&registry, [handle(1, &log)]).unwrap();
        let dbg = format!("{ml:?}");
        assert!(dbg.contains("CompositeLock"));
        assert!(dbg.contains("ranks"));
    }
}
