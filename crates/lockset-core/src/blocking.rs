//! A plain exclusive lock handle.

use std::sync::Arc;

use lockset_types::Locker;
use parking_lot::{Condvar, Mutex};

/// Non-reentrant exclusive lock with separate acquire and release calls.
///
/// Unlike a guard-based mutex, the holder is not tracked: any thread may
/// call [`Locker::release`], and releasing an unheld lock just leaves it
/// unheld.
#[derive(Debug, Default)]
pub struct BlockingLock {
    locked: Mutex<bool>,
    unlocked: Condvar,
}

impl BlockingLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A new lock, ready to be passed to a composite.
    #[must_use]
    pub fn handle() -> Arc<dyn Locker> {
        Arc::new(Self::new())
    }

    /// Whether the lock is currently held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        *self.locked.lock()
    }
}

impl Locker for BlockingLock {
    fn acquire(&self) {
        let mut locked = self.locked.lock();
        while *locked {
            self.unlocked.wait(&mut locked);
        }
        *locked = true;
    }

    fn release(&self) {
        *self.locked.lock() = false;
        self.unlocked.notify_one();
    }
}
