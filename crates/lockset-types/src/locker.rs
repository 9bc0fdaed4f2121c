//! The lock handle contract.
//!
//! A handle exposes a blocking [`Locker::acquire`] and a non-blocking
//! [`Locker::release`]. Fairness and reentrancy are whatever the handle
//! provides; lockset only decides the order handles are taken in.

/// A lock handle that can be grouped into a composite lock.
///
/// `release` must only be called by the owner of a prior successful
/// `acquire`. Violating that is misuse and behaves however the
/// implementation behaves on misuse.
///
/// A handle's identity is its `Arc` allocation. Do not register two
/// different handles that lock the same underlying lock, such as two
/// wrapper structs around one mutex, or the read and write sides of one
/// reader-writer lock. They get unrelated ranks, so composites using them
/// can deadlock or self-deadlock.
pub trait Locker: Send + Sync {
    /// Block the calling thread until the lock is held.
    fn acquire(&self);

    /// Release a lock previously taken with [`Locker::acquire`].
    fn release(&self);
}

// ---------------------------------------------------------------------------
// Instrumented handles
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
pub use recording::{Call, CallLog, RecordingLock};

#[cfg(any(test, feature = "test-helpers"))]
mod recording {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::Locker;

    /// One recorded call on a [`RecordingLock`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Call {
        Acquire(u32),
        Release(u32),
    }

    /// Shared, ordered log of calls made on a group of recording handles.
    #[derive(Debug, Clone, Default)]
    pub struct CallLog(Arc<Mutex<Vec<Call>>>);

    impl CallLog {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn push(&self, call: Call) {
            self.0.lock().push(call);
        }

        /// Snapshot of every call so far.
        #[must_use]
        pub fn calls(&self) -> Vec<Call> {
            self.0.lock().clone()
        }

        /// Labels of all acquire calls, in call order.
        #[must_use]
        pub fn acquired(&self) -> Vec<u32> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Acquire(label) => Some(label),
                    Call::Release(_) => None,
                })
                .collect()
        }

        /// Labels of all release calls, in call order.
        #[must_use]
        pub fn released(&self) -> Vec<u32> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Release(label) => Some(label),
                    Call::Acquire(_) => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.0.lock().clear();
        }
    }

    /// A handle that never blocks and records every call into a [`CallLog`].
    #[derive(Debug)]
    pub struct RecordingLock {
        label: u32,
        log: CallLog,
    }

    impl RecordingLock {
        #[must_use]
        pub fn new(label: u32, log: &CallLog) -> Self {
            Self {
                label,
                log: log.clone(),
            }
        }

        #[must_use]
        pub fn label(&self) -> u32 {
            self.label
        }
    }

    impl Locker for RecordingLock {
        fn acquire(&self) {
            self.log.push(Call::Acquire(self.label));
        }

        fn release(&self) {
            self.log.push(Call::Release(self.label));
        }
    }
}
