//! # lockset-core
//!
//! Deadlock-free composite locks over a process-wide lock ordering.
//!
//! ## Architecture
//!
//! - **OrderRegistry**: gives every lock handle a stable rank on first
//!   sight and reference counts the composites that use it
//! - **CompositeLock**: registers its handles, sorts them by rank, acquires
//!   them lowest rank first and releases them in reverse
//! - **BlockingLock**: a plain exclusive handle to build composites from
//!
//! ```text
//! CompositeLock::new(handles) → OrderRegistry::register(each) → sort by rank
//!     → acquire (ascending) / release (descending)
//!     → drop → OrderRegistry::release(each)
//! ```
//!
//! Composites never deadlock one another as long as each thread holds at
//! most one top-level lock at a time.
//!
//! ```
//! use std::sync::Arc;
//!
//! use lockset_core::{BlockingLock, CompositeLock};
//! use lockset_types::Locker;
//!
//! let accounts: Vec<Arc<dyn Locker>> = (0..3).map(|_| BlockingLock::handle()).collect();
//!
//! let transfer = CompositeLock::new([Arc::clone(&accounts[2]), Arc::clone(&accounts[0])])?;
//! {
//!     let _held = transfer.lock();
//!     // both accounts are held here
//! }
//! # Ok::<(), lockset_types::LocksetError>(())
//! ```

pub mod blocking;
pub mod composite;
pub mod registry;

pub use blocking::BlockingLock;
pub use composite::{CompositeGuard, CompositeLock};
pub use registry::{EntrySnapshot, OrderRegistry, RegistrySnapshot};
