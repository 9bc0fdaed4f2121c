//! # lockset-types
//!
//! Shared types, errors, and configuration for **lockset**, a deadlock-free
//! composite lock built on a process-wide lock ordering.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Handles**: the [`Locker`] trait every lock handle implements
//! - **Identifiers**: [`Rank`], [`HandleKey`]
//! - **Configuration**: [`RegistryConfig`], [`DuplicatePolicy`]
//! - **Errors**: [`LocksetError`] with `LS_ERR_` prefix codes
//! - **Constants**: registry defaults
//!
//! With the `test-helpers` feature, [`RecordingLock`] and [`CallLog`] provide
//! instrumented handles that record the order of acquire/release calls.

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod locker;

pub use config::*;
pub use error::*;
pub use ids::*;
pub use locker::*;

// Constants are accessed via `lockset_types::constants::FOO`
// (not re-exported to avoid name collisions).
