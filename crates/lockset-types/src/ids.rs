//! Identifiers used by the lock ordering registry.
//!
//! A [`Rank`] is a handle's position in the global acquisition order. A
//! [`HandleKey`] is the identity a handle is registered under: its address,
//! never anything derived from the lock's state.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::Locker;

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

/// Position of a handle in the global acquisition order.
///
/// Ranks are assigned once, on first registration, and grow strictly with
/// creation order. Lower ranks are always acquired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Rank(pub u64);

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HandleKey
// ---------------------------------------------------------------------------

/// Address identity of a shared lock handle.
///
/// Two structurally equal handles at different addresses are different
/// locks and get different keys. Only the data pointer is used, so the same
/// allocation seen through different trait-object vtables maps to one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct HandleKey(usize);

impl HandleKey {
    /// Key for the handle behind `handle`.
    #[must_use]
    pub fn of(handle: &Arc<dyn Locker>) -> Self {
        Self(Arc::as_ptr(handle).cast::<()>().addr())
    }

    #[cfg(test)]
    pub(crate) fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Raw address, for diagnostics only.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
