//! Error types for lockset.
//!
//! All errors use the `LS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Construction errors
//! - 2xx: Registry errors
//! - 9xx: General / configuration errors
//!
//! Misuse of a lock (double lock, unlock without lock) is deliberately not
//! represented here: it behaves exactly as misuse of the underlying handle.

use thiserror::Error;

use crate::HandleKey;

/// Central error enum for all lockset operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocksetError {
    // =================================================================
    // Construction Errors (1xx)
    // =================================================================
    /// A composite lock was requested over zero handles.
    #[error("LS_ERR_100: Composite lock needs at least one handle")]
    EmptyInput,

    /// The same handle was supplied more than once to one composite lock.
    #[error("LS_ERR_101: Duplicate handle {key}")]
    DuplicateHandle { key: HandleKey },

    // =================================================================
    // Registry Errors (2xx)
    // =================================================================
    /// The registry has handed out every rank below its limit.
    #[error("LS_ERR_200: Rank space exhausted at limit {limit}")]
    RankSpaceExhausted { limit: u64 },

    // =================================================================
    // General (9xx)
    // =================================================================
    /// Configuration error (invalid registry config).
    #[error("LS_ERR_900: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LocksetError>;
