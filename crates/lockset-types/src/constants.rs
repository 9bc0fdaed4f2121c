//! Registry-wide constants and defaults.

/// First rank handed out by a fresh registry.
pub const FIRST_RANK: u64 = 0;

/// Default exclusive upper bound on assigned ranks.
///
/// A registry refuses to assign a rank equal to this value, so the counter
/// can never wrap around and reorder handles.
pub const DEFAULT_RANK_LIMIT: u64 = u64::MAX;

/// Default number of entries the registry map is pre-sized for.
pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
