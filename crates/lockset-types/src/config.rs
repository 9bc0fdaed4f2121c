//! Configuration for lock ordering registries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{LocksetError, Result, constants};

/// What a registry does when one composite lock names the same handle twice.
///
/// A composite holding a handle twice locks it twice in a row and
/// self-deadlocks on a non-reentrant handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail construction with [`LocksetError::DuplicateHandle`].
    #[default]
    Reject,
    /// Register and store every occurrence, as given.
    Allow,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "REJECT"),
            Self::Allow => write!(f, "ALLOW"),
        }
    }
}

/// Configuration for a single `OrderRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Handling of repeated handles within one composite lock.
    pub duplicates: DuplicatePolicy,
    /// Exclusive upper bound on ranks this registry may assign.
    pub rank_limit: u64,
    /// Number of entries the registry map is pre-sized for.
    pub initial_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            duplicates: DuplicatePolicy::default(),
            rank_limit: constants::DEFAULT_RANK_LIMIT,
            initial_capacity: constants::DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Check the config for values no registry can work with.
    pub fn validate(&self) -> Result<()> {
        if self.rank_limit <= constants::FIRST_RANK {
            return Err(LocksetError::Configuration(format!(
                "rank_limit must be greater than {}, got {}",
                constants::FIRST_RANK,
                self.rank_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RegistryConfig::default();
        assert_eq!(cfg.duplicates, DuplicatePolicy::Reject);
        assert_eq!(cfg.rank_limit, u64::MAX);
        assert_eq!(cfg.initial_capacity, 64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_rank_limit_rejected() {
        let cfg = RegistryConfig {
            rank_limit: 0,
            ..RegistryConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, LocksetError::Configuration(_)));
        assert!(err.to_string().contains("rank_limit"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: RegistryConfig = serde_json::from_str(r#"{"duplicates":"allow"}"#).unwrap();
        assert_eq!(cfg.duplicates, DuplicatePolicy::Allow);
        assert_eq!(cfg.rank_limit, constants::DEFAULT_RANK_LIMIT);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = RegistryConfig {
            duplicates: DuplicatePolicy::Allow,
            rank_limit: 16,
            initial_capacity: 4,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RegistryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
